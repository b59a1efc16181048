//! Record color assignment from a context's color-by field

use indexmap::IndexMap;
use serde_json::Value;

use crate::source::FieldMap;

/// Fill color when no color-by field is set
pub const DEFAULT_COLOR: [f32; 4] = [1.0, 0.85, 0.2, 0.6];
/// Fill color for null values when nulls are drawn
pub const NULL_COLOR: [f32; 4] = [0.5, 0.5, 0.5, 0.6];

const LOW_COLOR: [f32; 3] = [0.2, 0.2, 1.0];
const HIGH_COLOR: [f32; 3] = [1.0, 0.2, 0.2];
const FILL_ALPHA: f32 = 0.6;

const PALETTE: [[f32; 4]; 8] = [
    [1.0, 0.2, 0.2, FILL_ALPHA], // Red
    [0.2, 0.8, 0.2, FILL_ALPHA], // Green
    [0.2, 0.4, 1.0, FILL_ALPHA], // Blue
    [1.0, 0.6, 0.0, FILL_ALPHA], // Orange
    [0.8, 0.2, 0.8, FILL_ALPHA], // Purple
    [0.0, 0.8, 0.8, FILL_ALPHA], // Cyan
    [1.0, 1.0, 0.0, FILL_ALPHA], // Yellow
    [0.6, 0.4, 0.2, FILL_ALPHA], // Brown
];

#[derive(Debug, Clone, PartialEq)]
pub enum ColorScale {
    Uniform([f32; 4]),
    /// Linear ramp between the smallest and largest value seen
    Numeric { field: String, min: f64, max: f64 },
    /// One palette entry per distinct value, in first-seen order
    Categorical {
        field: String,
        categories: IndexMap<String, usize>,
    },
}

impl ColorScale {
    /// Fit a scale to the values of `color_by` across one result set
    pub fn fit<'a>(color_by: Option<&str>, records: impl IntoIterator<Item = &'a FieldMap>) -> Self {
        let Some(field) = color_by else {
            return Self::Uniform(DEFAULT_COLOR);
        };

        let values: Vec<&Value> = records
            .into_iter()
            .filter_map(|fields| fields.get(field))
            .filter(|v| !v.is_null())
            .collect();

        let numbers: Option<Vec<f64>> = values.iter().map(|v| v.as_f64()).collect();
        match numbers {
            Some(numbers) if !numbers.is_empty() => {
                let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
                let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                Self::Numeric {
                    field: field.to_string(),
                    min,
                    max,
                }
            }
            _ => {
                let mut categories = IndexMap::new();
                for value in values {
                    let next = categories.len();
                    categories.entry(category_key(value)).or_insert(next);
                }
                Self::Categorical {
                    field: field.to_string(),
                    categories,
                }
            }
        }
    }

    /// Color of one record; `None` means the record is not drawn
    pub fn color_for(&self, fields: &FieldMap, draw_null: bool) -> Option<[f32; 4]> {
        let (field, value) = match self {
            Self::Uniform(color) => return Some(*color),
            Self::Numeric { field, .. } | Self::Categorical { field, .. } => {
                (field, fields.get(field.as_str()))
            }
        };

        let value = match value {
            Some(v) if !v.is_null() => v,
            _ => return draw_null.then_some(NULL_COLOR),
        };

        match self {
            Self::Numeric { min, max, .. } => {
                let Some(x) = value.as_f64() else {
                    tracing::debug!(field = %field, "Non-numeric value on numeric color scale");
                    return draw_null.then_some(NULL_COLOR);
                };
                let t = if max > min { ((x - min) / (max - min)) as f32 } else { 0.0 };
                Some(ramp(t.clamp(0.0, 1.0)))
            }
            Self::Categorical { categories, .. } => {
                let index = categories.get(&category_key(value)).copied().unwrap_or(0);
                Some(PALETTE[index % PALETTE.len()])
            }
            Self::Uniform(color) => Some(*color),
        }
    }
}

fn ramp(t: f32) -> [f32; 4] {
    let lerp = |a: f32, b: f32| a + (b - a) * t;
    [
        lerp(LOW_COLOR[0], HIGH_COLOR[0]),
        lerp(LOW_COLOR[1], HIGH_COLOR[1]),
        lerp(LOW_COLOR[2], HIGH_COLOR[2]),
        FILL_ALPHA,
    ]
}

fn category_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> FieldMap {
        let mut map = FieldMap::new();
        map.insert("v".to_string(), value);
        map
    }

    #[test]
    fn no_field_is_uniform() {
        let rows = [fields(json!(1))];
        let scale = ColorScale::fit(None, rows.iter());
        assert_eq!(scale.color_for(&rows[0], false), Some(DEFAULT_COLOR));
    }

    #[test]
    fn numeric_ramp_spans_min_to_max() {
        let rows = [fields(json!(10)), fields(json!(20.0)), fields(json!(15))];
        let scale = ColorScale::fit(Some("v"), rows.iter());
        assert_eq!(
            scale,
            ColorScale::Numeric {
                field: "v".to_string(),
                min: 10.0,
                max: 20.0
            }
        );
        assert_eq!(scale.color_for(&rows[0], true), Some(ramp(0.0)));
        assert_eq!(scale.color_for(&rows[1], true), Some(ramp(1.0)));
        assert_eq!(scale.color_for(&rows[2], true), Some(ramp(0.5)));
    }

    #[test]
    fn categories_follow_first_seen_order() {
        let rows = [fields(json!("b")), fields(json!("a")), fields(json!("b"))];
        let scale = ColorScale::fit(Some("v"), rows.iter());
        assert_eq!(scale.color_for(&rows[0], true), Some(PALETTE[0]));
        assert_eq!(scale.color_for(&rows[1], true), Some(PALETTE[1]));
        assert_eq!(scale.color_for(&rows[2], true), Some(PALETTE[0]));
    }

    #[test]
    fn nulls_follow_draw_null() {
        let rows = [fields(json!(1)), fields(Value::Null), FieldMap::new()];
        let scale = ColorScale::fit(Some("v"), rows.iter());
        assert_eq!(scale.color_for(&rows[1], true), Some(NULL_COLOR));
        assert_eq!(scale.color_for(&rows[1], false), None);
        assert_eq!(scale.color_for(&rows[2], false), None);
    }
}
