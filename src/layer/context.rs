//! Query contexts

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// User-editable part of a context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContextDef {
    pub name: String,
    /// SQL filter expression; empty selects everything
    pub select: String,
    /// SQL ordering expression; empty keeps source order
    pub order_by: String,
    /// Draw exact footprints instead of interpolated ones
    pub draw_real: bool,
    /// Draw records whose color-by value is null
    pub draw_null: bool,
    pub color_by: Option<String>,
    /// Extra display fields loaded after each fetch
    pub fields: Vec<String>,
}

impl Default for ContextDef {
    fn default() -> Self {
        Self {
            name: "Untitled".to_string(),
            select: String::new(),
            order_by: String::new(),
            draw_real: true,
            draw_null: true,
            color_by: None,
            fields: Vec::new(),
        }
    }
}

/// A registered query configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub id: ContextId,
    #[serde(flatten)]
    pub def: ContextDef,
}

impl Context {
    pub fn new(id: ContextId, def: ContextDef) -> Self {
        Self { id, def }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Interpolated footprints are fetched unless exact ones are requested
    pub fn interpolate(&self) -> bool {
        !self.def.draw_real
    }

    /// Apply a partial update and report which fields actually changed
    pub fn apply(&mut self, update: ContextUpdate) -> Vec<ContextField> {
        let mut changed = Vec::new();
        let def = &mut self.def;

        macro_rules! set {
            ($field:ident, $kind:expr) => {
                if let Some(value) = update.$field {
                    if def.$field != value {
                        def.$field = value;
                        changed.push($kind);
                    }
                }
            };
        }

        set!(name, ContextField::Name);
        set!(select, ContextField::Select);
        set!(order_by, ContextField::OrderBy);
        set!(draw_real, ContextField::DrawReal);
        set!(draw_null, ContextField::DrawNull);
        if let Some(color_by) = update.color_by {
            let color_by = Some(color_by).filter(|c| !c.is_empty());
            if def.color_by != color_by {
                def.color_by = color_by;
                changed.push(ContextField::ColorBy);
            }
        }
        set!(fields, ContextField::Fields);
        changed
    }
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContextUpdate {
    pub name: Option<String>,
    pub select: Option<String>,
    pub order_by: Option<String>,
    pub draw_real: Option<bool>,
    pub draw_null: Option<bool>,
    /// An empty string clears the color-by field
    pub color_by: Option<String>,
    pub fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ContextField {
    Name,
    Select,
    OrderBy,
    DrawReal,
    DrawNull,
    ColorBy,
    Fields,
}

impl ContextField {
    /// Changes that alter what is drawn
    pub fn needs_redraw(self) -> bool {
        matches!(
            self,
            Self::Select | Self::OrderBy | Self::DrawReal | Self::DrawNull | Self::ColorBy
        )
    }

    /// Changes that make fetched rows stale
    pub fn invalidates_rows(self) -> bool {
        matches!(self, Self::Select | Self::OrderBy)
    }
}
