//! Fetched records as handed to the results panel

use base64::Engine;
use serde::{Serialize, Serializer};

use crate::geometry::{encode_polygon, Polygon};
use crate::source::{FieldMap, RecordKey};

/// One record that survived the hit test, with its decoded footprint in
/// spatial east longitude
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRecord {
    pub key: RecordKey,
    pub fields: FieldMap,
    /// Sent as base64 geometry wire bytes
    #[serde(serialize_with = "polygon_as_base64")]
    pub polygon: Polygon,
    /// `None` when the record is not drawn
    pub color: Option<[f32; 4]>,
}

impl FetchRecord {
    /// Polygon in geometry wire form
    pub fn polygon_bytes(&self) -> Vec<u8> {
        encode_polygon(&self.polygon.to_path())
    }

    /// Merge enrichment fields; existing values are overwritten
    pub fn merge_fields(&mut self, fields: FieldMap) {
        for (name, value) in fields {
            self.fields.insert(name, value);
        }
    }
}

fn polygon_as_base64<S: Serializer>(polygon: &Polygon, serializer: S) -> Result<S::Ok, S::Error> {
    let bytes = encode_polygon(&polygon.to_path());
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{decode_polygon, Rect};
    use serde_json::json;

    #[test]
    fn serializes_polygon_as_wire_bytes() {
        let record = FetchRecord {
            key: RecordKey::from("42"),
            fields: FieldMap::new(),
            polygon: Polygon::from_rect(&Rect::new(0.0, 0.0, 1.0, 1.0)),
            color: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["key"], json!("42"));

        let encoded = value["polygon"].as_str().unwrap();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        assert_eq!(bytes, record.polygon_bytes());
        assert_eq!(decode_polygon(&bytes).unwrap(), record.polygon);
    }
}
