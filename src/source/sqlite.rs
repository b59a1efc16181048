//! SQLite-backed record source
//!
//! One table holds every record. Each row carries its region id, exact and
//! interpolated footprints as geometry wire blobs, and any number of plain
//! display columns.

use anyhow::anyhow;
use base64::Engine;
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{DataSource, FieldMap, RecordKey, SourceRecord};
use crate::error::DataAccessError;
use crate::regions::RegionId;

/// SQLite keeps at most 999 host parameters on old builds
const KEY_CHUNK: usize = 500;

/// Table layout of the record store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteSourceConfig {
    pub table: String,
    pub key_column: String,
    pub region_column: String,
    pub exact_polygon_column: String,
    pub interpolated_polygon_column: String,
    /// Columns returned with every record
    pub field_columns: Vec<String>,
    /// Stored polygons use west-positive longitudes
    pub west_longitude: bool,
}

impl Default for SqliteSourceConfig {
    fn default() -> Self {
        Self {
            table: "records".to_string(),
            key_column: "record_key".to_string(),
            region_column: "region_id".to_string(),
            exact_polygon_column: "footprint".to_string(),
            interpolated_polygon_column: "footprint_interp".to_string(),
            field_columns: Vec::new(),
            west_longitude: false,
        }
    }
}

pub struct SqliteDataSource {
    conn: Mutex<Connection>,
    config: SqliteSourceConfig,
}

impl SqliteDataSource {
    /// Open an existing database read-only
    pub fn open(path: impl AsRef<Path>, config: SqliteSourceConfig) -> Result<Self, DataAccessError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        tracing::info!(path = %path.display(), table = %config.table, "Opened record database");
        Ok(Self::from_connection(conn, config))
    }

    pub fn from_connection(conn: Connection, config: SqliteSourceConfig) -> Self {
        Self {
            conn: Mutex::new(conn),
            config,
        }
    }

    pub fn config(&self) -> &SqliteSourceConfig {
        &self.config
    }

    fn records_sql(&self, select: &str, order_by: &str, interpolate: bool) -> String {
        let c = &self.config;
        let polygon = if interpolate {
            &c.interpolated_polygon_column
        } else {
            &c.exact_polygon_column
        };

        let mut columns = vec![quote_ident(&c.key_column), quote_ident(polygon)];
        columns.extend(c.field_columns.iter().map(|f| quote_ident(f)));

        let mut sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            columns.join(", "),
            quote_ident(&c.table),
            quote_ident(&c.region_column)
        );
        if !select.trim().is_empty() {
            sql.push_str(&format!(" AND ({})", select.trim()));
        }
        if !order_by.trim().is_empty() {
            sql.push_str(&format!(" ORDER BY {}", order_by.trim()));
        }
        sql
    }
}

impl DataSource for SqliteDataSource {
    fn fetch_records(
        &self,
        select: &str,
        order_by: &str,
        region: RegionId,
        interpolate: bool,
    ) -> Result<Vec<SourceRecord>, DataAccessError> {
        let sql = self.records_sql(select, order_by, interpolate);
        let width = 2 + self.config.field_columns.len();

        let rows: Vec<Vec<SqlValue>> = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare_cached(&sql)?;
            let mapped = stmt.query_map([region.0 as i64], |row| {
                (0..width)
                    .map(|i| row.get::<_, SqlValue>(i))
                    .collect::<Result<Vec<_>, _>>()
            })?;
            mapped.collect::<Result<Vec<_>, _>>()?
        };

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let mut values = row.into_iter();
            let key = record_key(values.next().unwrap_or(SqlValue::Null))?;
            let polygon = match values.next() {
                Some(SqlValue::Blob(bytes)) => bytes,
                Some(SqlValue::Null) | None => {
                    tracing::debug!(key = %key, region = %region, "Skipping record without footprint");
                    continue;
                }
                Some(_) => {
                    return Err(DataAccessError::Other(anyhow!(
                        "footprint of record {key} is not a blob"
                    )))
                }
            };
            let fields = self
                .config
                .field_columns
                .iter()
                .cloned()
                .zip(values.map(to_json))
                .collect();
            records.push(SourceRecord {
                key,
                polygon,
                fields,
            });
        }
        Ok(records)
    }

    fn fetch_fields(
        &self,
        keys: &[RecordKey],
        fields: &[String],
    ) -> Result<Vec<(RecordKey, FieldMap)>, DataAccessError> {
        if keys.is_empty() || fields.is_empty() {
            return Ok(Vec::new());
        }

        let c = &self.config;
        let mut columns = vec![quote_ident(&c.key_column)];
        columns.extend(fields.iter().map(|f| quote_ident(f)));

        let conn = self.conn.lock();
        let mut out = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(KEY_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT {} FROM {} WHERE {} IN ({})",
                columns.join(", "),
                quote_ident(&c.table),
                quote_ident(&c.key_column),
                placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter().map(|k| k.0.as_str())), |row| {
                    (0..=fields.len())
                        .map(|i| row.get::<_, SqlValue>(i))
                        .collect::<Result<Vec<_>, _>>()
                })?
                .collect::<Result<Vec<_>, _>>()?;

            for row in rows {
                let mut values = row.into_iter();
                let key = record_key(values.next().unwrap_or(SqlValue::Null))?;
                let map = fields.iter().cloned().zip(values.map(to_json)).collect();
                out.push((key, map));
            }
        }
        Ok(out)
    }

    fn west_longitude(&self) -> bool {
        self.config.west_longitude
    }
}

/// Double-quoted SQL identifier
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn record_key(value: SqlValue) -> Result<RecordKey, DataAccessError> {
    match value {
        SqlValue::Integer(i) => Ok(RecordKey(i.to_string())),
        SqlValue::Text(s) => Ok(RecordKey(s)),
        SqlValue::Real(f) => Ok(RecordKey(f.to_string())),
        SqlValue::Blob(_) | SqlValue::Null => {
            Err(DataAccessError::Other(anyhow!("record key must be an integer or text")))
        }
    }
}

fn to_json(value: SqlValue) -> serde_json::Value {
    match value {
        SqlValue::Null => serde_json::Value::Null,
        SqlValue::Integer(i) => i.into(),
        SqlValue::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        SqlValue::Text(s) => serde_json::Value::String(s),
        SqlValue::Blob(b) => {
            serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(b))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{encode_polygon, Path, Point};
    use pretty_assertions::assert_eq;
    use rusqlite::params;
    use serde_json::json;

    fn footprint(x: f64) -> Vec<u8> {
        let mut path = Path::new();
        path.move_to(Point::new(x, 0.0))
            .line_to(Point::new(x + 1.0, 0.0))
            .line_to(Point::new(x + 1.0, 1.0))
            .close();
        encode_polygon(&path)
    }

    fn source() -> (tempfile::TempDir, SqliteDataSource) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE records (
                record_key INTEGER PRIMARY KEY,
                region_id INTEGER NOT NULL,
                footprint BLOB,
                footprint_interp BLOB,
                target TEXT,
                exposure REAL
            );",
        )
        .unwrap();
        let rows: [(i64, i64, f64, &str, f64); 4] = [
            (1, 7, 1.0, "crater", 2.5),
            (2, 7, 2.0, "ridge", 0.5),
            (3, 7, 3.0, "crater", 1.0),
            (4, 8, 4.0, "plain", 9.0),
        ];
        for (key, region, x, target, exposure) in rows {
            conn.execute(
                "INSERT INTO records VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![key, region, footprint(x), footprint(x + 100.0), target, exposure],
            )
            .unwrap();
        }
        conn.execute(
            "INSERT INTO records VALUES (5, 7, NULL, NULL, 'missing', 0.0)",
            [],
        )
        .unwrap();
        drop(conn);

        let config = SqliteSourceConfig {
            field_columns: vec!["target".to_string()],
            ..Default::default()
        };
        let source = SqliteDataSource::open(&path, config).unwrap();
        (dir, source)
    }

    fn keys(records: &[SourceRecord]) -> Vec<String> {
        records.iter().map(|r| r.key.0.clone()).collect()
    }

    #[test]
    fn fetches_region_with_filter_and_order() {
        let (_dir, source) = source();
        let all = source.fetch_records("", "", RegionId(7), false).unwrap();
        assert_eq!(keys(&all), vec!["1", "2", "3"]);
        assert_eq!(all[0].polygon, footprint(1.0));
        assert_eq!(all[0].fields.get("target"), Some(&json!("crater")));

        let craters = source
            .fetch_records("target = 'crater'", "exposure ASC", RegionId(7), false)
            .unwrap();
        assert_eq!(keys(&craters), vec!["3", "1"]);
    }

    #[test]
    fn interpolate_selects_the_other_column() {
        let (_dir, source) = source();
        let records = source.fetch_records("", "", RegionId(8), true).unwrap();
        assert_eq!(records[0].polygon, footprint(104.0));
    }

    #[test]
    fn bad_clause_is_a_data_access_error() {
        let (_dir, source) = source();
        let err = source
            .fetch_records("no_such_column = 1", "", RegionId(7), false)
            .unwrap_err();
        assert!(matches!(err, DataAccessError::Database(_)));
    }

    #[test]
    fn fetches_extra_fields_by_key() {
        let (_dir, source) = source();
        let rows = source
            .fetch_fields(
                &[RecordKey::from("2"), RecordKey::from("4")],
                &["exposure".to_string(), "target".to_string()],
            )
            .unwrap();
        assert_eq!(rows.len(), 2);
        let (_, fields) = rows
            .iter()
            .find(|(key, _)| key == &RecordKey::from("2"))
            .unwrap();
        assert_eq!(fields.get("exposure"), Some(&json!(0.5)));
        assert_eq!(fields.get("target"), Some(&json!("ridge")));
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
