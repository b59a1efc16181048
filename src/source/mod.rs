//! Record data sources
//!
//! # Submodules
//! - `sqlite` - SQLite-backed source (rusqlite)

mod sqlite;

pub use sqlite::{SqliteDataSource, SqliteSourceConfig};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DataAccessError;
use crate::regions::RegionId;

/// Opaque per-record key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(pub String);

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Field name -> value, in column order
pub type FieldMap = IndexMap<String, serde_json::Value>;

/// One row as returned by a source; the polygon is still in wire form
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub key: RecordKey,
    pub polygon: Vec<u8>,
    pub fields: FieldMap,
}

/// Record store queried by the selection fetch worker.
///
/// Calls happen on fetch and queue threads, never on the UI thread.
pub trait DataSource: Send + Sync {
    /// Records of one region matching `select`, ordered by `order_by`.
    /// Empty clauses mean "everything" and "source order".
    fn fetch_records(
        &self,
        select: &str,
        order_by: &str,
        region: RegionId,
        interpolate: bool,
    ) -> Result<Vec<SourceRecord>, DataAccessError>;

    /// Extra display fields for already fetched records
    fn fetch_fields(
        &self,
        keys: &[RecordKey],
        fields: &[String],
    ) -> Result<Vec<(RecordKey, FieldMap)>, DataAccessError>;

    /// Whether stored polygons use west-positive longitudes
    fn west_longitude(&self) -> bool {
        false
    }
}

/// Source used when no record database is configured; every fetch fails
#[derive(Debug, Default)]
pub struct UnavailableSource;

impl DataSource for UnavailableSource {
    fn fetch_records(
        &self,
        _select: &str,
        _order_by: &str,
        _region: RegionId,
        _interpolate: bool,
    ) -> Result<Vec<SourceRecord>, DataAccessError> {
        Err(DataAccessError::Unavailable(
            "no record database configured".to_string(),
        ))
    }

    fn fetch_fields(
        &self,
        _keys: &[RecordKey],
        _fields: &[String],
    ) -> Result<Vec<(RecordKey, FieldMap)>, DataAccessError> {
        Err(DataAccessError::Unavailable(
            "no record database configured".to_string(),
        ))
    }
}
