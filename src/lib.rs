//! Selectable instrument-footprint layer for a map display
//!
//! Records with polygon footprints live in a database partitioned into
//! latitude/longitude regions. Each view keeps a set of query contexts;
//! at most one is active, owning the shared render buffers and results
//! dialog. Clicks and box drags resolve to regions through an R-tree, the
//! matching records are fetched on a background worker and filtered by an
//! exact hit test, then handed back to the UI thread as display events.
//!
//! # Modules
//! - `geometry` - Footprint primitives, the binary codec and hit tests
//! - `projection` - Spatial/world/screen coordinate conversion
//! - `regions` - Region grid and the R-tree over projected region bounds
//! - `source` - Record data access (SQLite)
//! - `runtime` - Observer lists, the serial task queue and the UI clock
//! - `layer` - Contexts, buffer state, selection fetches and results panels
//! - `rpc` - JSON-RPC front end used by `layer_server`
//! - `config` / `logging` / `error` - Ambient plumbing

pub mod config;
pub mod error;
pub mod geometry;
pub mod layer;
pub mod logging;
pub mod projection;
pub mod regions;
pub mod rpc;
pub mod runtime;
pub mod source;

pub use config::LayerConfig;
pub use error::{ConfigError, DataAccessError, GeometryError, LayerError};
pub use layer::{ContextDef, ContextId, InstrumentLayer, LayerEvent, LayerView};
pub use projection::{Equirectangular, Projection, ScreenTransform};
pub use regions::{RegionGrid, RegionId, RegionIndex};
pub use source::{DataSource, RecordKey, SqliteDataSource};
