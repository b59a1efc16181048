//! Instrument layer: contexts, shared render buffers and selection fetches
//!
//! # Submodules
//! - `context` - Query contexts and partial updates
//! - `events` - Buffer slots, redraw requests and display events
//! - `buffers` - Per-context buffer visibility state machine
//! - `panel` - Results panel and shared results dialog
//! - `record` - Fetched records
//! - `color` - Record colors from the color-by field
//! - `fetch` - Single-flight background selection fetch worker
//! - `view` - Per-view glue driven from the UI thread

mod buffers;
mod color;
mod context;
mod events;
mod fetch;
mod panel;
mod record;
mod view;

pub use buffers::{BufferManager, ContextState};
pub use color::{ColorScale, DEFAULT_COLOR, NULL_COLOR};
pub use context::{Context, ContextDef, ContextField, ContextId, ContextUpdate};
pub use events::{BufferSlot, LayerEvent, RedrawRequest};
pub use fetch::{FetchMessage, FetchQuery, FetchWorker};
pub use panel::{title_for, ResultsDialog, ResultsPanel, DEFAULT_TITLE};
pub use record::FetchRecord;
pub use view::{InstrumentLayer, LayerView};
