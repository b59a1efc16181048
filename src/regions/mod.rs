//! Region catalog and wrap-aware region lookups
//!
//! # Submodules
//! - `grid` - Immutable 5x5 degree region catalog and point lookup
//! - `index` - World-space R-tree for viewport/selection rectangles

mod grid;
mod index;

pub use grid::{RegionDesc, RegionGrid, RegionId, DEFAULT_BIN_DEGREES};
pub use index::{RegionEnvelope, RegionIndex};
