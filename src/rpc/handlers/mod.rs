//! Handler module declarations and re-exports

pub mod context;
pub mod query;
pub mod selection;

// Re-export all handlers for convenient access
pub use context::*;
pub use query::*;
pub use selection::*;
