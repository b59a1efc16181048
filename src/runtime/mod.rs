//! Background execution primitives
//!
//! # Submodules
//! - `observers` - Typed observer list with catch-and-continue delivery
//! - `queue` - Serializing FIFO task queue on one dedicated thread
//! - `clock` - Periodic broadcaster

mod clock;
mod observers;
mod queue;

pub use clock::{ClockEvent, ClockHandle, PeriodicClock};
pub use observers::{Observer, ObserverList, SubscriptionId};
pub use queue::SerialQueue;
