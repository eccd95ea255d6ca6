//! Core data types for the trigger engine.

mod holding;
mod instrument;
mod lifecycle;
mod quote;

pub use holding::{Holding, PositionBook};
pub use instrument::{ExecutionBackend, Instrument, Market};
pub use lifecycle::{DoneReason, WatchState};
pub use quote::{PriceBasis, PriceState, Quote};
