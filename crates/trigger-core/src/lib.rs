//! Core types and traits for the condition-order trigger engine.
//!
//! This crate provides the foundational building blocks including:
//! - Quotes and the feed-owned price state
//! - Instrument identity (market, execution backend, lot size)
//! - Holdings used by the stop-loss/stop-profit factories
//! - The capability traits the engine calls out through: trade sinks,
//!   consumed-rule stores, notifiers and trading calendars

pub mod error;
pub mod traits;
pub mod types;

pub use error::{DataError, DealError, ParseError, StoreError, TriggerError, TriggerResult, WatchError};
pub use traits::*;
pub use types::*;
