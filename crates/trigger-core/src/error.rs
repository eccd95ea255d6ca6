//! Error types for the trigger engine.

use rust_decimal::Decimal;
use thiserror::Error;

/// Top-level trigger engine error.
#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Deal error: {0}")]
    Deal(#[from] DealError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while parsing rule records and threshold specs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid number: {0:?}")]
    InvalidNumber(String),

    #[error("Percent range must be ordered smaller-first: {0:?}")]
    UnorderedRange(String),

    #[error("Range not allowed here: {0:?}")]
    RangeNotAllowed(String),

    #[error("Unknown market: {0:?}")]
    UnknownMarket(String),

    #[error("Unknown execution backend: {0:?}")]
    UnknownBackend(String),

    #[error("Unknown price basis: {0:?}")]
    UnknownBasis(String),

    #[error("Invalid time (expected HH:MM:SS): {0:?}")]
    InvalidTime(String),

    #[error("Invalid date (expected YYYY-MM-DD): {0:?}")]
    InvalidDate(String),

    #[error("Invalid boolean: {0:?}")]
    InvalidBool(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// Errors reported by trade sinks.
///
/// The watch only distinguishes success from failure; the variants exist for
/// notifications and logs.
#[derive(Error, Debug)]
pub enum DealError {
    #[error("Deal rejected: {0}")]
    Rejected(String),

    #[error("Quantity {requested} rounds to zero at lot size {lot_size}")]
    QuantityTooSmall { requested: i64, lot_size: u32 },

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("Insufficient position in {symbol}: requested {requested}, available {available}")]
    InsufficientPosition {
        symbol: String,
        requested: i64,
        available: i64,
    },

    #[error("No price available for {0}")]
    NoPrice(String),

    #[error("Deal timed out after {0} seconds")]
    Timeout(u64),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Rule and quote source errors.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Line {line}: {source}")]
    Record {
        line: u64,
        #[source]
        source: ParseError,
    },
}

/// Consumed-rule store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Errors raised while a watch evaluates a quote.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Arithmetic overflow while computing {0}")]
    Overflow(&'static str),
}

/// Result type alias for trigger operations.
pub type TriggerResult<T> = Result<T, TriggerError>;
