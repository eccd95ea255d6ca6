//! Quotes and feed-owned price state.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Which price a quote carries.
///
/// Watches evaluated against the previous close are only trusted around
/// the open; see the staleness guard in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriceBasis {
    PreviousClose,
    Latest,
}

impl fmt::Display for PriceBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceBasis::PreviousClose => write!(f, "previous-close"),
            PriceBasis::Latest => write!(f, "latest"),
        }
    }
}

impl FromStr for PriceBasis {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "previous-close" | "prev_close" | "prev-close" | "close" => Ok(PriceBasis::PreviousClose),
            "latest" | "last" | "now" => Ok(PriceBasis::Latest),
            other => Err(ParseError::UnknownBasis(other.to_string())),
        }
    }
}

/// Price state for one instrument, refreshed by the feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceState {
    /// Previous session close
    pub prev_close: Option<Decimal>,
    /// Today's open
    pub open: Option<Decimal>,
    /// Latest traded price
    pub latest: Option<Decimal>,
    /// Session high
    pub high: Option<Decimal>,
    /// Session low
    pub low: Option<Decimal>,
}

impl PriceState {
    /// Price for the given basis, if the feed has one.
    pub fn price_for(&self, basis: PriceBasis) -> Option<Decimal> {
        match basis {
            PriceBasis::PreviousClose => self.prev_close,
            PriceBasis::Latest => self.latest,
        }
    }
}

/// An immutable snapshot of price data for one instrument at one moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Symbol code
    pub symbol: String,
    /// Basis the price was sampled on
    pub basis: PriceBasis,
    /// Price the watch evaluates (zero when unavailable)
    pub price: Decimal,
    /// Previous session close, used to resolve percentage bases
    pub prev_close: Option<Decimal>,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    /// Traded volume
    pub volume: Decimal,
    /// Exchange-local time of the snapshot
    pub timestamp: NaiveDateTime,
}

impl Quote {
    /// Create a quote carrying only a price.
    pub fn new(
        symbol: impl Into<String>,
        basis: PriceBasis,
        price: Decimal,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            basis,
            price,
            prev_close: None,
            open: None,
            high: None,
            low: None,
            volume: Decimal::ZERO,
            timestamp,
        }
    }

    /// Build a quote from the feed's price state. Missing prices become zero,
    /// which watches treat as "no quote yet".
    pub fn from_state(
        symbol: impl Into<String>,
        state: &PriceState,
        basis: PriceBasis,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            basis,
            price: state.price_for(basis).unwrap_or(Decimal::ZERO),
            prev_close: state.prev_close,
            open: state.open,
            high: state.high,
            low: state.low,
            volume: Decimal::ZERO,
            timestamp,
        }
    }

    /// Set the previous close.
    pub fn with_prev_close(mut self, prev_close: Decimal) -> Self {
        self.prev_close = Some(prev_close);
        self
    }

    /// Set the traded volume.
    pub fn with_volume(mut self, volume: Decimal) -> Self {
        self.volume = volume;
        self
    }

    /// Whether the quote carries a usable price.
    pub fn has_price(&self) -> bool {
        self.price > Decimal::ZERO
    }

    /// Change from the previous close as a fraction.
    pub fn change_fraction(&self) -> Option<Decimal> {
        match self.prev_close {
            Some(prev) if prev > Decimal::ZERO => Some((self.price - prev) / prev),
            _ => None,
        }
    }
}
