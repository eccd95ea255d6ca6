//! Instrument identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Equity market an instrument trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Shanghai,
    Shenzhen,
    HongKong,
    Us,
}

impl Market {
    /// Foreign markets follow their own calendar; the domestic trading-day
    /// check is skipped for them.
    pub fn is_foreign(&self) -> bool {
        matches!(self, Market::HongKong | Market::Us)
    }

    /// Backend used when the rule does not name one.
    pub fn default_backend(&self) -> ExecutionBackend {
        if self.is_foreign() {
            ExecutionBackend::Streaming
        } else {
            ExecutionBackend::Desktop
        }
    }

    /// Lot size used when the rule does not name one.
    pub fn default_lot_size(&self) -> u32 {
        match self {
            Market::Shanghai | Market::Shenzhen | Market::HongKong => 100,
            Market::Us => 1,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Market::Shanghai => write!(f, "sh"),
            Market::Shenzhen => write!(f, "sz"),
            Market::HongKong => write!(f, "hk"),
            Market::Us => write!(f, "us"),
        }
    }
}

impl FromStr for Market {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sh" | "sse" | "shanghai" => Ok(Market::Shanghai),
            "sz" | "szse" | "shenzhen" => Ok(Market::Shenzhen),
            "hk" | "hkex" | "hongkong" => Ok(Market::HongKong),
            "us" | "nasdaq" | "nyse" => Ok(Market::Us),
            other => Err(ParseError::UnknownMarket(other.to_string())),
        }
    }
}

/// Execution backend a deal is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionBackend {
    /// Desktop client driven by GUI automation
    Desktop,
    /// Broker reached through a streaming/HTTP API gateway
    Streaming,
    /// In-process simulation
    Paper,
}

impl fmt::Display for ExecutionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionBackend::Desktop => write!(f, "desktop"),
            ExecutionBackend::Streaming => write!(f, "streaming"),
            ExecutionBackend::Paper => write!(f, "paper"),
        }
    }
}

impl FromStr for ExecutionBackend {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" | "gui" => Ok(ExecutionBackend::Desktop),
            "streaming" | "api" => Ok(ExecutionBackend::Streaming),
            "paper" | "sim" => Ok(ExecutionBackend::Paper),
            other => Err(ParseError::UnknownBackend(other.to_string())),
        }
    }
}

/// A tradable instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Symbol code
    pub symbol: String,
    /// Display name
    pub name: String,
    pub market: Market,
    pub backend: ExecutionBackend,
    /// Minimum tradable multiple
    pub lot_size: u32,
}

impl Instrument {
    /// Create an instrument with the market's default backend and lot size.
    pub fn new(symbol: impl Into<String>, market: Market) -> Self {
        let symbol = symbol.into();
        Self {
            name: symbol.clone(),
            symbol,
            market,
            backend: market.default_backend(),
            lot_size: market.default_lot_size(),
        }
    }

    /// Parse a market tag of the form `<market>[@<backend>]`.
    pub fn parse_market_tag(tag: &str) -> Result<(Market, ExecutionBackend), ParseError> {
        match tag.split_once('@') {
            Some((market, backend)) => Ok((market.parse()?, backend.parse()?)),
            None => {
                let market: Market = tag.parse()?;
                Ok((market, market.default_backend()))
            }
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_backend(mut self, backend: ExecutionBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_lot_size(mut self, lot_size: u32) -> Self {
        self.lot_size = lot_size.max(1);
        self
    }

    pub fn is_foreign(&self) -> bool {
        self.market.is_foreign()
    }

    /// Round a quantity magnitude down to a whole number of lots.
    pub fn round_to_lot(&self, quantity: i64) -> i64 {
        let lot = i64::from(self.lot_size.max(1));
        quantity.abs() / lot * lot
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.symbol, self.market)
    }
}
