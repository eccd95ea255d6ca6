//! CSV quote replay source.

use chrono::NaiveDateTime;
use csv::{ReaderBuilder, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use trigger_core::error::{DataError, ParseError};
use trigger_core::types::{PriceBasis, Quote};

/// CSV record format.
#[derive(Debug, Deserialize)]
struct QuoteRecord {
    #[serde(alias = "Timestamp", alias = "time", alias = "datetime")]
    timestamp: String,
    #[serde(alias = "symbol", alias = "Symbol")]
    code: String,
    #[serde(default)]
    basis: Option<String>,
    price: Decimal,
    #[serde(default)]
    prev_close: Option<Decimal>,
    #[serde(default)]
    open: Option<Decimal>,
    #[serde(default)]
    high: Option<Decimal>,
    #[serde(default)]
    low: Option<Decimal>,
    #[serde(default)]
    volume: Option<Decimal>,
}

/// Replays recorded quotes in time order.
pub struct QuoteReplaySource {
    path: PathBuf,
}

impl QuoteReplaySource {
    /// Create a new replay source.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DataError::NotFound(path.display().to_string()));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Load all quotes, sorted by timestamp.
    pub fn load_all(&self) -> Result<Vec<Quote>, DataError> {
        let reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_path(&self.path)
            .map_err(|e| DataError::Csv(e.to_string()))?;
        read_quotes(reader)
    }

    /// Load quotes from any reader.
    pub fn load_from_reader<R: Read>(input: R) -> Result<Vec<Quote>, DataError> {
        let reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(input);
        read_quotes(reader)
    }
}

fn read_quotes<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<Quote>, DataError> {
    let mut quotes = Vec::new();

    for result in reader.deserialize() {
        let record: QuoteRecord = result.map_err(|e| DataError::Csv(e.to_string()))?;
        quotes.push(to_quote(record)?);
    }

    // Stable sort keeps file order for equal timestamps
    quotes.sort_by_key(|q| q.timestamp);

    Ok(quotes)
}

fn to_quote(record: QuoteRecord) -> Result<Quote, DataError> {
    let timestamp = parse_timestamp(&record.timestamp)
        .map_err(|source| DataError::Record { line: 0, source })?;
    let basis = match record.basis.as_deref() {
        Some(text) if !text.is_empty() => text
            .parse()
            .map_err(|source| DataError::Record { line: 0, source })?,
        _ => PriceBasis::Latest,
    };

    Ok(Quote {
        symbol: record.code,
        basis,
        price: record.price,
        prev_close: record.prev_close,
        open: record.open,
        high: record.high,
        low: record.low,
        volume: record.volume.unwrap_or(Decimal::ZERO),
        timestamp,
    })
}

/// Parse the timestamp formats replay files use.
fn parse_timestamp(text: &str) -> Result<NaiveDateTime, ParseError> {
    let formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];

    for format in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(dt);
        }
    }

    Err(ParseError::InvalidRecord(format!(
        "Could not parse timestamp: {}",
        text
    )))
}
