//! CSV holdings source.

use csv::{ReaderBuilder, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use trigger_core::error::DataError;
use trigger_core::types::Holding;

/// One held position as exported from the trading client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HoldingRecord {
    #[serde(alias = "symbol")]
    pub code: String,
    /// Market tag, `<market>[@<backend>]`
    pub market: String,
    pub quantity: i64,
    /// Defaults to the full quantity
    #[serde(default)]
    pub available: Option<i64>,
    #[serde(alias = "cost")]
    pub cost_price: Decimal,
}

impl HoldingRecord {
    pub fn holding(&self) -> Holding {
        let holding = Holding::new(self.code.clone(), self.quantity, self.cost_price);
        match self.available {
            Some(available) => holding.with_available(available),
            None => holding,
        }
    }
}

/// Load holdings from a CSV file.
pub fn load_holdings(path: impl AsRef<Path>) -> Result<Vec<HoldingRecord>, DataError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DataError::NotFound(path.display().to_string()));
    }
    let reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_path(path)
        .map_err(|e| DataError::Csv(e.to_string()))?;
    read_holdings(reader)
}

/// Load holdings from any reader.
pub fn load_holdings_from_reader<R: Read>(input: R) -> Result<Vec<HoldingRecord>, DataError> {
    let reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(input);
    read_holdings(reader)
}

fn read_holdings<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<HoldingRecord>, DataError> {
    reader
        .deserialize()
        .map(|result| result.map_err(|e| DataError::Csv(e.to_string())))
        .collect()
}
