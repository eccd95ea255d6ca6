//! Desktop client bridge.
//!
//! The desktop trading client is driven by an external automation program.
//! Each deal runs it once as `<program> <args..> <symbol> <side> <price> <quantity>`
//! with an unsigned quantity; exit status 0 means the order was placed.
//! Buys are rounded down to whole lots; sells go out as given so an odd-lot
//! remainder can be cleared.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};
use trigger_core::error::DealError;
use trigger_core::traits::TradeSink;
use trigger_core::types::Instrument;

use crate::side_of;

/// Automation program to run for each deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSinkConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Trade sink that shells out to the desktop automation program.
pub struct CommandSink {
    config: CommandSinkConfig,
}

impl CommandSink {
    pub fn new(config: CommandSinkConfig) -> Self {
        Self { config }
    }

    /// Quantity actually sent for a requested signed quantity.
    fn order_quantity(instrument: &Instrument, quantity: i64) -> Result<i64, DealError> {
        let sized = if quantity > 0 {
            instrument.round_to_lot(quantity)
        } else {
            quantity
        };
        if sized == 0 {
            return Err(DealError::QuantityTooSmall {
                requested: quantity,
                lot_size: instrument.lot_size,
            });
        }
        Ok(sized)
    }

    /// Arguments appended for a deal.
    fn deal_args(instrument: &Instrument, price: Decimal, quantity: i64) -> [String; 4] {
        let price = if price > Decimal::ZERO { price } else { Decimal::ZERO };
        [
            instrument.symbol.clone(),
            side_of(quantity).to_string(),
            price.normalize().to_string(),
            quantity.unsigned_abs().to_string(),
        ]
    }
}

#[async_trait]
impl TradeSink for CommandSink {
    async fn deal(
        &self,
        instrument: &Instrument,
        price: Decimal,
        quantity: i64,
    ) -> Result<(), DealError> {
        let quantity = Self::order_quantity(instrument, quantity)?;
        let deal_args = Self::deal_args(instrument, price, quantity);
        debug!(program = %self.config.program, args = ?deal_args, "Running desktop bridge");

        let output = Command::new(&self.config.program)
            .args(&self.config.args)
            .args(&deal_args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DealError::Rejected(format!(
                "{} exited with {}: {}",
                self.config.program,
                output.status,
                stderr.trim()
            )));
        }

        info!(
            symbol = %instrument.symbol,
            side = side_of(quantity),
            %price,
            quantity,
            "Desktop order placed"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "desktop"
    }
}
