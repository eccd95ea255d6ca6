//! Paper trading sink for replays and simulation.

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;
use trigger_core::error::DealError;
use trigger_core::traits::TradeSink;
use trigger_core::types::{Holding, Instrument, PositionBook};

/// A simulated fill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaperFill {
    pub symbol: String,
    /// Signed quantity: positive buys, negative sells
    pub quantity: i64,
    pub price: Decimal,
    pub timestamp: NaiveDateTime,
}

/// Simulated cash and holdings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PaperAccount {
    pub cash: Decimal,
    pub holdings: PositionBook,
    /// Last known price per symbol, used for market deals
    pub marks: HashMap<String, Decimal>,
    pub fills: Vec<PaperFill>,
}

impl PaperAccount {
    /// Cash plus holdings valued at their marks (cost when unmarked).
    pub fn equity(&self) -> Decimal {
        self.cash
            + self
                .holdings
                .iter()
                .map(|h| {
                    let price = self.marks.get(&h.symbol).copied().unwrap_or(h.cost_price);
                    Decimal::from(h.quantity) * price
                })
                .sum::<Decimal>()
    }
}

/// Paper trading sink.
///
/// Buys are clamped to what the cash affords and sells to the available
/// balance, then rounded down to the lot size. A sell of the whole
/// available balance may leave an odd lot.
pub struct PaperSink {
    account: Arc<Mutex<PaperAccount>>,
    slippage_pct: Decimal,
}

impl PaperSink {
    /// Create a new paper sink with starting cash.
    pub fn new(initial_cash: Decimal) -> Self {
        Self {
            account: Arc::new(Mutex::new(PaperAccount {
                cash: initial_cash,
                ..PaperAccount::default()
            })),
            slippage_pct: dec!(0.05), // 0.05% slippage
        }
    }

    /// Set slippage percentage.
    pub fn with_slippage(mut self, slippage_pct: Decimal) -> Self {
        self.slippage_pct = slippage_pct;
        self
    }

    /// Seed the account with existing holdings.
    pub fn with_holdings(self, holdings: impl IntoIterator<Item = Holding>) -> Self {
        {
            let mut account = self.lock_recovered();
            for holding in holdings {
                account.holdings.insert(holding);
            }
        }
        self
    }

    /// Update the mark price of a symbol.
    pub fn set_mark(&self, symbol: &str, price: Decimal) {
        if price > Decimal::ZERO {
            self.lock_recovered().marks.insert(symbol.to_string(), price);
        }
    }

    /// Update all mark prices.
    pub fn update_marks(&self, prices: &HashMap<String, Decimal>) {
        let mut account = self.lock_recovered();
        for (symbol, price) in prices {
            if *price > Decimal::ZERO {
                account.marks.insert(symbol.clone(), *price);
            }
        }
    }

    /// Get a snapshot of the account.
    pub fn snapshot(&self) -> PaperAccount {
        self.lock_recovered().clone()
    }

    pub fn cash(&self) -> Decimal {
        self.lock_recovered().cash
    }

    pub fn fills(&self) -> Vec<PaperFill> {
        self.lock_recovered().fills.clone()
    }

    fn lock(&self) -> Result<MutexGuard<'_, PaperAccount>, DealError> {
        self.account
            .lock()
            .map_err(|_| DealError::Backend("paper account lock poisoned".to_string()))
    }

    fn lock_recovered(&self) -> MutexGuard<'_, PaperAccount> {
        self.account.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn fill_price(&self, price: Decimal, buying: bool) -> Decimal {
        let slip = self.slippage_pct / dec!(100);
        if buying {
            price * (Decimal::ONE + slip)
        } else {
            price * (Decimal::ONE - slip)
        }
    }
}

#[async_trait]
impl TradeSink for PaperSink {
    async fn deal(
        &self,
        instrument: &Instrument,
        price: Decimal,
        quantity: i64,
    ) -> Result<(), DealError> {
        let symbol = instrument.symbol.as_str();
        let lot_size = instrument.lot_size;

        if instrument.round_to_lot(quantity) == 0 && quantity > 0 {
            return Err(DealError::QuantityTooSmall {
                requested: quantity,
                lot_size,
            });
        }

        let mut account = self.lock()?;

        let reference = if price > Decimal::ZERO {
            price
        } else {
            account
                .marks
                .get(symbol)
                .copied()
                .ok_or_else(|| DealError::NoPrice(symbol.to_string()))?
        };
        let buying = quantity > 0;
        let fill_price = self.fill_price(reference, buying);

        let signed = if buying {
            let affordable = account
                .cash
                .checked_div(fill_price)
                .and_then(|shares| shares.floor().to_i64())
                .unwrap_or(0);
            let filled = instrument.round_to_lot(quantity.min(affordable));
            if filled == 0 {
                return Err(DealError::InsufficientFunds {
                    required: fill_price * Decimal::from(lot_size),
                    available: account.cash,
                });
            }
            filled
        } else {
            let available = account.holdings.get(symbol).map(|h| h.available).unwrap_or(0);
            let wanted = quantity.abs();
            let filled = if wanted >= available {
                available
            } else {
                instrument.round_to_lot(wanted)
            };
            if filled <= 0 {
                return Err(if available <= 0 {
                    DealError::InsufficientPosition {
                        symbol: symbol.to_string(),
                        requested: wanted,
                        available,
                    }
                } else {
                    DealError::QuantityTooSmall {
                        requested: quantity,
                        lot_size,
                    }
                });
            }
            -filled
        };

        let value = fill_price * Decimal::from(signed);
        account.cash -= value;
        account
            .holdings
            .apply_deal(symbol, signed, fill_price, instrument.is_foreign());
        account.marks.insert(symbol.to_string(), reference);
        account.fills.push(PaperFill {
            symbol: symbol.to_string(),
            quantity: signed,
            price: fill_price,
            timestamp: Local::now().naive_local(),
        });

        info!(
            %symbol,
            requested = quantity,
            filled = signed,
            price = %fill_price,
            cash = %account.cash,
            "Paper fill"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "paper"
    }
}
