//! Held positions and the local position book.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A position held in a single instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Symbol
    pub symbol: String,
    /// Shares held
    pub quantity: i64,
    /// Shares that can be sold today
    pub available: i64,
    /// Average cost price
    pub cost_price: Decimal,
}

impl Holding {
    /// Create a fully available holding.
    pub fn new(symbol: impl Into<String>, quantity: i64, cost_price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            available: quantity,
            cost_price,
        }
    }

    /// Set the available balance.
    pub fn with_available(mut self, available: i64) -> Self {
        self.available = available;
        self
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    /// Apply a signed fill (positive buys, negative sells).
    ///
    /// Buys move the average cost; sells reduce both quantity and the
    /// available balance. Bought shares only become available immediately
    /// when `settles_same_day` is set.
    pub fn apply_fill(&mut self, quantity: i64, price: Decimal, settles_same_day: bool) {
        if quantity > 0 {
            let total_cost = Decimal::from(self.quantity) * self.cost_price
                + Decimal::from(quantity) * price;
            let new_quantity = self.quantity + quantity;
            if new_quantity != 0 {
                self.cost_price = total_cost / Decimal::from(new_quantity);
            }
            self.quantity = new_quantity;
            if settles_same_day {
                self.available += quantity;
            }
        } else {
            let sold = quantity.abs().min(self.quantity.max(0));
            self.quantity -= sold;
            self.available = (self.available - sold).max(0);
        }
    }
}

/// Local bookkeeping of holdings, updated optimistically after deals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionBook {
    holdings: HashMap<String, Holding>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a book from a list of holdings.
    pub fn from_holdings(holdings: impl IntoIterator<Item = Holding>) -> Self {
        Self {
            holdings: holdings
                .into_iter()
                .map(|h| (h.symbol.clone(), h))
                .collect(),
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&Holding> {
        self.holdings.get(symbol)
    }

    pub fn insert(&mut self, holding: Holding) {
        self.holdings.insert(holding.symbol.clone(), holding);
    }

    /// Record a successful deal. Flat holdings are removed.
    pub fn apply_deal(&mut self, symbol: &str, quantity: i64, price: Decimal, settles_same_day: bool) {
        let holding = self
            .holdings
            .entry(symbol.to_string())
            .or_insert_with(|| Holding::new(symbol, 0, Decimal::ZERO));
        holding.apply_fill(quantity, price, settles_same_day);

        if holding.is_flat() {
            self.holdings.remove(symbol);
        }
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Holding> {
        self.holdings.values()
    }
}
