//! Stop-loss and stop-profit watches built from held positions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use trigger_core::traits::TradeSink;
use trigger_core::types::{Holding, Instrument};

use crate::threshold::{BaseSpec, BounceSpec};
use crate::watch::Watch;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Protective rule applied to a holding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopRule {
    /// Sell everything available once price touches `cost * (1 - loss_pct%)`
    StopLoss { loss_pct: Decimal },
    /// Sell once price breaks `cost * (1 + profit_pct%)` and gives back `bounce_pct%`
    StopProfit { profit_pct: Decimal, bounce_pct: Decimal },
}

impl StopRule {
    /// Build the watch for a holding; `None` when nothing is available to sell.
    pub fn build(
        &self,
        instrument: Instrument,
        holding: &Holding,
        sink: Arc<dyn TradeSink>,
    ) -> Option<Watch> {
        match *self {
            StopRule::StopLoss { loss_pct } => Watch::stop_loss(instrument, holding, loss_pct, sink),
            StopRule::StopProfit {
                profit_pct,
                bounce_pct,
            } => Watch::stop_profit(instrument, holding, profit_pct, bounce_pct, sink),
        }
    }
}

impl Watch {
    /// Stop-loss: fires on the first tick after touching the stop price.
    pub fn stop_loss(
        instrument: Instrument,
        holding: &Holding,
        loss_pct: Decimal,
        sink: Arc<dyn TradeSink>,
    ) -> Option<Watch> {
        if holding.available <= 0 {
            return None;
        }
        let base = holding.cost_price * (Decimal::ONE - loss_pct / HUNDRED);

        Some(Watch::new(
            instrument,
            BaseSpec::Absolute(base),
            false,
            BounceSpec::Absolute(Decimal::ZERO),
            -holding.available,
            sink,
        ))
    }

    /// Stop-profit: trails the high after the target and sells on a pullback.
    pub fn stop_profit(
        instrument: Instrument,
        holding: &Holding,
        profit_pct: Decimal,
        bounce_pct: Decimal,
        sink: Arc<dyn TradeSink>,
    ) -> Option<Watch> {
        if holding.available <= 0 {
            return None;
        }
        let base = holding.cost_price * (Decimal::ONE + profit_pct / HUNDRED);

        Some(Watch::new(
            instrument,
            BaseSpec::Absolute(base),
            true,
            BounceSpec::Percent(bounce_pct / HUNDRED),
            -holding.available,
            sink,
        ))
    }
}
