//! Notification sink trait.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

use crate::types::DoneReason;

/// Events a watch reports while it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// First breakout: the watch is now tracking the extreme
    Armed {
        symbol: String,
        price: Decimal,
        base: Decimal,
    },
    /// Retracement reached but the signal looked stale; still armed
    StaleSkipped {
        symbol: String,
        price: Decimal,
        extreme: Decimal,
        delta: Decimal,
        expected: Decimal,
    },
    /// Trade dispatched
    Dispatched {
        symbol: String,
        price: Decimal,
        quantity: i64,
        success: bool,
        detail: String,
    },
    /// Deal placed but the rule could not be marked consumed; mark it by hand
    NotPersisted {
        symbol: String,
        rule_id: String,
        error: String,
    },
    /// Watch deactivated without firing
    Deactivated { symbol: String, reason: DoneReason },
    /// Evaluation raised an error or panicked
    EvaluationFailed { symbol: String, error: String },
}

impl Notification {
    pub fn symbol(&self) -> &str {
        match self {
            Notification::Armed { symbol, .. }
            | Notification::StaleSkipped { symbol, .. }
            | Notification::Dispatched { symbol, .. }
            | Notification::NotPersisted { symbol, .. }
            | Notification::Deactivated { symbol, .. }
            | Notification::EvaluationFailed { symbol, .. } => symbol,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Armed { symbol, price, base } => {
                write!(f, "{symbol}: first breakout at {price} (base {base}), tracking extreme")
            }
            Notification::StaleSkipped {
                symbol,
                price,
                extreme,
                delta,
                expected,
            } => write!(
                f,
                "{symbol}: skipped stale signal at {price} (extreme {extreme}, delta {delta}, expected {expected})"
            ),
            Notification::Dispatched {
                symbol,
                price,
                quantity,
                success,
                detail,
            } => {
                let outcome = if *success { "succeeded" } else { "failed" };
                write!(f, "{symbol}: deal {quantity} @ {price} {outcome}: {detail}")
            }
            Notification::NotPersisted { symbol, rule_id, error } => {
                write!(f, "{symbol}: deal placed but rule {rule_id} not marked consumed: {error}")
            }
            Notification::Deactivated { symbol, reason } => {
                write!(f, "{symbol}: deactivated ({reason})")
            }
            Notification::EvaluationFailed { symbol, error } => {
                write!(f, "{symbol}: evaluation failed: {error}")
            }
        }
    }
}

/// Receiver of free-text notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Notifier that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notification: &Notification) {}
}

/// Notifier that keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of events matching a predicate.
    pub fn count(&self, predicate: impl Fn(&Notification) -> bool) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|n| predicate(n)).count())
            .unwrap_or(0)
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) {
        if let Ok(mut events) = self.events.lock() {
            events.push(notification.clone());
        }
    }
}
