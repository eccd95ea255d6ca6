//! Notifications as structured log events.

use tracing::{error, info, warn};
use trigger_core::traits::{Notification, Notifier};

/// Delivers notifications as `tracing` events under the `notify` target.
///
/// Phone pushes and mail reports hook in as subscriber layers filtering on
/// that target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for TracingNotifier {
    fn notify(&self, notification: &Notification) {
        match notification {
            Notification::Armed { symbol, price, base } => {
                info!(target: "notify", %symbol, %price, %base, "{notification}");
            }
            Notification::StaleSkipped {
                symbol,
                price,
                extreme,
                delta,
                expected,
            } => {
                warn!(target: "notify", %symbol, %price, %extreme, %delta, %expected, "{notification}");
            }
            Notification::Dispatched {
                symbol,
                price,
                quantity,
                success: true,
                ..
            } => {
                info!(target: "notify", %symbol, %price, quantity, "{notification}");
            }
            Notification::Dispatched {
                symbol,
                price,
                quantity,
                success: false,
                detail,
            } => {
                error!(target: "notify", %symbol, %price, quantity, %detail, "{notification}");
            }
            Notification::NotPersisted { symbol, rule_id, error } => {
                error!(target: "notify", %symbol, %rule_id, %error, "{notification}");
            }
            Notification::Deactivated { symbol, reason } => {
                info!(target: "notify", %symbol, %reason, "{notification}");
            }
            Notification::EvaluationFailed { symbol, error } => {
                error!(target: "notify", %symbol, %error, "{notification}");
            }
        }
    }
}
