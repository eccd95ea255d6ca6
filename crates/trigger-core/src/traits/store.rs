//! Consumed-rule store trait.

use crate::error::StoreError;

/// Durable record of rules that already fired.
///
/// Keyed by rule id rather than by position in the human-edited rule file,
/// so reordering or editing the file cannot mis-mark rules. Implementations
/// serialize their own writers.
pub trait ConsumedStore: Send + Sync {
    /// Check whether a rule has been consumed.
    fn is_consumed(&self, id: &str) -> Result<bool, StoreError>;

    /// Mark a rule consumed.
    ///
    /// # Arguments
    /// * `id` - Stable rule id
    /// * `raw` - The raw source record, kept for audit
    fn mark_consumed(&self, id: &str, raw: &str) -> Result<(), StoreError>;
}
