//! Trade sink trait definition.

use crate::error::DealError;
use crate::types::{ExecutionBackend, Instrument};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Capability a watch calls to execute a buy or sell once triggered.
///
/// Implementations are polymorphic over execution backends (desktop GUI
/// automation, streaming broker APIs, simulation).
///
/// Contract:
/// - `price <= 0` means "use the backend's default/market price".
/// - The backend may reduce `|quantity|` to what is affordable or available
///   and round it down to the instrument's lot size.
/// - Only success or failure is reported; partial-fill detail stays inside
///   the backend.
/// - The call is treated as exactly-once. Any retry policy belongs to the
///   backend.
#[async_trait]
pub trait TradeSink: Send + Sync {
    /// Execute a deal.
    ///
    /// # Arguments
    /// * `instrument` - The instrument to trade
    /// * `price` - Limit price, or `<= 0` for the backend default
    /// * `quantity` - Signed quantity: positive buys, negative sells
    async fn deal(
        &self,
        instrument: &Instrument,
        price: Decimal,
        quantity: i64,
    ) -> Result<(), DealError>;

    /// Get the backend name.
    fn name(&self) -> &str;
}

/// Trade sinks keyed by execution backend.
///
/// Instruments carry a typed backend tag; the registry resolves it to a sink
/// once, when watches are built.
#[derive(Clone, Default)]
pub struct SinkRegistry {
    sinks: HashMap<ExecutionBackend, Arc<dyn TradeSink>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink, replacing any existing one for the backend.
    pub fn register(&mut self, backend: ExecutionBackend, sink: Arc<dyn TradeSink>) {
        self.sinks.insert(backend, sink);
    }

    pub fn with(mut self, backend: ExecutionBackend, sink: Arc<dyn TradeSink>) -> Self {
        self.register(backend, sink);
        self
    }

    pub fn resolve(&self, backend: ExecutionBackend) -> Option<Arc<dyn TradeSink>> {
        self.sinks.get(&backend).cloned()
    }

    pub fn backends(&self) -> Vec<ExecutionBackend> {
        self.sinks.keys().copied().collect()
    }
}

impl fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.sinks.iter().map(|(backend, sink)| (backend, sink.name())))
            .finish()
    }
}
