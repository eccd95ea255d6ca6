//! Push-feed adapter: one bounded channel per symbol, one consumer.
//!
//! Feed callbacks send quotes into their symbol's channel; a single task
//! owns the [`WatchSet`] and drains all channels, so quotes for a symbol are
//! evaluated strictly in arrival order and never concurrently.

use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{StreamExt, StreamMap};
use tracing::{debug, info, warn};
use trigger_core::types::Quote;

use crate::watch_set::{TickReport, WatchSet};

/// Routes pushed quotes into a watch set.
pub struct QuoteRouter {
    set: WatchSet,
    capacity: usize,
    senders: HashMap<String, mpsc::Sender<Quote>>,
    streams: StreamMap<String, ReceiverStream<Quote>>,
}

impl QuoteRouter {
    /// Create a router with a channel for every symbol the set tracks.
    pub fn new(mut set: WatchSet, capacity: usize) -> Self {
        let pending = set.pending_subscriptions();
        let mut router = Self {
            set,
            capacity: capacity.max(1),
            senders: HashMap::new(),
            streams: StreamMap::new(),
        };
        for symbol in pending {
            router.open(symbol);
        }
        router
    }

    /// Sender for a symbol's channel, opened on first use.
    pub fn sender(&mut self, symbol: &str) -> mpsc::Sender<Quote> {
        if let Some(sender) = self.senders.get(symbol) {
            return sender.clone();
        }
        self.set.subscribe(symbol);
        self.set.pending_subscriptions();
        self.open(symbol.to_string())
    }

    /// Symbols with an open channel, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.senders.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    fn open(&mut self, symbol: String) -> mpsc::Sender<Quote> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.streams.insert(symbol.clone(), ReceiverStream::new(rx));
        self.senders.insert(symbol.clone(), tx.clone());
        debug!(%symbol, capacity = self.capacity, "Quote channel opened");
        tx
    }

    /// Evaluate quotes until every sender is dropped, then hand the set back.
    pub async fn run(mut self) -> WatchSet {
        // Only producers keep channels open from here on
        self.senders.clear();

        let mut total = TickReport::default();
        while let Some((symbol, quote)) = self.streams.next().await {
            if quote.symbol != symbol {
                warn!(channel = %symbol, quote = %quote.symbol, "Quote sent on another symbol's channel, dropped");
                continue;
            }
            let now = self.set.now_for(&quote);
            total.merge(self.set.tick_one(&quote, now).await);
        }

        info!(
            evaluated = total.evaluated,
            fired = total.fired,
            failed = total.failed_deals,
            errors = total.errors,
            "Quote router drained"
        );
        self.set
    }
}
