//! Streaming-API gateway sink.
//!
//! Foreign markets are traded through a broker gateway reachable over HTTP.
//! A deal is one `POST {base_url}/orders`; any 2xx response counts as placed.

use async_trait::async_trait;
use reqwest::{header, Client};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use trigger_core::error::DealError;
use trigger_core::traits::TradeSink;
use trigger_core::types::Instrument;
use uuid::Uuid;

use crate::side_of;

/// Gateway connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSinkConfig {
    pub base_url: String,
    /// Bearer token sent with every request
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl HttpSinkConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Read the API key from the named environment variable, if set.
    pub fn with_key_from_env(mut self, var: &str) -> Self {
        self.api_key = std::env::var(var).ok().filter(|key| !key.is_empty());
        self
    }

    fn orders_url(&self) -> String {
        format!("{}/orders", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest {
    client_order_id: String,
    symbol: String,
    market: String,
    side: &'static str,
    qty: String,
    #[serde(rename = "type")]
    order_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit_price: Option<String>,
}

impl CreateOrderRequest {
    fn new(instrument: &Instrument, price: Decimal, quantity: i64) -> Self {
        let limit_price = (price > Decimal::ZERO).then(|| price.normalize().to_string());
        Self {
            client_order_id: Uuid::new_v4().to_string(),
            symbol: instrument.symbol.clone(),
            market: instrument.market.to_string(),
            side: side_of(quantity),
            qty: quantity.unsigned_abs().to_string(),
            order_type: if limit_price.is_some() { "limit" } else { "market" },
            limit_price,
        }
    }
}

/// Trade sink posting orders to a broker gateway.
pub struct HttpSink {
    config: HttpSinkConfig,
    client: Client,
}

impl HttpSink {
    /// Create a new gateway client.
    pub fn new(config: HttpSinkConfig) -> Result<Self, DealError> {
        let mut headers = header::HeaderMap::new();
        if let Some(key) = &config.api_key {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {key}"))
                    .map_err(|e| DealError::Backend(e.to_string()))?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DealError::Http(e.to_string()))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl TradeSink for HttpSink {
    async fn deal(
        &self,
        instrument: &Instrument,
        price: Decimal,
        quantity: i64,
    ) -> Result<(), DealError> {
        let rounded = instrument.round_to_lot(quantity);
        if rounded == 0 {
            return Err(DealError::QuantityTooSmall {
                requested: quantity,
                lot_size: instrument.lot_size,
            });
        }
        let signed = if quantity < 0 { -rounded } else { rounded };

        let request = CreateOrderRequest::new(instrument, price, signed);
        debug!("Submitting order: {:?}", request);

        let resp = self
            .client
            .post(self.config.orders_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| DealError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(DealError::Rejected(format!("{}: {}", status, text)));
        }

        info!(
            "Order submitted: {} {} {} ({})",
            request.side, request.qty, request.symbol, request.client_order_id
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "streaming"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trigger_core::types::Market;

    #[test]
    fn test_order_request_shape() {
        let instrument = Instrument::new("00700", Market::HongKong);

        let limit = CreateOrderRequest::new(&instrument, dec!(350.20), -200);
        let json = serde_json::to_value(&limit).unwrap();
        assert_eq!(json["symbol"], "00700");
        assert_eq!(json["market"], "hk");
        assert_eq!(json["side"], "sell");
        assert_eq!(json["qty"], "200");
        assert_eq!(json["type"], "limit");
        assert_eq!(json["limit_price"], "350.2");
        assert!(Uuid::parse_str(json["client_order_id"].as_str().unwrap()).is_ok());

        let market = CreateOrderRequest::new(&instrument, Decimal::ZERO, 100);
        let json = serde_json::to_value(&market).unwrap();
        assert_eq!(json["type"], "market");
        assert!(json.get("limit_price").is_none());
    }

    #[test]
    fn test_client_order_ids_unique() {
        let instrument = Instrument::new("AAPL", Market::Us);
        let a = CreateOrderRequest::new(&instrument, dec!(1), 1);
        let b = CreateOrderRequest::new(&instrument, dec!(1), 1);
        assert_ne!(a.client_order_id, b.client_order_id);
    }

    #[test]
    fn test_orders_url() {
        assert_eq!(
            HttpSinkConfig::new("http://localhost:8080/").orders_url(),
            "http://localhost:8080/orders"
        );
    }

    #[tokio::test]
    async fn test_lot_checked_before_network() {
        let sink = HttpSink::new(HttpSinkConfig::new("http://127.0.0.1:9")).unwrap();
        let instrument = Instrument::new("00700", Market::HongKong);

        let err = sink.deal(&instrument, dec!(350), 50).await.unwrap_err();
        assert!(matches!(err, DealError::QuantityTooSmall { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_fails() {
        let sink = HttpSink::new(HttpSinkConfig {
            timeout_secs: 2,
            ..HttpSinkConfig::new("http://127.0.0.1:9")
        })
        .unwrap();
        let instrument = Instrument::new("AAPL", Market::Us);

        let err = sink.deal(&instrument, dec!(100), 1).await.unwrap_err();
        assert!(matches!(err, DealError::Http(_)));
    }
}
