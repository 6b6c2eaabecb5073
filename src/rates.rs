// Injected collaborators: delivery transport, wallet balance source, and
// USD price source, plus reqwest-backed implementations for the real
// gateway and price API.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("external source unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery failed: {0}")]
    Send(String),
}

/// Per-currency on-chain balances. None means that currency's source
/// failed; it contributes zero to the refresh instead of aborting it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WalletBalances {
    pub btc: Option<f64>,
    pub ltc: Option<f64>,
    pub eth: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UsdPrices {
    pub btc: f64,
    pub ltc: f64,
    pub eth: f64,
}

/// Best-effort payload delivery to the buyer. No retry guarantee here;
/// callers log failures and move on.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn send(&self, user_id: i64, payload: &str) -> Result<(), DeliveryError>;
}

#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn fetch(&self, user_id: i64) -> Result<WalletBalances, SourceError>;
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn usd_prices(&self) -> Result<UsdPrices, SourceError>;
}

// ── HTTP implementations ──

/// Delivers payloads through the bot gateway's send endpoint.
pub struct HttpDeliveryTransport {
    http_client: HttpClient,
    base_url: String,
}

impl HttpDeliveryTransport {
    pub fn new(base_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url,
        }
    }
}

#[async_trait]
impl DeliveryTransport for HttpDeliveryTransport {
    async fn send(&self, user_id: i64, payload: &str) -> Result<(), DeliveryError> {
        let resp = self
            .http_client
            .post(format!("{}/send", self.base_url))
            .json(&json!({ "user_id": user_id, "payload": payload }))
            .send()
            .await
            .map_err(|e| DeliveryError::Send(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(DeliveryError::Send(format!(
                "gateway returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

/// Fetches per-currency wallet balances from the gateway. Currencies the
/// gateway omits (or reports as failed) come back as None.
pub struct HttpBalanceSource {
    http_client: HttpClient,
    base_url: String,
}

impl HttpBalanceSource {
    pub fn new(base_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url,
        }
    }
}

#[async_trait]
impl BalanceSource for HttpBalanceSource {
    async fn fetch(&self, user_id: i64) -> Result<WalletBalances, SourceError> {
        let resp = self
            .http_client
            .post(format!("{}/balances", self.base_url))
            .json(&json!({ "user_id": user_id }))
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        resp.json::<WalletBalances>()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))
    }
}

/// Spot USD prices from a coingecko-style simple price endpoint.
pub struct HttpPriceSource {
    http_client: HttpClient,
    base_url: String,
}

impl HttpPriceSource {
    pub fn new(base_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PriceEntry {
    usd: f64,
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn usd_prices(&self) -> Result<UsdPrices, SourceError> {
        let url = format!(
            "{}/api/v3/simple/price?ids=bitcoin,litecoin,ethereum&vs_currencies=usd",
            self.base_url
        );
        let resp = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        let map: HashMap<String, PriceEntry> = resp
            .json()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        let price_of = |id: &str| -> Result<f64, SourceError> {
            map.get(id)
                .map(|e| e.usd)
                .ok_or_else(|| SourceError::Unavailable(format!("no {} price in response", id)))
        };

        Ok(UsdPrices {
            btc: price_of("bitcoin")?,
            ltc: price_of("litecoin")?,
            eth: price_of("ethereum")?,
        })
    }
}
