//! Upstream price providers.

pub mod coinlore;

pub use coinlore::CoinloreClient;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors from an upstream provider. Never surfaced past the price resolver.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// HTTP 429 or 503; worth retrying after a delay.
    #[error("Rate limited by provider (HTTP {0})")]
    RateLimited(u16),

    #[error("Provider returned HTTP {0}")]
    Http(u16),

    /// Connection failure or timeout.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Asset not found: {0}")]
    NotFound(String),
}

impl ProviderError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Network(e.to_string())
    }
}

/// One asset as reported by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderTicker {
    /// Provider's own identifier.
    pub id: String,
    pub name: String,
    /// Upper-cased.
    pub symbol: String,
    pub price: Decimal,
    pub market_cap: Decimal,
    pub volume_24h: Decimal,
    pub percent_change_24h: Decimal,
    pub percent_change_7d: Decimal,
}

/// Read-only access to an upstream price provider.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Fetch a single asset by provider id.
    async fn fetch_ticker(&self, provider_id: &str) -> Result<ProviderTicker, ProviderError>;

    /// Fetch one page of the bulk listing.
    async fn list_tickers(&self, start: u32, limit: u32) -> Result<Vec<ProviderTicker>, ProviderError>;
}
