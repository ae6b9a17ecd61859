use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::price::{QuoteTier, ResolvedQuote};

/// One row of the upstream market listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketAsset {
    /// Upstream provider id.
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub current_price: Decimal,
    pub market_cap: Decimal,
    pub volume_24h: Decimal,
    pub price_change_percentage_24h: Decimal,
    pub price_change_percentage_7d: Decimal,
}

/// Resolved price details for a single asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDetails {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub current_price: Decimal,
    pub tier: QuoteTier,
    pub degraded: bool,
    /// When the price was obtained (ms).
    pub fetched_at: i64,
}

impl From<ResolvedQuote> for AssetDetails {
    fn from(resolved: ResolvedQuote) -> Self {
        Self {
            id: resolved.quote.asset_id,
            name: resolved.quote.name,
            symbol: resolved.quote.symbol,
            current_price: resolved.quote.price,
            tier: resolved.tier,
            degraded: resolved.tier.is_degraded(),
            fetched_at: resolved.quote.fetched_at.timestamp_millis(),
        }
    }
}
