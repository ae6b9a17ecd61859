//! Market data service.
//!
//! Thin read-only views over the upstream listing and the price resolver.

use crate::services::PriceResolver;
use crate::sources::{ProviderError, ProviderTicker};
use crate::types::{AssetDetails, MarketAsset};
use std::sync::Arc;
use tracing::debug;

/// Largest page the upstream listing serves.
pub const MAX_PAGE_SIZE: u32 = 100;

pub struct MarketService {
    resolver: Arc<PriceResolver>,
}

impl MarketService {
    pub fn new(resolver: Arc<PriceResolver>) -> Self {
        Self { resolver }
    }

    /// One page of the market listing, largest assets first.
    pub async fn top_assets(&self, page: u32, limit: u32) -> Result<Vec<MarketAsset>, ProviderError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let start = (page.max(1) - 1).saturating_mul(limit);
        debug!("Fetching market listing start={} limit={}", start, limit);

        let tickers = self.resolver.provider().list_tickers(start, limit).await?;
        Ok(tickers.into_iter().map(market_asset).collect())
    }

    /// Current price of one asset, resolved through the fallback chain.
    pub async fn asset_details(&self, asset_id: &str) -> AssetDetails {
        self.resolver.resolve(asset_id).await.into()
    }
}

fn market_asset(ticker: ProviderTicker) -> MarketAsset {
    MarketAsset {
        id: ticker.id,
        name: ticker.name,
        symbol: ticker.symbol,
        current_price: ticker.price,
        market_cap: ticker.market_cap,
        volume_24h: ticker.volume_24h,
        price_change_percentage_24h: ticker.percent_change_24h,
        price_change_percentage_7d: ticker.percent_change_7d,
    }
}
