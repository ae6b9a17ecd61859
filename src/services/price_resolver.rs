//! Price Resolver
//!
//! Turns an asset id into a usable quote no matter what the upstream does.
//! Tiers are tried in order until one produces a value:
//!
//! 1. fresh cache entry (no network)
//! 2. live ticker fetch, retried on rate limiting
//! 3. name/symbol match in the bulk listing
//! 4. stale cache entry
//! 5. static reference price
//! 6. zero-price placeholder
//!
//! Trade paths must reject a zero price; valuation paths count it as zero.

use crate::services::QuoteCache;
use crate::sources::{PriceProvider, ProviderError, ProviderTicker};
use crate::types::{AssetQuote, QuoteTier, ResolvedQuote};
use futures_util::stream::{self, StreamExt};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Asset id to Coinlore id mapping.
pub const COIN_MAPPING: &[(&str, &str)] = &[
    ("bitcoin", "90"),
    ("ethereum", "80"),
    ("ripple", "58"),
    ("cardano", "2010"),
    ("solana", "48543"),
    ("polkadot", "41417"),
    ("dogecoin", "2"),
    ("binancecoin", "2710"),
    ("matic-network", "3890"),
];

/// Unmapped ids with this prefix are passed to the provider literally.
pub const LITERAL_ID_PREFIX: &str = "coin-";

/// Approximate prices used when every upstream path has failed.
fn reference_price(asset_id: &str) -> Option<(Decimal, &'static str, &'static str)> {
    match asset_id {
        "bitcoin" => Some((dec!(40000), "Bitcoin", "BTC")),
        "ethereum" => Some((dec!(2000), "Ethereum", "ETH")),
        "binancecoin" => Some((dec!(300), "Binance Coin", "BNB")),
        "solana" => Some((dec!(100), "Solana", "SOL")),
        "cardano" => Some((dec!(0.50), "Cardano", "ADA")),
        "ripple" => Some((dec!(0.50), "XRP", "XRP")),
        _ => None,
    }
}

/// Translate a caller-facing asset id into the provider's id.
///
/// Returns `None` when the id is neither mapped, numeric, nor prefixed with
/// [`LITERAL_ID_PREFIX`]; the live fetch is skipped in that case.
pub fn provider_id(asset_id: &str) -> Option<String> {
    if let Some((_, id)) = COIN_MAPPING.iter().find(|(name, _)| *name == asset_id) {
        return Some((*id).to_string());
    }

    let literal = asset_id.strip_prefix(LITERAL_ID_PREFIX).unwrap_or(asset_id);
    if !literal.is_empty() && literal.chars().all(|c| c.is_ascii_digit()) {
        return Some(literal.to_string());
    }

    None
}

/// Resolver tuning.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Delay after the n-th rate-limited attempt.
    pub retry_delays: Vec<Duration>,
    /// Total live fetch attempts, including the first.
    pub max_attempts: u32,
    /// Size of the bulk listing page searched as a fallback.
    pub listing_limit: u32,
    /// Maximum concurrent resolutions in [`PriceResolver::resolve_many`].
    pub concurrency: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            retry_delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(3),
                Duration::from_secs(5),
            ],
            max_attempts: 3,
            listing_limit: 100,
            concurrency: 8,
        }
    }
}

/// Resolves asset ids to quotes through the fallback chain.
pub struct PriceResolver {
    provider: Arc<dyn PriceProvider>,
    cache: Arc<QuoteCache>,
    config: ResolverConfig,
}

impl PriceResolver {
    pub fn new(provider: Arc<dyn PriceProvider>, cache: Arc<QuoteCache>, config: ResolverConfig) -> Self {
        Self {
            provider,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<QuoteCache> {
        &self.cache
    }

    pub fn provider(&self) -> &Arc<dyn PriceProvider> {
        &self.provider
    }

    /// Resolve a quote. Never fails; the tier tells how degraded it is.
    pub async fn resolve(&self, asset_id: &str) -> ResolvedQuote {
        if let Some(quote) = self.cache.get_fresh(asset_id) {
            debug!("Using cached price for {}", asset_id);
            return ResolvedQuote::new(quote, QuoteTier::Cached);
        }

        match provider_id(asset_id) {
            Some(pid) => match self.fetch_with_retry(asset_id, &pid).await {
                Ok(ticker) => {
                    let quote = quote_from_ticker(asset_id, ticker);
                    self.cache.put(asset_id, quote.clone());
                    info!("Fetched live price for {}: ${}", asset_id, quote.price);
                    return ResolvedQuote::new(quote, QuoteTier::Live);
                }
                Err(e) => warn!("Live fetch failed for {} (provider id {}): {}", asset_id, pid, e),
            },
            None => warn!("Unrecognised asset id {}, skipping live fetch", asset_id),
        }

        if let Some(ticker) = self.match_listing(asset_id).await {
            let quote = quote_from_ticker(asset_id, ticker);
            self.cache.put(asset_id, quote.clone());
            info!("Matched {} in bulk listing: ${}", asset_id, quote.price);
            return ResolvedQuote::new(quote, QuoteTier::Listing);
        }

        if let Some(cached) = self.cache.get(asset_id) {
            warn!("Using stale cached price for {}", asset_id);
            return ResolvedQuote::new(cached.quote, QuoteTier::Stale);
        }

        if let Some((price, name, symbol)) = reference_price(asset_id) {
            let quote = AssetQuote::new(asset_id, price, name, symbol);
            self.cache.put(asset_id, quote.clone());
            warn!("Using reference price for {}: ${}", asset_id, price);
            return ResolvedQuote::new(quote, QuoteTier::Reference);
        }

        warn!("No price data available for {}, returning placeholder", asset_id);
        ResolvedQuote::new(AssetQuote::placeholder(asset_id), QuoteTier::Placeholder)
    }

    /// Resolve every distinct id once, several at a time.
    pub async fn resolve_many<I, S>(&self, asset_ids: I) -> HashMap<String, ResolvedQuote>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let distinct: BTreeSet<String> = asset_ids.into_iter().map(Into::into).collect();
        let width = self.config.concurrency.max(1);

        stream::iter(distinct)
            .map(|asset_id| async move {
                let resolved = self.resolve(&asset_id).await;
                (asset_id, resolved)
            })
            .buffer_unordered(width)
            .collect()
            .await
    }

    async fn fetch_with_retry(&self, asset_id: &str, pid: &str) -> Result<ProviderTicker, ProviderError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!("Attempt {} fetching {} (provider id {})", attempt, asset_id, pid);

            match self.provider.fetch_ticker(pid).await {
                Ok(ticker) => return Ok(ticker),
                Err(e) if e.is_rate_limited() && attempt < max_attempts => {
                    let delay = self.retry_delay(attempt);
                    warn!(
                        "Rate limited fetching {}, retrying in {}ms",
                        asset_id,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let delays = &self.config.retry_delays;
        delays
            .get(attempt as usize - 1)
            .or_else(|| delays.last())
            .copied()
            .unwrap_or_default()
    }

    async fn match_listing(&self, asset_id: &str) -> Option<ProviderTicker> {
        let tickers = match self.provider.list_tickers(0, self.config.listing_limit).await {
            Ok(tickers) => tickers,
            Err(e) => {
                warn!("Bulk listing unavailable while resolving {}: {}", asset_id, e);
                return None;
            }
        };

        let needle = asset_id.to_lowercase();
        tickers
            .into_iter()
            .find(|t| t.name.to_lowercase() == needle || t.symbol.to_lowercase() == needle)
    }
}

fn quote_from_ticker(asset_id: &str, ticker: ProviderTicker) -> AssetQuote {
    AssetQuote::new(asset_id, ticker.price, ticker.name, ticker.symbol)
}
