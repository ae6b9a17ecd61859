//! Fallback chain tests for the price resolver.
//!
//! Each test injects failures at one or more stages and checks which tier
//! answers and how many upstream calls were made.

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::{resolver, ticker, ScriptedProvider};
use cryptogame::sources::ProviderError;
use cryptogame::types::{AssetQuote, QuoteTier};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(600);

fn stale_quote(asset_id: &str, price: Decimal) -> AssetQuote {
    let mut quote = AssetQuote::new(asset_id, price, "Old", "OLD");
    quote.fetched_at = Utc::now() - ChronoDuration::hours(2);
    quote
}

// =============================================================================
// Cache and Live Tiers
// =============================================================================

mod live_tests {
    use super::*;

    #[tokio::test]
    async fn test_live_fetch_writes_through_to_cache() {
        let provider = ScriptedProvider::new();
        provider.script("90", Ok(ticker("90", "Bitcoin", "BTC", dec!(65000))));
        let resolver = resolver(provider.clone(), TTL);

        let first = resolver.resolve("bitcoin").await;
        assert_eq!(first.tier, QuoteTier::Live);
        assert_eq!(first.price(), dec!(65000));
        assert_eq!(first.quote.symbol, "BTC");

        let second = resolver.resolve("bitcoin").await;
        assert_eq!(second.tier, QuoteTier::Cached);
        assert_eq!(second.price(), dec!(65000));
        assert_eq!(provider.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_fresh_cache_makes_no_network_call() {
        let provider = ScriptedProvider::new();
        let resolver = resolver(provider.clone(), TTL);
        resolver
            .cache()
            .put("ethereum", AssetQuote::new("ethereum", dec!(2500), "Ethereum", "ETH"));

        let resolved = resolver.resolve("ethereum").await;
        assert_eq!(resolved.tier, QuoteTier::Cached);
        assert_eq!(provider.fetch_calls(), 0);
        assert_eq!(provider.listing_calls(), 0);
    }

    #[tokio::test]
    async fn test_literal_provider_ids() {
        let provider = ScriptedProvider::new();
        provider.script("518", Ok(ticker("518", "Tether", "USDT", dec!(1))));
        let resolver = resolver(provider.clone(), TTL);

        let resolved = resolver.resolve("coin-518").await;
        assert_eq!(resolved.tier, QuoteTier::Live);
        assert_eq!(resolved.quote.asset_id, "coin-518");
        assert_eq!(provider.calls_for("518"), 1);
    }
}

// =============================================================================
// Rate Limit Retries
// =============================================================================

mod retry_tests {
    use super::*;

    #[tokio::test]
    async fn test_retries_after_rate_limit() {
        let provider = ScriptedProvider::new();
        provider.script("80", Err(ProviderError::RateLimited(429)));
        provider.script("80", Err(ProviderError::RateLimited(503)));
        provider.script("80", Ok(ticker("80", "Ethereum", "ETH", dec!(2400))));
        let resolver = resolver(provider.clone(), TTL);

        let resolved = resolver.resolve("ethereum").await;
        assert_eq!(resolved.tier, QuoteTier::Live);
        assert_eq!(provider.calls_for("80"), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_three_attempts() {
        let provider = ScriptedProvider::new();
        provider.script("80", Err(ProviderError::RateLimited(429)));
        let resolver = resolver(provider.clone(), TTL);

        let resolved = resolver.resolve("ethereum").await;
        assert_eq!(provider.calls_for("80"), 3);
        assert_eq!(resolved.tier, QuoteTier::Reference);
        assert_eq!(resolved.price(), dec!(2000));
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let provider = ScriptedProvider::new();
        provider.script("80", Err(ProviderError::Http(500)));
        let resolver = resolver(provider.clone(), TTL);

        resolver.resolve("ethereum").await;
        assert_eq!(provider.calls_for("80"), 1);
    }
}

// =============================================================================
// Backoff Timing
// =============================================================================

mod backoff_tests {
    use super::*;
    use cryptogame::services::{PriceResolver, QuoteCache, ResolverConfig};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn default_resolver(provider: Arc<ScriptedProvider>) -> Arc<PriceResolver> {
        Arc::new(PriceResolver::new(
            provider,
            Arc::new(QuoteCache::new(TTL)),
            ResolverConfig::default(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleeps_one_then_three_seconds() {
        let provider = ScriptedProvider::new();
        provider.script("90", Err(ProviderError::RateLimited(429)));
        provider.script("80", Ok(ticker("80", "Ethereum", "ETH", dec!(2500))));
        let resolver = default_resolver(provider.clone());

        let start = Instant::now();
        let limited = async {
            let resolved = resolver.resolve("bitcoin").await;
            (resolved, start.elapsed())
        };
        let live = async {
            let resolved = resolver.resolve("ethereum").await;
            (resolved, start.elapsed())
        };
        let ((limited, limited_elapsed), (live, live_elapsed)) = tokio::join!(limited, live);

        assert_eq!(live.tier, QuoteTier::Live);
        assert!(live_elapsed < Duration::from_secs(1), "live took {:?}", live_elapsed);

        assert_eq!(limited.tier, QuoteTier::Reference);
        assert_eq!(provider.calls_for("90"), 3);
        assert!(limited_elapsed >= Duration::from_secs(4), "limited took {:?}", limited_elapsed);
        assert!(limited_elapsed < Duration::from_millis(4100), "limited took {:?}", limited_elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_asset_does_not_hold_up_batch() {
        let provider = ScriptedProvider::new();
        provider.script("90", Err(ProviderError::RateLimited(503)));
        provider.script("80", Ok(ticker("80", "Ethereum", "ETH", dec!(2500))));
        provider.script("48543", Ok(ticker("48543", "Solana", "SOL", dec!(150))));
        let resolver = default_resolver(provider.clone());

        let start = Instant::now();
        let batch = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve_many(vec!["bitcoin", "ethereum", "solana"]).await }
        });

        // Inside bitcoin's first backoff window.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(resolver.cache().get_fresh("ethereum").is_some());
        assert!(resolver.cache().get_fresh("solana").is_some());
        assert!(resolver.cache().get_fresh("bitcoin").is_none());
        assert_eq!(provider.calls_for("90"), 1);

        let quotes = batch.await.unwrap();
        assert_eq!(quotes.len(), 3);
        assert_eq!(quotes["ethereum"].tier, QuoteTier::Live);
        assert_eq!(quotes["bitcoin"].tier, QuoteTier::Reference);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(4), "batch took {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(4100), "batch took {:?}", elapsed);
    }
}

// =============================================================================
// Degraded Tiers
// =============================================================================

mod fallback_tests {
    use super::*;

    #[tokio::test]
    async fn test_listing_match_by_name_or_symbol() {
        let provider = ScriptedProvider::new();
        provider.script("90", Err(ProviderError::Network("timed out".to_string())));
        provider.set_listing(Ok(vec![
            ticker("80", "Ethereum", "ETH", dec!(2400)),
            ticker("90", "Bitcoin", "BTC", dec!(64000)),
        ]));
        let resolver = resolver(provider.clone(), TTL);

        let by_name = resolver.resolve("bitcoin").await;
        assert_eq!(by_name.tier, QuoteTier::Listing);
        assert_eq!(by_name.price(), dec!(64000));
        assert!(!by_name.tier.is_degraded());

        let by_symbol = resolver.resolve("eth").await;
        assert_eq!(by_symbol.tier, QuoteTier::Listing);
        assert_eq!(by_symbol.price(), dec!(2400));
    }

    #[tokio::test]
    async fn test_listing_is_tried_before_stale_cache() {
        let provider = ScriptedProvider::new();
        provider.script("90", Err(ProviderError::Http(502)));
        provider.set_listing(Ok(vec![ticker("90", "Bitcoin", "BTC", dec!(64000))]));
        let resolver = resolver(provider.clone(), TTL);
        resolver.cache().put("bitcoin", stale_quote("bitcoin", dec!(30000)));

        let resolved = resolver.resolve("bitcoin").await;
        assert_eq!(resolved.tier, QuoteTier::Listing);
        assert_eq!(resolved.price(), dec!(64000));
    }

    #[tokio::test]
    async fn test_stale_cache_when_upstream_is_down() {
        let provider = ScriptedProvider::new();
        provider.script("90", Err(ProviderError::Http(502)));
        provider.set_listing(Err(ProviderError::Http(502)));
        let resolver = resolver(provider.clone(), TTL);
        resolver.cache().put("bitcoin", stale_quote("bitcoin", dec!(30000)));

        let resolved = resolver.resolve("bitcoin").await;
        assert_eq!(resolved.tier, QuoteTier::Stale);
        assert_eq!(resolved.price(), dec!(30000));
        assert!(resolved.tier.is_degraded());
    }

    #[tokio::test]
    async fn test_reference_price_is_cached() {
        let provider = ScriptedProvider::new();
        let resolver = resolver(provider.clone(), TTL);

        let resolved = resolver.resolve("solana").await;
        assert_eq!(resolved.tier, QuoteTier::Reference);
        assert_eq!(resolved.price(), dec!(100));
        assert_eq!(resolved.quote.symbol, "SOL");
        assert!(resolver.cache().get_fresh("solana").is_some());
    }

    #[tokio::test]
    async fn test_placeholder_for_unknown_asset() {
        let provider = ScriptedProvider::new();
        provider.set_listing(Ok(vec![ticker("90", "Bitcoin", "BTC", dec!(64000))]));
        let resolver = resolver(provider.clone(), TTL);

        let resolved = resolver.resolve("shiba-inu").await;
        assert_eq!(resolved.tier, QuoteTier::Placeholder);
        assert_eq!(resolved.price(), Decimal::ZERO);
        assert_eq!(resolved.quote.name, "Shiba inu");
        assert_eq!(resolved.quote.symbol, "SHI");
        // Unmapped and non-numeric: no live fetch attempted.
        assert_eq!(provider.fetch_calls(), 0);
        assert!(resolver.cache().get("shiba-inu").is_none());
    }
}

// =============================================================================
// Batch Resolution
// =============================================================================

mod batch_tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_many_dedupes_ids() {
        let provider = ScriptedProvider::new();
        provider.script("90", Ok(ticker("90", "Bitcoin", "BTC", dec!(65000))));
        provider.script("80", Ok(ticker("80", "Ethereum", "ETH", dec!(2500))));
        let resolver = resolver(provider.clone(), TTL);

        let quotes = resolver
            .resolve_many(vec!["bitcoin", "ethereum", "bitcoin", "bitcoin", "ethereum"])
            .await;

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes["bitcoin"].price(), dec!(65000));
        assert_eq!(quotes["ethereum"].price(), dec!(2500));
        assert_eq!(provider.calls_for("90"), 1);
        assert_eq!(provider.calls_for("80"), 1);
    }

    #[tokio::test]
    async fn test_resolve_many_empty() {
        let provider = ScriptedProvider::new();
        let resolver = resolver(provider.clone(), TTL);

        let quotes = resolver.resolve_many(Vec::<String>::new()).await;
        assert!(quotes.is_empty());
        assert_eq!(provider.fetch_calls(), 0);
    }
}
