use std::env;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::services::ResolverConfig;
use crate::sources::coinlore::COINLORE_API_URL;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// SQLite database file.
    pub database_path: String,
    /// Base URL of the Coinlore API.
    pub coinlore_api_url: String,
    /// Cash given to every new player.
    pub initial_balance: Decimal,
    /// How long a fetched price counts as fresh.
    pub price_cache_ttl: Duration,
    /// Timeout for a single upstream request.
    pub upstream_timeout: Duration,
    /// Delays between rate-limited fetch attempts.
    pub rate_limit_retry_delays: Vec<Duration>,
    /// Maximum concurrent price resolutions during valuation.
    pub resolver_concurrency: usize,
    /// Size of the listing page searched when a live fetch fails.
    pub listing_fallback_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_path: "data/cryptogame.db".to_string(),
            coinlore_api_url: COINLORE_API_URL.to_string(),
            initial_balance: Decimal::from(10_000),
            price_cache_ttl: Duration::from_secs(600),
            upstream_timeout: Duration::from_secs(15),
            rate_limit_retry_delays: vec![
                Duration::from_millis(1000),
                Duration::from_millis(3000),
                Duration::from_millis(5000),
            ],
            resolver_concurrency: 8,
            listing_fallback_limit: 100,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        // Format: "1000,3000,5000" (milliseconds)
        let rate_limit_retry_delays = env::var("RATE_LIMIT_RETRY_DELAYS_MS")
            .ok()
            .map(|s| parse_delays(&s))
            .filter(|delays| !delays.is_empty())
            .unwrap_or(defaults.rate_limit_retry_delays);

        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT").unwrap_or(defaults.port),
            database_path: env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            coinlore_api_url: env::var("COINLORE_API_URL").unwrap_or(defaults.coinlore_api_url),
            initial_balance: parse_var::<Decimal>("INITIAL_BALANCE")
                .filter(|b| *b >= Decimal::ZERO)
                .unwrap_or(defaults.initial_balance),
            price_cache_ttl: parse_var("PRICE_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.price_cache_ttl),
            upstream_timeout: parse_var("UPSTREAM_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.upstream_timeout),
            rate_limit_retry_delays,
            resolver_concurrency: parse_var::<usize>("RESOLVER_CONCURRENCY")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.resolver_concurrency),
            listing_fallback_limit: parse_var("LISTING_FALLBACK_LIMIT")
                .unwrap_or(defaults.listing_fallback_limit),
        }
    }

    /// Resolver tuning derived from this configuration.
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            retry_delays: self.rate_limit_retry_delays.clone(),
            listing_limit: self.listing_fallback_limit,
            concurrency: self.resolver_concurrency,
            ..ResolverConfig::default()
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_delays(value: &str) -> Vec<Duration> {
    value
        .split(',')
        .filter_map(|part| part.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .collect()
}
