//! cryptogame - simulated cryptocurrency trading game server
//!
//! Players trade against live market prices with virtual cash. Prices come
//! from Coinlore through a fallback chain that always yields a quote, and a
//! leaderboard ranks every player by total portfolio value.

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

use config::Config;
use services::{MarketService, PriceResolver, QuoteCache, Store, TradingService, ValuationEngine};
use sources::PriceProvider;
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub resolver: Arc<PriceResolver>,
    pub trading: Arc<TradingService>,
    pub valuation: Arc<ValuationEngine>,
    pub market: Arc<MarketService>,
}

impl AppState {
    /// Wire the services around a price provider and a store.
    pub fn new(config: Config, provider: Arc<dyn PriceProvider>, store: Arc<dyn Store>) -> Self {
        let cache = Arc::new(QuoteCache::new(config.price_cache_ttl));
        let resolver = Arc::new(PriceResolver::new(provider, cache, config.resolver_config()));

        Self {
            trading: Arc::new(TradingService::new(resolver.clone(), store.clone())),
            valuation: Arc::new(ValuationEngine::new(
                resolver.clone(),
                store,
                config.initial_balance,
            )),
            market: Arc::new(MarketService::new(resolver.clone())),
            resolver,
            config: Arc::new(config),
        }
    }
}
