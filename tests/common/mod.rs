//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use cryptogame::services::{PriceResolver, QuoteCache, ResolverConfig};
use cryptogame::sources::{PriceProvider, ProviderError, ProviderTicker};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Provider whose answers are scripted per provider id.
///
/// Each id holds a queue of results; the last one repeats once the queue is
/// down to a single entry. Unscripted ids answer `NotFound`.
#[derive(Default)]
pub struct ScriptedProvider {
    tickers: Mutex<HashMap<String, VecDeque<Result<ProviderTicker, ProviderError>>>>,
    listing: Mutex<Option<Result<Vec<ProviderTicker>, ProviderError>>>,
    fetch_calls: AtomicUsize,
    listing_calls: AtomicUsize,
    calls_by_id: Mutex<HashMap<String, usize>>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a result for a provider id.
    pub fn script(&self, provider_id: &str, result: Result<ProviderTicker, ProviderError>) {
        self.tickers
            .lock()
            .unwrap()
            .entry(provider_id.to_string())
            .or_default()
            .push_back(result);
    }

    pub fn set_listing(&self, result: Result<Vec<ProviderTicker>, ProviderError>) {
        *self.listing.lock().unwrap() = Some(result);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, provider_id: &str) -> usize {
        self.calls_by_id
            .lock()
            .unwrap()
            .get(provider_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl PriceProvider for ScriptedProvider {
    async fn fetch_ticker(&self, provider_id: &str) -> Result<ProviderTicker, ProviderError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .calls_by_id
            .lock()
            .unwrap()
            .entry(provider_id.to_string())
            .or_default() += 1;

        let mut tickers = self.tickers.lock().unwrap();
        match tickers.get_mut(provider_id) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(ProviderError::NotFound(provider_id.to_string()))),
            None => Err(ProviderError::NotFound(provider_id.to_string())),
        }
    }

    async fn list_tickers(&self, _start: u32, limit: u32) -> Result<Vec<ProviderTicker>, ProviderError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        match self.listing.lock().unwrap().clone() {
            Some(Ok(tickers)) => Ok(tickers.into_iter().take(limit as usize).collect()),
            Some(Err(e)) => Err(e),
            None => Err(ProviderError::Http(500)),
        }
    }
}

pub fn ticker(id: &str, name: &str, symbol: &str, price: Decimal) -> ProviderTicker {
    ProviderTicker {
        id: id.to_string(),
        name: name.to_string(),
        symbol: symbol.to_string(),
        price,
        market_cap: Decimal::ZERO,
        volume_24h: Decimal::ZERO,
        percent_change_24h: Decimal::ZERO,
        percent_change_7d: Decimal::ZERO,
    }
}

/// Resolver config with no real waiting between retries.
pub fn fast_config() -> ResolverConfig {
    ResolverConfig {
        retry_delays: vec![Duration::from_millis(1), Duration::from_millis(2)],
        ..ResolverConfig::default()
    }
}

pub fn resolver(provider: Arc<ScriptedProvider>, ttl: Duration) -> Arc<PriceResolver> {
    Arc::new(PriceResolver::new(
        provider,
        Arc::new(QuoteCache::new(ttl)),
        fast_config(),
    ))
}
