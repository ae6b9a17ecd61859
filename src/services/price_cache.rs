use crate::types::AssetQuote;
use chrono::Utc;
use dashmap::DashMap;
use std::time::Duration;

/// A cache lookup result. Stale entries are still returned.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedQuote {
    pub quote: AssetQuote,
    /// `now - fetched_at < ttl`
    pub is_fresh: bool,
}

/// Thread-safe quote cache keyed by asset id.
///
/// Entries are never evicted, only overwritten; freshness is decided at read
/// time by comparing the quote's `fetched_at` against the TTL.
pub struct QuoteCache {
    quotes: DashMap<String, AssetQuote>,
    ttl: Duration,
}

impl QuoteCache {
    /// Create a new cache with the given freshness TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            quotes: DashMap::new(),
            ttl,
        }
    }

    /// Look up a quote, fresh or not.
    pub fn get(&self, asset_id: &str) -> Option<CachedQuote> {
        let entry = self.quotes.get(asset_id)?;
        let quote = entry.value().clone();
        drop(entry);

        // A timestamp ahead of the clock counts as fresh.
        let is_fresh = match Utc::now().signed_duration_since(quote.fetched_at).to_std() {
            Ok(age) => age < self.ttl,
            Err(_) => true,
        };
        Some(CachedQuote { quote, is_fresh })
    }

    /// Look up a quote only if it is still fresh.
    pub fn get_fresh(&self, asset_id: &str) -> Option<AssetQuote> {
        self.get(asset_id)
            .filter(|cached| cached.is_fresh)
            .map(|cached| cached.quote)
    }

    /// Insert or overwrite the quote for an asset.
    pub fn put(&self, asset_id: &str, quote: AssetQuote) {
        self.quotes.insert(asset_id.to_string(), quote);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.quotes.clear();
    }

    /// Get the number of entries in the cache (including stale).
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}
