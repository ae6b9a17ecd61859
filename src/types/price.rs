use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Last known price, name and symbol of an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetQuote {
    /// Caller-facing asset identifier (e.g. "bitcoin").
    pub asset_id: String,
    /// Price in USD. Zero means the price is unknown.
    pub price: Decimal,
    pub name: String,
    pub symbol: String,
    /// When the quote was obtained.
    pub fetched_at: DateTime<Utc>,
}

impl AssetQuote {
    /// Create a quote stamped with the current time.
    pub fn new(asset_id: impl Into<String>, price: Decimal, name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            price,
            name: name.into(),
            symbol: symbol.into(),
            fetched_at: Utc::now(),
        }
    }

    /// Zero-price stand-in with a name and symbol derived from the identifier.
    ///
    /// `"matic-network"` becomes name `"Matic network"`, symbol `"MAT"`.
    pub fn placeholder(asset_id: &str) -> Self {
        let mut chars = asset_id.chars();
        let name = match chars.next() {
            Some(first) => {
                let rest: String = chars.collect();
                format!("{}{}", first.to_uppercase(), rest.replace('-', " "))
            }
            None => String::new(),
        };
        let symbol: String = asset_id.chars().take(3).collect::<String>().to_uppercase();

        Self::new(asset_id, Decimal::ZERO, name, symbol)
    }

    /// Whether the price can be used to execute a trade.
    pub fn is_tradable(&self) -> bool {
        self.price > Decimal::ZERO
    }
}

/// Which step of the fallback chain produced a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteTier {
    /// Fresh cache entry, no network call.
    Cached,
    /// Live fetch from the upstream ticker endpoint.
    Live,
    /// Matched in the upstream bulk listing.
    Listing,
    /// Expired cache entry used as last-known-good.
    Stale,
    /// Static reference price table.
    Reference,
    /// Zero-price placeholder.
    Placeholder,
}

impl QuoteTier {
    /// Degraded tiers did not come from a live or fresh upstream read.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            QuoteTier::Stale | QuoteTier::Reference | QuoteTier::Placeholder
        )
    }
}

impl fmt::Display for QuoteTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteTier::Cached => write!(f, "cached"),
            QuoteTier::Live => write!(f, "live"),
            QuoteTier::Listing => write!(f, "listing"),
            QuoteTier::Stale => write!(f, "stale"),
            QuoteTier::Reference => write!(f, "reference"),
            QuoteTier::Placeholder => write!(f, "placeholder"),
        }
    }
}

/// A quote together with the tier that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedQuote {
    pub quote: AssetQuote,
    pub tier: QuoteTier,
}

impl ResolvedQuote {
    pub fn new(quote: AssetQuote, tier: QuoteTier) -> Self {
        Self { quote, tier }
    }

    pub fn price(&self) -> Decimal {
        self.quote.price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_placeholder_derives_name_and_symbol() {
        let quote = AssetQuote::placeholder("matic-network");
        assert_eq!(quote.price, Decimal::ZERO);
        assert_eq!(quote.name, "Matic network");
        assert_eq!(quote.symbol, "MAT");
        assert!(!quote.is_tradable());
    }

    #[test]
    fn test_placeholder_short_identifier() {
        let quote = AssetQuote::placeholder("op");
        assert_eq!(quote.name, "Op");
        assert_eq!(quote.symbol, "OP");
    }

    #[test]
    fn test_placeholder_empty_identifier() {
        let quote = AssetQuote::placeholder("");
        assert_eq!(quote.name, "");
        assert_eq!(quote.symbol, "");
    }

    #[test]
    fn test_tradable_requires_positive_price() {
        assert!(AssetQuote::new("bitcoin", dec!(1), "Bitcoin", "BTC").is_tradable());
        assert!(!AssetQuote::new("bitcoin", dec!(0), "Bitcoin", "BTC").is_tradable());
    }

    #[test]
    fn test_degraded_tiers() {
        assert!(!QuoteTier::Cached.is_degraded());
        assert!(!QuoteTier::Live.is_degraded());
        assert!(!QuoteTier::Listing.is_degraded());
        assert!(QuoteTier::Stale.is_degraded());
        assert!(QuoteTier::Reference.is_degraded());
        assert!(QuoteTier::Placeholder.is_degraded());
    }

    #[test]
    fn test_tier_serialization() {
        assert_eq!(serde_json::to_string(&QuoteTier::Stale).unwrap(), "\"stale\"");
        assert_eq!(QuoteTier::Placeholder.to_string(), "placeholder");
    }
}
