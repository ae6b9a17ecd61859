pub mod ledger;
pub mod market;
pub mod price_cache;
pub mod price_resolver;
pub mod sqlite_store;
pub mod store;
pub mod trading;
pub mod valuation;

pub use ledger::{LedgerError, LedgerOutcome};
pub use market::MarketService;
pub use price_cache::{CachedQuote, QuoteCache};
pub use price_resolver::{PriceResolver, ResolverConfig};
pub use sqlite_store::SqliteStore;
pub use store::{Store, StoreError, UserQuery, Valuation};
pub use trading::{TradingError, TradingService};
pub use valuation::{RecomputeReport, ValuationEngine};
