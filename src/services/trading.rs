//! Trading Service
//!
//! Executes buys and sells at the current resolved price:
//! - Quotes come from the price resolver; non-positive prices are rejected
//! - Cash and positions change through the cost-basis ledger
//! - Each trade is committed atomically with its record
//!
//! Trades for the same user are serialized by a per-user async lock, and the
//! store's version check catches writers outside this process.

use crate::services::ledger::{self, LedgerError, LedgerOutcome};
use crate::services::store::{Store, StoreError};
use crate::services::PriceResolver;
use crate::types::{page_offset, AssetQuote, Page, TradeReceipt, TradeRecord, TradeSide, User};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Trading service errors.
#[derive(Debug, Error)]
pub enum TradingError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Invalid quote for {asset_id}: price {price}")]
    InvalidQuote { asset_id: String, price: Decimal },

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Concurrent update detected for user {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StoreError> for TradingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::VersionConflict(user_id) => TradingError::Conflict(user_id),
            StoreError::NotFound(user_id) => TradingError::UserNotFound(user_id),
            other => TradingError::DatabaseError(other.to_string()),
        }
    }
}

/// Paper trading service.
#[derive(Clone)]
pub struct TradingService {
    resolver: Arc<PriceResolver>,
    store: Arc<dyn Store>,
    /// One lock per user id; different users never contend.
    user_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl TradingService {
    pub fn new(resolver: Arc<PriceResolver>, store: Arc<dyn Store>) -> Self {
        Self {
            resolver,
            store,
            user_locks: Arc::new(DashMap::new()),
        }
    }

    /// Buy `quantity` of an asset at its current price.
    pub async fn buy(&self, user_id: &str, asset_id: &str, quantity: Decimal) -> Result<TradeReceipt, TradingError> {
        self.execute(user_id, asset_id, quantity, TradeSide::Buy).await
    }

    /// Sell `quantity` of an asset at its current price.
    pub async fn sell(&self, user_id: &str, asset_id: &str, quantity: Decimal) -> Result<TradeReceipt, TradingError> {
        self.execute(user_id, asset_id, quantity, TradeSide::Sell).await
    }

    async fn execute(
        &self,
        user_id: &str,
        asset_id: &str,
        quantity: Decimal,
        side: TradeSide,
    ) -> Result<TradeReceipt, TradingError> {
        if quantity <= Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity(quantity).into());
        }

        info!("User {} requests {} {} of {}", user_id, side, quantity, asset_id);

        // Resolve before locking so a slow upstream never holds the user lock.
        let resolved = self.resolver.resolve(asset_id).await;
        let quote = resolved.quote;
        if !quote.is_tradable() {
            warn!(
                "Rejecting {} of {}: unusable price {} ({})",
                side, asset_id, quote.price, resolved.tier
            );
            return Err(TradingError::InvalidQuote {
                asset_id: asset_id.to_string(),
                price: quote.price,
            });
        }

        let lock = self.user_lock(user_id);
        let result = {
            let _guard = lock.lock().await;
            self.commit(user_id, &quote, quantity, side)
        };
        drop(lock);
        self.release_user_lock(user_id);
        result
    }

    fn commit(
        &self,
        user_id: &str,
        quote: &AssetQuote,
        quantity: Decimal,
        side: TradeSide,
    ) -> Result<TradeReceipt, TradingError> {
        let user = self
            .store
            .find_user(user_id)?
            .ok_or_else(|| TradingError::UserNotFound(user_id.to_string()))?;

        let outcome = apply(side, &user, quote, quantity)?;
        self.store.commit_trade(&outcome.user, &outcome.trade)?;

        info!(
            "User {} {} {} {} at ${} (total ${}), balance now ${}",
            user_id,
            side,
            quantity,
            quote.symbol,
            quote.price,
            outcome.trade.total,
            outcome.user.cash_balance
        );

        Ok(TradeReceipt {
            new_balance: outcome.user.cash_balance,
            portfolio: outcome.user.positions,
            position: outcome.position,
            transaction: outcome.trade,
        })
    }

    /// Trade history for a user, newest first.
    pub fn transactions(&self, user_id: &str, page: u32, limit: u32) -> Result<Page<TradeRecord>, TradingError> {
        let page = page.max(1);
        let trades = self
            .store
            .list_trades(user_id, page_offset(page, limit), limit as u64)?;
        let total = self.store.count_trades(user_id)?;
        Ok(Page::new(trades, total, page, limit))
    }

    /// Register a player with the given starting balance.
    ///
    /// Fails with `StoreError::Conflict` when the username is taken.
    pub fn create_user(&self, username: &str, initial_balance: Decimal) -> Result<User, StoreError> {
        let user = User::new(username, initial_balance);
        self.store.insert_user(&user)?;
        info!("Created user {} ({})", user.username, user.id);
        Ok(user)
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.user_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the user's lock once no trade holds or awaits it.
    fn release_user_lock(&self, user_id: &str) {
        self.user_locks
            .remove_if(user_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.user_locks.len()
    }
}

fn apply(side: TradeSide, user: &User, quote: &AssetQuote, quantity: Decimal) -> Result<LedgerOutcome, LedgerError> {
    match side {
        TradeSide::Buy => ledger::apply_buy(user, quote, quantity),
        TradeSide::Sell => ledger::apply_sell(user, quote, quantity),
    }
}
