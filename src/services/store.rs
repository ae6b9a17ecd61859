//! Storage surface used by the trading and valuation services.

use crate::types::{TradeRecord, User};
use rust_decimal::Decimal;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("User not found: {0}")]
    NotFound(String),

    /// Unique constraint violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The stored version differs from the one the caller read.
    #[error("Version conflict for user {0}")]
    VersionConflict(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Conflict(e.to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// Paging for user listings.
///
/// Users always come back highest total value first, ties by user id.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub offset: u64,
    /// `None` returns every user.
    pub limit: Option<u64>,
}

impl UserQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn page(offset: u64, limit: u64) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }
}

/// Result of a leaderboard recompute for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub total_value: Decimal,
    pub profit_percent: Decimal,
    pub rank: u32,
}

/// Persistent store for users and trade records.
pub trait Store: Send + Sync {
    /// Insert a new user. Fails with `Conflict` on a duplicate id or username.
    fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError>;

    fn list_users(&self, query: &UserQuery) -> Result<Vec<User>, StoreError>;

    fn count_users(&self) -> Result<u64, StoreError>;

    /// Persist the user's cash and positions together with the trade record.
    ///
    /// All or nothing. `user.version` must equal the stored version, which is
    /// then incremented; otherwise `VersionConflict` is returned and nothing
    /// is written.
    fn commit_trade(&self, user: &User, trade: &TradeRecord) -> Result<(), StoreError>;

    /// Persist leaderboard figures without touching cash or positions.
    fn save_valuation(&self, user_id: &str, valuation: &Valuation) -> Result<(), StoreError>;

    /// Trades for a user, newest first.
    fn list_trades(&self, user_id: &str, offset: u64, limit: u64) -> Result<Vec<TradeRecord>, StoreError>;

    fn count_trades(&self, user_id: &str) -> Result<u64, StoreError>;
}
