//! SQLite persistence for users, positions and the trade log.
//!
//! Decimal amounts are stored as TEXT to keep full precision. Listings follow
//! the stored rank; `users` also carries a REAL copy of the total value that
//! orders users who have not been ranked yet.

use crate::services::store::{Store, StoreError, UserQuery, Valuation};
use crate::types::{PortfolioPosition, TradeRecord, TradeSide, User};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const USER_COLUMNS: &str = "id, username, cash_balance, rank, profit_percent, total_value, version, created_at, updated_at";

/// SQLite store for users and trades.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection mutex poisoned".to_string()))
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                cash_balance TEXT NOT NULL,
                rank INTEGER,
                profit_percent TEXT NOT NULL,
                total_value TEXT NOT NULL,
                total_value_key REAL NOT NULL,
                version INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_users_total_value
                ON users(total_value_key DESC, id);

            CREATE INDEX IF NOT EXISTS idx_users_rank
                ON users(rank, id);

            CREATE TABLE IF NOT EXISTS positions (
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                asset_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                quantity TEXT NOT NULL,
                average_cost TEXT NOT NULL,
                PRIMARY KEY (user_id, asset_id)
            );

            CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                asset_id TEXT NOT NULL,
                asset_name TEXT NOT NULL,
                asset_symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity TEXT NOT NULL,
                price TEXT NOT NULL,
                total TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_trades_user_time
                ON trades(user_id, timestamp DESC);
            CREATE INDEX IF NOT EXISTS idx_trades_asset
                ON trades(asset_id);",
        )?;

        info!("SQLite schema initialized");
        Ok(())
    }

    fn load_positions(conn: &Connection, user_id: &str) -> Result<Vec<PortfolioPosition>, StoreError> {
        let mut stmt = conn.prepare(
            "SELECT asset_id, quantity, average_cost FROM positions
             WHERE user_id = ?1 ORDER BY seq",
        )?;
        let positions = stmt
            .query_map(params![user_id], |row| {
                Ok(PortfolioPosition {
                    asset_id: row.get(0)?,
                    quantity: decimal(row, 1)?,
                    average_cost: decimal(row, 2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(positions)
    }

    fn write_positions(conn: &Connection, user: &User) -> Result<(), StoreError> {
        conn.execute("DELETE FROM positions WHERE user_id = ?1", params![user.id])?;
        let mut stmt = conn.prepare(
            "INSERT INTO positions (user_id, asset_id, seq, quantity, average_cost)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (seq, position) in user.positions.iter().enumerate() {
            stmt.execute(params![
                user.id,
                position.asset_id,
                seq as i64,
                position.quantity.to_string(),
                position.average_cost.to_string(),
            ])?;
        }
        Ok(())
    }

    fn with_positions(conn: &Connection, mut users: Vec<User>) -> Result<Vec<User>, StoreError> {
        for user in &mut users {
            user.positions = Self::load_positions(conn, &user.id)?;
        }
        Ok(users)
    }
}

impl Store for SqliteStore {
    fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO users (id, username, cash_balance, rank, profit_percent, total_value,
                                total_value_key, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                user.id,
                user.username,
                user.cash_balance.to_string(),
                user.rank,
                user.profit_percent.to_string(),
                user.total_value.to_string(),
                sort_key(user.total_value),
                user.version as i64,
                user.created_at,
                user.updated_at,
            ],
        )?;
        Self::write_positions(&tx, user)?;
        tx.commit()?;

        debug!("Inserted user {} ({})", user.username, user.id);
        Ok(())
    }

    fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        let user = conn
            .query_row(&sql, params![user_id], user_from_row)
            .optional()?;

        match user {
            Some(mut user) => {
                user.positions = Self::load_positions(&conn, &user.id)?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    fn list_users(&self, query: &UserQuery) -> Result<Vec<User>, StoreError> {
        let conn = self.conn()?;
        // SQLite treats a negative LIMIT as unbounded.
        let limit = query.limit.map(|l| l as i64).unwrap_or(-1);
        // Stored ranks come from exact decimal totals; the REAL key only
        // orders users created since the last recompute.
        let sql = format!(
            "SELECT {} FROM users
             ORDER BY rank IS NULL, rank ASC, total_value_key DESC, id ASC
             LIMIT ?1 OFFSET ?2",
            USER_COLUMNS
        );

        let users = {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![limit, query.offset as i64], user_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        Self::with_positions(&conn, users)
    }

    fn count_users(&self) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn commit_trade(&self, user: &User, trade: &TradeRecord) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let updated = tx.execute(
            "UPDATE users SET cash_balance = ?1, updated_at = ?2, version = version + 1
             WHERE id = ?3 AND version = ?4",
            params![
                user.cash_balance.to_string(),
                user.updated_at,
                user.id,
                user.version as i64,
            ],
        )?;
        if updated == 0 {
            // Dropping the transaction rolls it back.
            return Err(StoreError::VersionConflict(user.id.clone()));
        }

        Self::write_positions(&tx, user)?;

        tx.execute(
            "INSERT INTO trades (id, user_id, asset_id, asset_name, asset_symbol, side,
                                 quantity, price, total, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                trade.id,
                trade.user_id,
                trade.asset_id,
                trade.asset_name,
                trade.asset_symbol,
                trade.side.as_str(),
                trade.quantity.to_string(),
                trade.price.to_string(),
                trade.total.to_string(),
                trade.timestamp,
            ],
        )?;

        tx.commit()?;
        debug!("Committed {} trade {} for user {}", trade.side, trade.id, user.id);
        Ok(())
    }

    fn save_valuation(&self, user_id: &str, valuation: &Valuation) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE users SET total_value = ?1, total_value_key = ?2, profit_percent = ?3, rank = ?4
             WHERE id = ?5",
            params![
                valuation.total_value.to_string(),
                sort_key(valuation.total_value),
                valuation.profit_percent.to_string(),
                valuation.rank,
                user_id,
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(user_id.to_string()));
        }
        Ok(())
    }

    fn list_trades(&self, user_id: &str, offset: u64, limit: u64) -> Result<Vec<TradeRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, asset_id, asset_name, asset_symbol, side, quantity, price, total, timestamp
             FROM trades WHERE user_id = ?1
             ORDER BY timestamp DESC, rowid DESC
             LIMIT ?2 OFFSET ?3",
        )?;
        let trades = stmt
            .query_map(params![user_id, limit as i64, offset as i64], trade_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(trades)
    }

    fn count_trades(&self, user_id: &str) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM trades WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn sort_key(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn decimal(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let version: i64 = row.get(6)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        cash_balance: decimal(row, 2)?,
        positions: Vec::new(),
        rank: row.get(3)?,
        profit_percent: decimal(row, 4)?,
        total_value: decimal(row, 5)?,
        version: version as u64,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn trade_from_row(row: &Row<'_>) -> rusqlite::Result<TradeRecord> {
    let side: String = row.get(5)?;
    let side = TradeSide::parse(&side).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            Type::Text,
            Box::new(StoreError::Corrupt(format!("unknown trade side {}", side))),
        )
    })?;

    Ok(TradeRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        asset_id: row.get(2)?,
        asset_name: row.get(3)?,
        asset_symbol: row.get(4)?,
        side,
        quantity: decimal(row, 6)?,
        price: decimal(row, 7)?,
        total: decimal(row, 8)?,
        timestamp: row.get(9)?,
    })
}
