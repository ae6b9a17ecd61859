use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Decimal places used when presenting cash amounts.
pub const MONEY_DP: u32 = 2;
/// Decimal places used when presenting prices and average costs.
pub const PRICE_DP: u32 = 8;
/// Decimal places used when presenting percentages.
pub const PERCENT_DP: u32 = 2;

/// Round a cash amount for presentation. Storage keeps full precision.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a price or average cost for presentation.
pub fn round_price(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PRICE_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a percentage for presentation.
pub fn round_percent(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PERCENT_DP, RoundingStrategy::MidpointAwayFromZero)
}

// =============================================================================
// Users and Positions
// =============================================================================

/// A holding of one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioPosition {
    pub asset_id: String,
    /// Always strictly positive; a position at zero is removed.
    pub quantity: Decimal,
    /// Weighted mean of every purchase price. Only buys change it.
    pub average_cost: Decimal,
}

impl PortfolioPosition {
    pub fn new(asset_id: impl Into<String>, quantity: Decimal, average_cost: Decimal) -> Self {
        Self {
            asset_id: asset_id.into(),
            quantity,
            average_cost,
        }
    }

    /// Amount paid for the current quantity at the average cost.
    pub fn cost_basis(&self) -> Decimal {
        self.quantity * self.average_cost
    }
}

/// A player of the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    /// Never negative.
    pub cash_balance: Decimal,
    /// Unique by asset id.
    #[serde(default)]
    pub positions: Vec<PortfolioPosition>,
    /// Leaderboard rank from the last recompute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    pub profit_percent: Decimal,
    pub total_value: Decimal,
    /// Bumped on every committed trade; used for optimistic concurrency.
    #[serde(default)]
    pub version: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    /// Create a user holding only cash.
    pub fn new(username: impl Into<String>, initial_balance: Decimal) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            cash_balance: initial_balance,
            positions: Vec::new(),
            rank: None,
            profit_percent: Decimal::ZERO,
            total_value: initial_balance,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Find the position held in an asset.
    pub fn position(&self, asset_id: &str) -> Option<&PortfolioPosition> {
        self.positions.iter().find(|p| p.asset_id == asset_id)
    }

    pub(crate) fn position_mut(&mut self, asset_id: &str) -> Option<&mut PortfolioPosition> {
        self.positions.iter_mut().find(|p| p.asset_id == asset_id)
    }

    pub(crate) fn remove_position(&mut self, asset_id: &str) {
        self.positions.retain(|p| p.asset_id != asset_id);
    }

    /// Distinct asset ids held by this user.
    pub fn asset_ids(&self) -> impl Iterator<Item = &str> {
        self.positions.iter().map(|p| p.asset_id.as_str())
    }
}

// =============================================================================
// Trade Records
// =============================================================================

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "buy" => Some(TradeSide::Buy),
            "sell" => Some(TradeSide::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An executed trade. Append-only, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub id: String,
    pub user_id: String,
    pub asset_id: String,
    pub asset_name: String,
    pub asset_symbol: String,
    pub side: TradeSide,
    pub quantity: Decimal,
    pub price: Decimal,
    /// `quantity * price`
    pub total: Decimal,
    /// Execution time (ms)
    pub timestamp: i64,
}

impl TradeRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: String,
        asset_id: String,
        asset_name: String,
        asset_symbol: String,
        side: TradeSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            asset_id,
            asset_name,
            asset_symbol,
            side,
            quantity,
            price,
            total: quantity * price,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

// =============================================================================
// Request/Response Types for API
// =============================================================================

/// Request to buy or sell an asset at the current resolved price.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    pub asset_id: String,
    pub quantity: Decimal,
}

/// Result of an executed trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeReceipt {
    pub transaction: TradeRecord,
    pub new_balance: Decimal,
    /// Position after the trade; absent when a sell closed it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<PortfolioPosition>,
    pub portfolio: Vec<PortfolioPosition>,
}

/// Request to register a player.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
}

/// One page of results with paging metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub count: usize,
    pub total: u64,
    pub total_pages: u64,
    pub current_page: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, page: u32, limit: u32) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total.div_ceil(limit as u64)
        };
        Self {
            count: data.len(),
            data,
            total,
            total_pages,
            current_page: page,
        }
    }
}

/// Normalise 1-based page/limit query values to an offset.
pub fn page_offset(page: u32, limit: u32) -> u64 {
    (page.max(1) as u64 - 1) * limit as u64
}

/// Leaderboard row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub username: String,
    pub balance: Decimal,
    /// `total_value - balance`
    pub portfolio_value: Decimal,
    pub total_value: Decimal,
    pub assets_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    pub profit_percent: Decimal,
}

impl LeaderboardEntry {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            username: user.username.clone(),
            balance: round_money(user.cash_balance),
            portfolio_value: round_money(user.total_value - user.cash_balance),
            total_value: round_money(user.total_value),
            assets_count: user.positions.len(),
            rank: user.rank,
            profit_percent: round_percent(user.profit_percent),
        }
    }
}

/// Live valuation of one position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionValuation {
    pub asset_id: String,
    pub name: String,
    pub symbol: String,
    pub quantity: Decimal,
    pub average_cost: Decimal,
    pub current_price: Decimal,
    pub value: Decimal,
    pub profit_loss: Decimal,
    pub profit_loss_percent: Decimal,
    /// Price came from a fallback tier rather than a live read.
    pub degraded: bool,
}

/// A user's holdings valued at current resolved prices.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioView {
    pub balance: Decimal,
    pub positions: Vec<PositionValuation>,
    pub portfolio_value: Decimal,
    pub total_value: Decimal,
    pub profit_percent: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
}
