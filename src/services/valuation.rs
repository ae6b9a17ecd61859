//! Valuation & Ranking Engine
//!
//! Values every portfolio at current resolved prices and assigns leaderboard
//! ranks. Each distinct asset is resolved once per pass regardless of how
//! many users hold it.

use crate::services::store::{Store, StoreError, UserQuery, Valuation};
use crate::services::PriceResolver;
use crate::types::{
    page_offset, round_money, round_percent, round_price, LeaderboardEntry, Page, PortfolioView,
    PositionValuation, ResolvedQuote, User,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Figures computed for one user during a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct UserValuation {
    pub user_id: String,
    pub total_value: Decimal,
    pub profit_percent: Decimal,
}

/// Summary of a recompute pass.
#[derive(Debug, Clone, Default)]
pub struct RecomputeReport {
    pub users: usize,
    pub assets_resolved: usize,
    /// Assets valued at zero because no tier produced a price.
    pub unpriced_assets: Vec<String>,
    /// Users whose figures could not be saved.
    pub failed_users: Vec<String>,
}

impl RecomputeReport {
    pub fn saved(&self) -> usize {
        self.users - self.failed_users.len()
    }
}

/// Profit relative to the starting balance, as a percentage.
pub fn profit_percent(total_value: Decimal, initial_balance: Decimal) -> Decimal {
    if initial_balance.is_zero() {
        return Decimal::ZERO;
    }
    (total_value - initial_balance)
        .checked_div(initial_balance)
        .and_then(|ratio| ratio.checked_mul(dec!(100)))
        .unwrap_or(Decimal::MAX)
}

/// Order by total value descending, ties by user id, and number 1..N.
pub fn rank_users(mut valuations: Vec<UserValuation>) -> Vec<(UserValuation, u32)> {
    valuations.sort_by(|a, b| match b.total_value.cmp(&a.total_value) {
        Ordering::Equal => a.user_id.cmp(&b.user_id),
        other => other,
    });
    valuations
        .into_iter()
        .zip(1u32..)
        .collect()
}

pub struct ValuationEngine {
    resolver: Arc<PriceResolver>,
    store: Arc<dyn Store>,
    initial_balance: Decimal,
}

impl ValuationEngine {
    pub fn new(resolver: Arc<PriceResolver>, store: Arc<dyn Store>, initial_balance: Decimal) -> Self {
        Self {
            resolver,
            store,
            initial_balance,
        }
    }

    /// Value every user, rank them, and persist the figures.
    ///
    /// A user whose save fails keeps their previous figures; the rest of the
    /// batch is still written.
    pub async fn recompute_all(&self) -> Result<RecomputeReport, StoreError> {
        let users = self.store.list_users(&UserQuery::all())?;
        let asset_ids: Vec<String> = users
            .iter()
            .flat_map(|u| u.asset_ids().map(str::to_string))
            .collect();

        let quotes = self.resolver.resolve_many(asset_ids).await;

        let mut unpriced: Vec<String> = quotes
            .iter()
            .filter(|(_, q)| !q.quote.is_tradable())
            .map(|(id, _)| id.clone())
            .collect();
        unpriced.sort();
        for asset_id in &unpriced {
            warn!("No usable price for {}, valuing holdings at zero", asset_id);
        }

        let valuations: Vec<UserValuation> = users
            .iter()
            .map(|user| {
                let total_value = user
                    .cash_balance
                    .checked_add(holdings_value(user, &quotes))
                    .unwrap_or(Decimal::MAX);
                UserValuation {
                    user_id: user.id.clone(),
                    total_value,
                    profit_percent: profit_percent(total_value, self.initial_balance),
                }
            })
            .collect();

        let mut report = RecomputeReport {
            users: users.len(),
            assets_resolved: quotes.len(),
            unpriced_assets: unpriced,
            failed_users: Vec::new(),
        };

        for (valuation, rank) in rank_users(valuations) {
            let saved = Valuation {
                total_value: valuation.total_value,
                profit_percent: valuation.profit_percent,
                rank,
            };
            if let Err(e) = self.store.save_valuation(&valuation.user_id, &saved) {
                error!("Failed to save valuation for user {}: {}", valuation.user_id, e);
                report.failed_users.push(valuation.user_id);
                continue;
            }
            debug!(
                "Ranked user {} #{} with ${}",
                valuation.user_id, rank, valuation.total_value
            );
        }

        info!(
            "Recomputed {} users across {} assets ({} failed)",
            report.users,
            report.assets_resolved,
            report.failed_users.len()
        );
        Ok(report)
    }

    /// Fresh leaderboard page.
    pub async fn leaderboard(&self, page: u32, limit: u32) -> Result<Page<LeaderboardEntry>, StoreError> {
        self.recompute_all().await?;

        let page = page.max(1);
        let users = self
            .store
            .list_users(&UserQuery::page(page_offset(page, limit), limit as u64))?;
        let total = self.store.count_users()?;
        let entries = users.iter().map(LeaderboardEntry::from_user).collect();
        Ok(Page::new(entries, total, page, limit))
    }

    /// One user's holdings valued at current prices. `None` if the user is unknown.
    pub async fn portfolio(&self, user_id: &str) -> Result<Option<PortfolioView>, StoreError> {
        let Some(user) = self.store.find_user(user_id)? else {
            return Ok(None);
        };

        let quotes = self.resolver.resolve_many(user.asset_ids().map(str::to_string)).await;

        let mut portfolio_value = Decimal::ZERO;
        let mut positions = Vec::with_capacity(user.positions.len());
        for position in &user.positions {
            let Some(resolved) = quotes.get(&position.asset_id) else {
                continue;
            };
            let current_price = resolved.price();
            let value = position_value(&user.id, &position.asset_id, position.quantity, current_price);
            let cost_basis = position_value(&user.id, &position.asset_id, position.quantity, position.average_cost);
            let profit_loss = value - cost_basis;
            let profit_loss_percent = if position.average_cost.is_zero() {
                Decimal::ZERO
            } else {
                (current_price - position.average_cost)
                    .checked_div(position.average_cost)
                    .and_then(|ratio| ratio.checked_mul(dec!(100)))
                    .unwrap_or(Decimal::MAX)
            };
            portfolio_value = portfolio_value.checked_add(value).unwrap_or(Decimal::MAX);

            positions.push(PositionValuation {
                asset_id: position.asset_id.clone(),
                name: resolved.quote.name.clone(),
                symbol: resolved.quote.symbol.clone(),
                quantity: position.quantity,
                average_cost: round_price(position.average_cost),
                current_price: round_price(current_price),
                value: round_money(value),
                profit_loss: round_money(profit_loss),
                profit_loss_percent: round_percent(profit_loss_percent),
                degraded: resolved.tier.is_degraded(),
            });
        }

        let total_value = user.cash_balance.checked_add(portfolio_value).unwrap_or(Decimal::MAX);
        Ok(Some(PortfolioView {
            balance: round_money(user.cash_balance),
            positions,
            portfolio_value: round_money(portfolio_value),
            total_value: round_money(total_value),
            profit_percent: round_percent(profit_percent(total_value, self.initial_balance)),
            rank: user.rank,
        }))
    }
}

fn holdings_value(user: &User, quotes: &HashMap<String, ResolvedQuote>) -> Decimal {
    user.positions
        .iter()
        .map(|p| {
            let price = quotes.get(&p.asset_id).map(|q| q.price()).unwrap_or_default();
            position_value(&user.id, &p.asset_id, p.quantity, price)
        })
        .fold(Decimal::ZERO, |total, value| {
            total.checked_add(value).unwrap_or_else(|| {
                error!("Holdings total for user {} overflowed, capping", user.id);
                Decimal::MAX
            })
        })
}

/// `quantity * price`, or zero when the product does not fit a Decimal.
fn position_value(user_id: &str, asset_id: &str, quantity: Decimal, price: Decimal) -> Decimal {
    quantity.checked_mul(price).unwrap_or_else(|| {
        error!(
            "Value of {} {} for user {} overflowed, counting it as zero",
            quantity, asset_id, user_id
        );
        Decimal::ZERO
    })
}
