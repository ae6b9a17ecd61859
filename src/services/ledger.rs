//! Cost-basis ledger.
//!
//! Applies buys and sells to a user's cash and positions using the
//! weighted-average cost method. The functions work on a copy of the user so
//! a rejected operation leaves the caller's value untouched; the caller
//! commits the returned user and trade record together.

use crate::types::{AssetQuote, PortfolioPosition, TradeRecord, TradeSide, User};
use rust_decimal::Decimal;
use thiserror::Error;

/// Ledger rejections.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LedgerError {
    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    #[error("Insufficient quantity: requested {requested}, held {held}")]
    InsufficientQuantity { requested: Decimal, held: Decimal },

    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(Decimal),

    #[error("Price must be positive, got {0}")]
    InvalidPrice(Decimal),
}

/// State after a successful ledger operation.
#[derive(Debug, Clone)]
pub struct LedgerOutcome {
    pub user: User,
    /// The position after the operation; `None` when a sell closed it.
    pub position: Option<PortfolioPosition>,
    pub trade: TradeRecord,
}

/// Buy `quantity` of the quoted asset at the quote's price.
pub fn apply_buy(user: &User, quote: &AssetQuote, quantity: Decimal) -> Result<LedgerOutcome, LedgerError> {
    let price = validate(quote, quantity)?;
    // A cost too large for a Decimal can never be covered by the balance.
    let cost = quantity
        .checked_mul(price)
        .ok_or(LedgerError::InsufficientFunds {
            needed: Decimal::MAX,
            available: user.cash_balance,
        })?;

    if cost > user.cash_balance {
        return Err(LedgerError::InsufficientFunds {
            needed: cost,
            available: user.cash_balance,
        });
    }

    let mut updated = user.clone();
    let position = match updated.position_mut(&quote.asset_id) {
        Some(existing) => {
            let new_quantity = existing
                .quantity
                .checked_add(quantity)
                .ok_or(LedgerError::InvalidQuantity(quantity))?;
            let basis = existing
                .quantity
                .checked_mul(existing.average_cost)
                .and_then(|b| b.checked_add(cost))
                .ok_or(LedgerError::InvalidQuantity(quantity))?;
            existing.average_cost = basis / new_quantity;
            existing.quantity = new_quantity;
            existing.clone()
        }
        None => {
            let created = PortfolioPosition::new(quote.asset_id.clone(), quantity, price);
            updated.positions.push(created.clone());
            created
        }
    };
    updated.cash_balance -= cost;
    updated.updated_at = chrono::Utc::now().timestamp_millis();

    let trade = record(&updated, quote, TradeSide::Buy, quantity, price);
    Ok(LedgerOutcome {
        user: updated,
        position: Some(position),
        trade,
    })
}

/// Sell `quantity` of the quoted asset at the quote's price.
pub fn apply_sell(user: &User, quote: &AssetQuote, quantity: Decimal) -> Result<LedgerOutcome, LedgerError> {
    let price = validate(quote, quantity)?;

    let held = user
        .position(&quote.asset_id)
        .map(|p| p.quantity)
        .ok_or_else(|| LedgerError::PositionNotFound(quote.asset_id.clone()))?;

    if quantity > held {
        return Err(LedgerError::InsufficientQuantity {
            requested: quantity,
            held,
        });
    }

    let proceeds = quantity
        .checked_mul(price)
        .and_then(|p| p.checked_add(user.cash_balance))
        .ok_or(LedgerError::InvalidQuantity(quantity))?;

    let mut updated = user.clone();
    let remaining = held - quantity;
    let position = if remaining.is_zero() {
        updated.remove_position(&quote.asset_id);
        None
    } else {
        updated.position_mut(&quote.asset_id).map(|p| {
            p.quantity = remaining;
            p.clone()
        })
    };
    updated.cash_balance = proceeds;
    updated.updated_at = chrono::Utc::now().timestamp_millis();

    let trade = record(&updated, quote, TradeSide::Sell, quantity, price);
    Ok(LedgerOutcome {
        user: updated,
        position,
        trade,
    })
}

fn validate(quote: &AssetQuote, quantity: Decimal) -> Result<Decimal, LedgerError> {
    if quantity <= Decimal::ZERO {
        return Err(LedgerError::InvalidQuantity(quantity));
    }
    if quote.price <= Decimal::ZERO {
        return Err(LedgerError::InvalidPrice(quote.price));
    }
    Ok(quote.price)
}

fn record(user: &User, quote: &AssetQuote, side: TradeSide, quantity: Decimal, price: Decimal) -> TradeRecord {
    TradeRecord::new(
        user.id.clone(),
        quote.asset_id.clone(),
        quote.name.clone(),
        quote.symbol.clone(),
        side,
        quantity,
        price,
    )
}
