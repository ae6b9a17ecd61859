//! Trading API
//!
//! - POST /api/transactions/buy - Buy at the current price
//! - POST /api/transactions/sell - Sell at the current price
//! - GET /api/transactions - Trade history, newest first

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::auth::Authenticated;
use crate::api::{ApiResponse, PageQuery};
use crate::services::{LedgerError, TradingError};
use crate::types::{Page, TradeReceipt, TradeRecord, TradeRequest};
use crate::AppState;

const DEFAULT_LIMIT: u32 = 20;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_transactions))
        .route("/buy", post(buy))
        .route("/sell", post(sell))
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// HTTP status and machine-readable code for a trading error.
pub fn error_code(error: &TradingError) -> (StatusCode, &'static str) {
    match error {
        TradingError::Ledger(LedgerError::InsufficientFunds { .. }) => {
            (StatusCode::BAD_REQUEST, "INSUFFICIENT_FUNDS")
        }
        TradingError::Ledger(LedgerError::InsufficientQuantity { .. }) => {
            (StatusCode::BAD_REQUEST, "INSUFFICIENT_QUANTITY")
        }
        TradingError::Ledger(LedgerError::PositionNotFound(_)) => {
            (StatusCode::BAD_REQUEST, "POSITION_NOT_FOUND")
        }
        TradingError::Ledger(LedgerError::InvalidQuantity(_)) => {
            (StatusCode::BAD_REQUEST, "INVALID_QUANTITY")
        }
        TradingError::Ledger(LedgerError::InvalidPrice(_)) | TradingError::InvalidQuote { .. } => {
            (StatusCode::BAD_REQUEST, "INVALID_QUOTE")
        }
        TradingError::UserNotFound(_) => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
        TradingError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        TradingError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
    }
}

/// Convert TradingError to HTTP response.
impl IntoResponse for TradingError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = error_code(&self);
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

/// POST /api/transactions/buy
async fn buy(
    auth: Authenticated,
    State(state): State<AppState>,
    Json(request): Json<TradeRequest>,
) -> Result<Json<ApiResponse<TradeReceipt>>, TradingError> {
    let receipt = state
        .trading
        .buy(&auth.user_id, &request.asset_id, request.quantity)
        .await?;
    Ok(Json(ApiResponse::new(receipt)))
}

/// POST /api/transactions/sell
async fn sell(
    auth: Authenticated,
    State(state): State<AppState>,
    Json(request): Json<TradeRequest>,
) -> Result<Json<ApiResponse<TradeReceipt>>, TradingError> {
    let receipt = state
        .trading
        .sell(&auth.user_id, &request.asset_id, request.quantity)
        .await?;
    Ok(Json(ApiResponse::new(receipt)))
}

/// GET /api/transactions
async fn list_transactions(
    auth: Authenticated,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<TradeRecord>>, TradingError> {
    let (page, limit) = query.resolve(DEFAULT_LIMIT);
    let trades = state.trading.transactions(&auth.user_id, page, limit)?;
    Ok(Json(trades))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_codes() {
        let funds = TradingError::Ledger(LedgerError::InsufficientFunds {
            needed: dec!(600),
            available: dec!(500),
        });
        assert_eq!(error_code(&funds), (StatusCode::BAD_REQUEST, "INSUFFICIENT_FUNDS"));

        let quote = TradingError::InvalidQuote {
            asset_id: "mystery".to_string(),
            price: dec!(0),
        };
        assert_eq!(error_code(&quote), (StatusCode::BAD_REQUEST, "INVALID_QUOTE"));

        let missing = TradingError::UserNotFound("u1".to_string());
        assert_eq!(error_code(&missing), (StatusCode::NOT_FOUND, "USER_NOT_FOUND"));

        let conflict = TradingError::Conflict("u1".to_string());
        assert_eq!(error_code(&conflict), (StatusCode::CONFLICT, "CONFLICT"));
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            error: "User not found: u1".to_string(),
            code: "USER_NOT_FOUND".to_string(),
        };

        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("USER_NOT_FOUND"));
    }
}
