//! Player API
//!
//! - POST /api/users - Register a player with the starting balance
//! - GET /api/users/leaderboard - Players ranked by total value
//! - GET /api/users/portfolio - Caller's holdings at current prices

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::auth::Authenticated;
use crate::api::{ApiResponse, PageQuery};
use crate::error::{AppError, Result};
use crate::types::{CreateUserRequest, LeaderboardEntry, Page, PortfolioView, User};
use crate::AppState;

const DEFAULT_LIMIT: u32 = 10;
const MAX_USERNAME_LEN: usize = 32;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_user))
        .route("/leaderboard", get(get_leaderboard))
        .route("/portfolio", get(get_portfolio))
}

fn validate_username(username: &str) -> Result<&str> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("username must not be empty".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::BadRequest(format!(
            "username must be at most {} characters",
            MAX_USERNAME_LEN
        )));
    }
    Ok(username)
}

/// POST /api/users
async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<User>>)> {
    let username = validate_username(&request.username)?;
    let user = state
        .trading
        .create_user(username, state.config.initial_balance)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(user))))
}

/// GET /api/users/leaderboard
///
/// Revalues every player before answering.
async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<LeaderboardEntry>>> {
    let (page, limit) = query.resolve(DEFAULT_LIMIT);
    let leaderboard = state.valuation.leaderboard(page, limit).await?;
    Ok(Json(leaderboard))
}

/// GET /api/users/portfolio
async fn get_portfolio(
    auth: Authenticated,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PortfolioView>>> {
    let portfolio = state
        .valuation
        .portfolio(&auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {}", auth.user_id)))?;
    Ok(Json(ApiResponse::new(portfolio)))
}
