pub mod auth;
pub mod crypto;
pub mod health;
pub mod transactions;
pub mod users;

use crate::AppState;
use axum::Router;
use serde::{Deserialize, Serialize};

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/crypto", crypto::router())
        .nest("/api/transactions", transactions::router())
        .nest("/api/users", users::router())
}

/// API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// `?page=&limit=` query parameters, 1-based.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    /// Page and limit with defaults applied. A zero limit falls back to the default.
    pub fn resolve(&self, default_limit: u32) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.filter(|l| *l > 0).unwrap_or(default_limit);
        (page, limit)
    }
}
