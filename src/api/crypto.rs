//! Market data API
//!
//! - GET /api/crypto/market - Page of the market listing
//! - GET /api/crypto/:id - Current price of one asset

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use crate::api::{ApiResponse, PageQuery};
use crate::error::Result;
use crate::types::{AssetDetails, MarketAsset};
use crate::AppState;

const DEFAULT_LIMIT: u32 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/market", get(get_market))
        .route("/:id", get(get_asset))
}

/// GET /api/crypto/market
async fn get_market(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Vec<MarketAsset>>>> {
    let (page, limit) = query.resolve(DEFAULT_LIMIT);
    let assets = state.market.top_assets(page, limit).await?;
    Ok(Json(ApiResponse::new(assets)))
}

/// GET /api/crypto/:id
///
/// Always answers; `degraded` tells the caller the price is not live.
async fn get_asset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<ApiResponse<AssetDetails>> {
    Json(ApiResponse::new(state.market.asset_details(&id).await))
}
