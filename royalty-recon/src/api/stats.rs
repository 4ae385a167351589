//! User royalty statistics
//!
//! GET /users/:user_id/royalty-stats

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::error::ApiResult;
use crate::services::report_details::{user_royalty_stats, UserRoyaltyStats};
use crate::AppState;

/// GET /users/:user_id/royalty-stats
pub async fn get_user_stats(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserRoyaltyStats>> {
    Ok(Json(user_royalty_stats(&state.db, &user_id).await?))
}

pub fn stats_routes() -> Router<AppState> {
    Router::new().route("/users/:user_id/royalty-stats", get(get_user_stats))
}
