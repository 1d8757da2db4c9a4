use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Serialize;

use super::{ApiError, CoinQuery};
use crate::state::AppState;

/// Deviation response body.
#[derive(Serialize)]
struct DeviationResponse {
    deviation: f64,
}

/// `GET /deviation?coin=<asset>` — price deviation over the recent window.
///
/// Returns the standard deviation of the newest stored prices, at most one
/// window's worth.
pub(super) async fn get_deviation(
    state: State<AppState>,
    Query(query): Query<CoinQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let coin = query.coin.ok_or(ApiError::MissingCoin)?;
    let deviation = state.stats.deviation(&coin).await.map_err(ApiError::Query)?;
    Ok(Json(DeviationResponse { deviation }))
}
