use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use super::{ApiError, CoinQuery};
use crate::state::AppState;

/// `GET /stats?coin=<asset>` — latest stored values for one asset.
///
/// Returns the most recent price, market cap and 24h change.
pub(super) async fn get_stats(
    state: State<AppState>,
    Query(query): Query<CoinQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let coin = query.coin.ok_or(ApiError::MissingCoin)?;
    let quote = state.stats.latest(&coin).await.map_err(ApiError::Query)?;
    Ok(Json(quote))
}
