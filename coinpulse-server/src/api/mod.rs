//! Stats API handlers.
//!
//! These endpoints serve the read queries over the stored price points plus
//! the manual refresh trigger.
//!
//! # Endpoints
//!
//! - `GET  /stats?coin=..`     – latest stored values for one asset
//! - `GET  /deviation?coin=..` – price deviation over the recent window
//! - `POST /trigger-update`    – run one refresh cycle now

use axum::{
    Json, Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use coinpulse_core::processors::RefreshError;
use coinpulse_core::stats::QueryError;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

mod get_deviation;
mod get_stats;
mod trigger_update;

/// Build the stats API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(get_stats::get_stats))
        .route("/deviation", get(get_deviation::get_deviation))
        .route("/trigger-update", post(trigger_update::trigger_update))
}

/// Query string carrying the asset selection.
///
/// `coin` is optional at the extractor level so its absence maps to the
/// JSON error body instead of axum's plain-text rejection.
#[derive(Debug, Deserialize)]
struct CoinQuery {
    coin: Option<String>,
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur in stats API handlers.
#[derive(Debug)]
enum ApiError {
    /// The coin query parameter was missing.
    MissingCoin,
    /// A read query failed.
    Query(QueryError),
    /// A manual refresh cycle failed.
    Refresh(RefreshError),
}

/// JSON body shape shared by every error response.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::MissingCoin => {
                error_response(StatusCode::BAD_REQUEST, "coin parameter is required")
            }
            ApiError::Query(QueryError::UnsupportedAsset(e)) => {
                error_response(StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Query(QueryError::NotFound(asset)) => error_response(
                StatusCode::NOT_FOUND,
                format!("no data found for asset '{asset}'"),
            ),
            ApiError::Query(e) => {
                tracing::error!(error = %e, "Stats query failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            ApiError::Refresh(RefreshError::Provider(e)) => {
                tracing::error!(error = %e, "Manual refresh failed at the provider");
                error_response(StatusCode::BAD_GATEWAY, "market data provider unavailable")
            }
            ApiError::Refresh(RefreshError::Store(e)) => {
                tracing::error!(error = %e, "Manual refresh failed at the store");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}
