use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;

use super::ApiError;
use crate::state::AppState;

/// Trigger response body.
#[derive(Serialize)]
struct TriggerResponse {
    message: &'static str,
    inserted: u32,
}

/// `POST /trigger-update` — run one refresh cycle now.
///
/// Bypasses the event channel: the refresh runs inline and its outcome is
/// returned to the caller.
pub(super) async fn trigger_update(state: State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let report = state.refresher.refresh_all().await.map_err(ApiError::Refresh)?;
    tracing::info!(
        fetched = report.fetched,
        inserted = report.inserted,
        failed = report.failed,
        "Manual refresh completed"
    );
    Ok(Json(TriggerResponse {
        message: "stats updated successfully",
        inserted: report.inserted,
    }))
}
