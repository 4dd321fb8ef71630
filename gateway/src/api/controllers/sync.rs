use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::api::models::sync::{ErrorResponse, SyncResponse};
use crate::api::state::ApiState;
use crate::sheets::{SyncError, SyncRecord};

pub async fn sync_to_sheets(State(state): State<ApiState>, body: Bytes) -> Response {
    sync_impl(state, body).await.unwrap_or_else(|e| {
        tracing::error!("error in sync-to-sheets: {e}");
        error_response(e.to_string())
    })
}

/// `500 {"error": message}`, the only failure shape callers see.
pub fn error_response(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: message }),
    )
        .into_response()
}

/// CORS preflight. Headers are attached by the endpoint middleware.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn sync_impl(state: ApiState, body: Bytes) -> Result<Response, SyncError> {
    let de = &mut serde_json::Deserializer::from_slice(&body);
    let record: SyncRecord = serde_path_to_error::deserialize(de)
        .map_err(|e| SyncError::InvalidPayload(e.to_string()))?;

    tracing::info!(name = %record.name, "syncing contact to Google Sheets");

    state.sync_record(&record).await?;

    tracing::info!("successfully synced to Google Sheets");
    Ok(Json(SyncResponse { success: true }).into_response())
}
