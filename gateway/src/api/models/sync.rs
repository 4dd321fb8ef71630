use serde::Serialize;

/// Body of a successful sync.
#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub success: bool,
}

/// Uniform failure body, always sent with `500`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
