use reqwest::StatusCode;

/// Failures of a single sync invocation.
///
/// Every variant is fatal for the request; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Required service account secret is missing or unreadable.
    #[error("{0}")]
    Configuration(String),
    /// Service account JSON or private key is malformed.
    #[error("invalid service account credentials: {0}")]
    Credential(String),
    /// Identity provider rejected the assertion or could not be reached.
    #[error("failed to obtain access token: {0}")]
    TokenExchange(String),
    /// Spreadsheet API rejected the append.
    ///
    /// `body` holds the response text for diagnostics and is never sent
    /// back to the caller.
    #[error("failed to sync to Google Sheets{}", display_status(.status))]
    SinkWrite {
        status: Option<StatusCode>,
        body: String,
    },
    /// Inbound request body is not a valid record.
    #[error("invalid request body: {0}")]
    InvalidPayload(String),
}

fn display_status(status: &Option<StatusCode>) -> String {
    match status {
        Some(status) => format!(" (status {})", status.as_u16()),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_write_message_hides_body() {
        let err = SyncError::SinkWrite {
            status: Some(StatusCode::FORBIDDEN),
            body: "{\"error\":{\"message\":\"caller lacks permission\"}}".to_owned(),
        };
        assert_eq!(err.to_string(), "failed to sync to Google Sheets (status 403)");

        let err = SyncError::SinkWrite {
            status: None,
            body: "connection reset".to_owned(),
        };
        assert_eq!(err.to_string(), "failed to sync to Google Sheets");
    }
}
