//! Fake token and Sheets endpoints for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::extract::{Form, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::post;
use tokio::net::TcpListener;

use crate::sheets::config::SheetsConfig;
use crate::sheets::credentials::{CredentialProvider, ServiceAccountCredentials};
use crate::sheets::error::SyncError;

pub const PRIVATE_KEY_PEM: &str = include_str!("../../tests/fixtures/service_account_key.pem");
pub const PUBLIC_KEY_PEM: &str = include_str!("../../tests/fixtures/service_account_key.pub.pem");

pub const CLIENT_EMAIL: &str = "sheets-sync@demo-project.iam.gserviceaccount.com";
pub const ACCESS_TOKEN: &str = "ya29.test-access-token";

pub fn test_credentials() -> ServiceAccountCredentials {
    ServiceAccountCredentials::new(CLIENT_EMAIL, PRIVATE_KEY_PEM)
}

/// Always hands out the fixture service account.
pub struct StaticCredentials;

impl CredentialProvider for StaticCredentials {
    fn service_account(&self) -> Result<ServiceAccountCredentials, SyncError> {
        Ok(test_credentials())
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("failed to build test http client")
}

pub struct FakeBehavior {
    pub token_status: StatusCode,
    pub token_body: serde_json::Value,
    /// Delay before the token endpoint answers.
    pub token_delay: Duration,
    pub append_status: StatusCode,
}

impl Default for FakeBehavior {
    fn default() -> Self {
        Self {
            token_status: StatusCode::OK,
            token_body: serde_json::json!({
                "access_token": ACCESS_TOKEN,
                "expires_in": 3599,
                "token_type": "Bearer",
            }),
            token_delay: Duration::ZERO,
            append_status: StatusCode::OK,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedAppend {
    pub path_and_query: String,
    pub authorization: Option<String>,
    pub body: serde_json::Value,
}

struct FakeState {
    behavior: FakeBehavior,
    token_requests: Mutex<Vec<HashMap<String, String>>>,
    append_requests: Mutex<Vec<RecordedAppend>>,
}

pub struct FakeGoogle {
    base_url: String,
    state: Arc<FakeState>,
}

impl FakeGoogle {
    pub async fn start(behavior: FakeBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let state = Arc::new(FakeState {
            behavior,
            token_requests: Mutex::default(),
            append_requests: Mutex::default(),
        });

        let router = axum::Router::new()
            .route("/token", post(token))
            .fallback(append)
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { base_url, state }
    }

    pub fn sheets_config(&self) -> SheetsConfig {
        SheetsConfig {
            token_url: format!("{}/token", self.base_url),
            api_base_url: format!("{}/v4/", self.base_url),
            ..Default::default()
        }
    }

    pub fn token_requests(&self) -> Vec<HashMap<String, String>> {
        self.state.token_requests.lock().unwrap().clone()
    }

    pub fn append_requests(&self) -> Vec<RecordedAppend> {
        self.state.append_requests.lock().unwrap().clone()
    }
}

async fn token(
    State(state): State<Arc<FakeState>>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<serde_json::Value>) {
    state.token_requests.lock().unwrap().push(form);
    if !state.behavior.token_delay.is_zero() {
        tokio::time::sleep(state.behavior.token_delay).await;
    }
    (
        state.behavior.token_status,
        Json(state.behavior.token_body.clone()),
    )
}

async fn append(
    State(state): State<Arc<FakeState>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    state.append_requests.lock().unwrap().push(RecordedAppend {
        path_and_query: uri
            .path_and_query()
            .map(|p| p.as_str().to_owned())
            .unwrap_or_default(),
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
        body,
    });

    let status = state.behavior.append_status;
    let body = if status.is_success() {
        serde_json::json!({ "updates": { "updatedRows": 1 } })
    } else {
        serde_json::json!({ "error": { "code": status.as_u16(), "message": "The caller does not have permission" } })
    };
    (status, Json(body))
}
