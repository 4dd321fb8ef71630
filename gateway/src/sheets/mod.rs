use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub use self::config::SheetsConfig;
pub use self::credentials::{CredentialProvider, CredentialSource};
pub use self::error::SyncError;
pub use self::record::SyncRecord;
pub use self::signer::{ServiceCredentialSigner, SignedAssertion};

mod config;
mod credentials;
mod error;
mod record;
mod signer;

#[cfg(test)]
pub mod testing;

const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Short-lived bearer token. Minted per request, never cached.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Serialize)]
struct AppendValues<'a> {
    values: [[&'a str; 3]; 1],
}

/// Appends rows to one spreadsheet on behalf of a service account.
#[derive(Clone)]
pub struct SheetsClient {
    inner: Arc<Inner>,
}

struct Inner {
    http_client: reqwest::Client,
    config: SheetsConfig,
    signer: ServiceCredentialSigner,
    append_url: Url,
}

impl SheetsClient {
    pub fn new(http_client: reqwest::Client, config: SheetsConfig) -> Result<Self, SyncError> {
        config.validate()?;

        let append_url = config.append_url()?;
        let signer = ServiceCredentialSigner::from_config(&config);

        Ok(Self {
            inner: Arc::new(Inner {
                http_client,
                config,
                signer,
                append_url,
            }),
        })
    }

    /// Runs `credentials -> assertion -> token -> append` in sequence.
    ///
    /// The first failure stops the pipeline. Credentials are resolved before
    /// any network call is made.
    pub async fn sync(
        &self,
        credentials: &dyn CredentialProvider,
        record: &SyncRecord,
    ) -> Result<(), SyncError> {
        let assertion = {
            let service_account = credentials.service_account()?;
            tracing::debug!(
                client_email = %service_account.client_email(),
                "building service account assertion"
            );
            self.inner.signer.build_assertion(&service_account)?
        };

        let token = self.exchange_for_token(&assertion).await?;
        self.append_record(&token, record).await
    }

    pub async fn exchange_for_token(
        &self,
        assertion: &SignedAssertion,
    ) -> Result<AccessToken, SyncError> {
        let token_url = &self.inner.config.token_url;

        let response = self
            .inner
            .http_client
            .post(token_url)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT_TYPE),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SyncError::TokenExchange(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, %body, "token endpoint rejected assertion");
            return Err(SyncError::TokenExchange(format!(
                "token endpoint returned {}",
                status.as_u16()
            )));
        }

        let response: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::TokenExchange(format!("invalid token response: {e}")))?;

        match response.access_token {
            Some(token) if !token.is_empty() => Ok(AccessToken(token)),
            _ => Err(SyncError::TokenExchange(
                "token response has no access_token".to_owned(),
            )),
        }
    }

    /// Appends `record` as a single row. Not idempotent.
    pub async fn append_record(
        &self,
        token: &AccessToken,
        record: &SyncRecord,
    ) -> Result<(), SyncError> {
        let body = AppendValues {
            values: [record.to_row()],
        };

        let response = self
            .inner
            .http_client
            .post(self.inner.append_url.clone())
            .bearer_auth(token.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::SinkWrite {
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, %body, "Google Sheets API error");
            return Err(SyncError::SinkWrite {
                status: Some(status),
                body,
            });
        }

        tracing::info!(range = %self.inner.config.range, "appended row to spreadsheet");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::sheets::testing::*;

    fn jane() -> SyncRecord {
        SyncRecord {
            name: "Jane Doe".to_owned(),
            email: "jane@example.com".to_owned(),
            phone: "+15551234567".to_owned(),
        }
    }

    async fn client_for(google: &FakeGoogle) -> SheetsClient {
        SheetsClient::new(http_client(), google.sheets_config()).unwrap()
    }

    #[tokio::test]
    async fn sync_exchanges_assertion_and_appends_row() {
        let google = FakeGoogle::start(FakeBehavior::default()).await;
        let client = client_for(&google).await;

        client.sync(&StaticCredentials, &jane()).await.unwrap();

        let token_requests = google.token_requests();
        assert_eq!(token_requests.len(), 1);
        assert_eq!(token_requests[0]["grant_type"], JWT_BEARER_GRANT_TYPE);
        assert_eq!(token_requests[0]["assertion"].split('.').count(), 3);

        let appends = google.append_requests();
        assert_eq!(appends.len(), 1);
        assert_eq!(
            appends[0].path_and_query,
            "/v4/spreadsheets/1300EblBLOmYNUox7GgqZ_PxywxNo_FT0YxkTIqGrrhA/values/Healbot!A:C:append?valueInputOption=RAW"
        );
        assert_eq!(
            appends[0].authorization.as_deref(),
            Some(format!("Bearer {ACCESS_TOKEN}").as_str())
        );
        assert_eq!(
            appends[0].body,
            serde_json::json!({ "values": [["Jane Doe", "+15551234567", ""]] })
        );
    }

    #[tokio::test]
    async fn rejected_assertion_skips_append() {
        let google = FakeGoogle::start(FakeBehavior {
            token_status: StatusCode::BAD_REQUEST,
            token_body: serde_json::json!({ "error": "invalid_grant" }),
            ..Default::default()
        })
        .await;
        let client = client_for(&google).await;

        let err = client.sync(&StaticCredentials, &jane()).await.unwrap_err();
        assert!(matches!(err, SyncError::TokenExchange(_)));
        assert_eq!(google.token_requests().len(), 1);
        assert!(google.append_requests().is_empty());
    }

    #[tokio::test]
    async fn token_response_without_access_token() {
        let google = FakeGoogle::start(FakeBehavior {
            token_body: serde_json::json!({ "token_type": "Bearer" }),
            ..Default::default()
        })
        .await;
        let client = client_for(&google).await;

        let err = client.sync(&StaticCredentials, &jane()).await.unwrap_err();
        assert!(matches!(err, SyncError::TokenExchange(_)));
        assert!(google.append_requests().is_empty());
    }

    #[tokio::test]
    async fn rejected_append_keeps_response_body() {
        let google = FakeGoogle::start(FakeBehavior {
            append_status: StatusCode::FORBIDDEN,
            ..Default::default()
        })
        .await;
        let client = client_for(&google).await;

        let err = client.sync(&StaticCredentials, &jane()).await.unwrap_err();
        match err {
            SyncError::SinkWrite { status, body } => {
                assert_eq!(status, Some(StatusCode::FORBIDDEN));
                assert!(body.contains("does not have permission"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_network() {
        let google = FakeGoogle::start(FakeBehavior::default()).await;
        let client = client_for(&google).await;
        let missing = CredentialSource::Env {
            var: "SHEETS_GATEWAY_TEST_SURELY_UNSET".to_owned(),
        };

        let err = client.sync(&missing, &jane()).await.unwrap_err();
        assert!(matches!(err, SyncError::Configuration(_)));
        assert!(google.token_requests().is_empty());
        assert!(google.append_requests().is_empty());
    }

    #[tokio::test]
    async fn unreachable_token_endpoint() {
        let config = SheetsConfig {
            token_url: "http://127.0.0.1:1/token".to_owned(),
            ..Default::default()
        };
        let client = SheetsClient::new(http_client(), config).unwrap();

        let err = client.sync(&StaticCredentials, &jane()).await.unwrap_err();
        assert!(matches!(err, SyncError::TokenExchange(_)));
    }

    #[tokio::test]
    async fn unreachable_sheets_api() {
        let google = FakeGoogle::start(FakeBehavior::default()).await;
        let config = SheetsConfig {
            api_base_url: "http://127.0.0.1:1/v4/".to_owned(),
            ..google.sheets_config()
        };
        let client = SheetsClient::new(http_client(), config).unwrap();

        let err = client.sync(&StaticCredentials, &jane()).await.unwrap_err();
        match err {
            SyncError::SinkWrite { status, body } => {
                assert_eq!(status, None);
                assert!(!body.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(google.token_requests().len(), 1);
        assert!(google.append_requests().is_empty());
    }
}
