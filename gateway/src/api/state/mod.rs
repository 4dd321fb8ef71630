use std::sync::Arc;

use anyhow::Result;
use reqwest::Client as HttpClient;
use tokio::net::TcpListener;

use crate::api::config::ApiConfig;
use crate::api::endpoint::ApiEndpoint;
use crate::sheets::{CredentialProvider, SheetsClient, SheetsConfig, SyncError, SyncRecord};

type SharedCredentials = Arc<dyn CredentialProvider>;

pub struct ApiStateBuilder<MandatoryFields = (HttpClient, SharedCredentials)> {
    config: ApiConfig,
    sheets_config: SheetsConfig,
    mandatory_fields: MandatoryFields,
}

impl ApiStateBuilder {
    pub fn build(self) -> Result<ApiState> {
        let (http_client, credentials) = self.mandatory_fields;

        let sheets_client = SheetsClient::new(http_client, self.sheets_config)?;

        Ok(ApiState {
            inner: Arc::new(Inner {
                config: self.config,
                sheets_client,
                credentials,
            }),
        })
    }
}

impl<T2> ApiStateBuilder<((), T2)> {
    pub fn with_http_client(self, http_client: HttpClient) -> ApiStateBuilder<(HttpClient, T2)> {
        let (_, credentials) = self.mandatory_fields;

        ApiStateBuilder {
            config: self.config,
            sheets_config: self.sheets_config,
            mandatory_fields: (http_client, credentials),
        }
    }
}

impl<T1> ApiStateBuilder<(T1, ())> {
    pub fn with_credentials<P>(self, credentials: P) -> ApiStateBuilder<(T1, SharedCredentials)>
    where
        P: CredentialProvider + 'static,
    {
        let (http_client, _) = self.mandatory_fields;
        let credentials: SharedCredentials = Arc::new(credentials);

        ApiStateBuilder {
            config: self.config,
            sheets_config: self.sheets_config,
            mandatory_fields: (http_client, credentials),
        }
    }
}

impl<T1, T2> ApiStateBuilder<(T1, T2)> {
    pub fn with_config(self, config: ApiConfig) -> ApiStateBuilder<(T1, T2)> {
        ApiStateBuilder { config, ..self }
    }

    pub fn with_sheets_config(self, sheets_config: SheetsConfig) -> ApiStateBuilder<(T1, T2)> {
        ApiStateBuilder {
            sheets_config,
            ..self
        }
    }
}

#[derive(Clone)]
#[repr(transparent)]
pub struct ApiState {
    inner: Arc<Inner>,
}

impl ApiState {
    pub fn builder() -> ApiStateBuilder<((), ())> {
        ApiStateBuilder {
            config: ApiConfig::default(),
            sheets_config: SheetsConfig::default(),
            mandatory_fields: ((), ()),
        }
    }

    pub async fn bind_socket(&self) -> std::io::Result<TcpListener> {
        TcpListener::bind(self.config().listen_addr).await
    }

    pub async fn bind_endpoint(&self) -> Result<ApiEndpoint> {
        ApiEndpoint::builder().bind(self.clone()).await
    }

    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Appends `record` using freshly loaded credentials.
    pub async fn sync_record(&self, record: &SyncRecord) -> Result<(), SyncError> {
        self.inner
            .sheets_client
            .sync(self.inner.credentials.as_ref(), record)
            .await
    }
}

struct Inner {
    config: ApiConfig,
    sheets_client: SheetsClient,
    credentials: SharedCredentials,
}
