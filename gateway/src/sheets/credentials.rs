use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::sheets::error::SyncError;

/// Service account key as issued by the identity provider.
///
/// Only the fields needed to sign an assertion are kept; everything else in
/// the key file is ignored.
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct ServiceAccountCredentials {
    client_email: String,
    /// PEM-encoded PKCS8 RSA private key.
    private_key: String,
}

impl ServiceAccountCredentials {
    pub fn new(client_email: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            client_email: client_email.into(),
            private_key: private_key.into(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, SyncError> {
        let de = &mut serde_json::Deserializer::from_str(json);
        serde_path_to_error::deserialize(de).map_err(|e| SyncError::Credential(e.to_string()))
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }
}

impl std::fmt::Debug for ServiceAccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountCredentials")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Supplies service account credentials to each sync invocation.
pub trait CredentialProvider: Send + Sync {
    fn service_account(&self) -> Result<ServiceAccountCredentials, SyncError>;
}

/// Secret store the service account JSON is read from.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialSource {
    /// Environment variable holding the whole JSON document.
    Env { var: String },
    /// File holding the JSON document, e.g. a mounted secret.
    File { path: PathBuf },
}

impl Default for CredentialSource {
    fn default() -> Self {
        Self::Env {
            var: "GOOGLE_SHEETS_SERVICE_ACCOUNT".to_owned(),
        }
    }
}

impl CredentialProvider for CredentialSource {
    fn service_account(&self) -> Result<ServiceAccountCredentials, SyncError> {
        let json = match self {
            Self::Env { var } => match std::env::var(var) {
                Ok(json) if !json.trim().is_empty() => json,
                _ => {
                    return Err(SyncError::Configuration(format!(
                        "Google Sheets service account not configured ({var} is not set)"
                    )));
                }
            },
            Self::File { path } => std::fs::read_to_string(path).map_err(|e| {
                SyncError::Configuration(format!(
                    "failed to read service account file {}: {e}",
                    path.display()
                ))
            })?,
        };

        ServiceAccountCredentials::from_json(&json)
    }
}
