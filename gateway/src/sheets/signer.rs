use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey};
use serde::Serialize;

use crate::sheets::config::SheetsConfig;
use crate::sheets::credentials::ServiceAccountCredentials;
use crate::sheets::error::SyncError;
use crate::utils::time::now_sec;

/// Compact, signed JWT-bearer assertion: `<header>.<claims>.<signature>`.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedAssertion(String);

impl SignedAssertion {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SignedAssertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SignedAssertion(..)")
    }
}

/// JOSE header. Field order is part of the wire format.
#[derive(Serialize)]
struct AssertionHeader {
    alg: &'static str,
    typ: &'static str,
}

const RS256_HEADER: AssertionHeader = AssertionHeader {
    alg: "RS256",
    typ: "JWT",
};

#[derive(Serialize)]
struct AssertionClaims<'a> {
    /// Service account email.
    iss: &'a str,
    scope: &'a str,
    /// Token endpoint the assertion is presented to.
    aud: &'a str,
    exp: u64,
    iat: u64,
}

/// Signs service account assertions for the OAuth2 JWT-bearer grant.
pub struct ServiceCredentialSigner {
    scope: String,
    audience: String,
    lifetime: Duration,
}

impl ServiceCredentialSigner {
    pub fn new(scope: impl Into<String>, audience: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            scope: scope.into(),
            audience: audience.into(),
            lifetime,
        }
    }

    pub fn from_config(config: &SheetsConfig) -> Self {
        Self::new(
            config.scope.clone(),
            config.token_url.clone(),
            config.assertion_lifetime,
        )
    }

    pub fn build_assertion(
        &self,
        credentials: &ServiceAccountCredentials,
    ) -> Result<SignedAssertion, SyncError> {
        self.build_assertion_at(credentials, now_sec())
    }

    /// Same as [`build_assertion`] with an explicit `iat`.
    ///
    /// [`build_assertion`]: Self::build_assertion
    pub fn build_assertion_at(
        &self,
        credentials: &ServiceAccountCredentials,
        iat: u64,
    ) -> Result<SignedAssertion, SyncError> {
        if credentials.client_email().is_empty() {
            return Err(SyncError::Credential("client_email is empty".to_owned()));
        }

        let key = EncodingKey::from_rsa_pem(credentials.private_key().as_bytes())
            .map_err(|e| SyncError::Credential(format!("failed to import private key: {e}")))?;

        let claims = AssertionClaims {
            iss: credentials.client_email(),
            scope: &self.scope,
            aud: &self.audience,
            exp: iat + self.lifetime.as_secs(),
            iat,
        };

        let signing_input = format!(
            "{}.{}",
            encode_segment(&RS256_HEADER)?,
            encode_segment(&claims)?
        );

        // RSASSA-PKCS1-v1_5 over SHA-256, already base64url without padding.
        let signature = jsonwebtoken::crypto::sign(signing_input.as_bytes(), &key, Algorithm::RS256)
            .map_err(|e| SyncError::Credential(format!("failed to sign assertion: {e}")))?;

        Ok(SignedAssertion(format!("{signing_input}.{signature}")))
    }
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String, SyncError> {
    let json = serde_json::to_vec(value)
        .map_err(|e| SyncError::Credential(format!("failed to serialize assertion: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}
