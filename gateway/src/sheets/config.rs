use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::sheets::credentials::CredentialSource;
use crate::sheets::error::SyncError;

/// Identity providers refuse assertions that live longer than an hour.
pub const MAX_ASSERTION_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    /// OAuth2 token endpoint, also used as the assertion audience.
    ///
    /// Default: `https://oauth2.googleapis.com/token`
    pub token_url: String,

    /// Base URL of the Sheets API, ending with the version segment.
    ///
    /// Default: `https://sheets.googleapis.com/v4/`
    pub api_base_url: String,

    pub spreadsheet_id: String,

    /// A1 notation of the appended columns.
    ///
    /// Default: `Healbot!A:C`
    pub range: String,

    /// OAuth scope requested for the service account.
    pub scope: String,

    /// Default: `RAW`
    pub value_input_option: String,

    /// `exp - iat` of every signed assertion.
    ///
    /// Default: `1h`
    #[serde(with = "humantime_serde")]
    pub assertion_lifetime: Duration,

    /// Where the service account JSON is read from on every request.
    pub credentials: CredentialSource,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            token_url: "https://oauth2.googleapis.com/token".to_owned(),
            api_base_url: "https://sheets.googleapis.com/v4/".to_owned(),
            spreadsheet_id: "1300EblBLOmYNUox7GgqZ_PxywxNo_FT0YxkTIqGrrhA".to_owned(),
            range: "Healbot!A:C".to_owned(),
            scope: "https://www.googleapis.com/auth/spreadsheets".to_owned(),
            value_input_option: "RAW".to_owned(),
            assertion_lifetime: MAX_ASSERTION_LIFETIME,
            credentials: CredentialSource::default(),
        }
    }
}

impl SheetsConfig {
    pub fn validate(&self) -> Result<(), SyncError> {
        let lifetime = self.assertion_lifetime;
        if lifetime.as_secs() == 0 || lifetime > MAX_ASSERTION_LIFETIME {
            return Err(SyncError::Configuration(format!(
                "assertion_lifetime must be between 1s and {}s, got {}s",
                MAX_ASSERTION_LIFETIME.as_secs(),
                lifetime.as_secs(),
            )));
        }

        Url::parse(&self.token_url)
            .map_err(|e| SyncError::Configuration(format!("invalid token_url: {e}")))?;
        self.append_url()?;

        Ok(())
    }

    /// `{api_base_url}spreadsheets/{id}/values/{range}:append?valueInputOption=...`
    pub fn append_url(&self) -> Result<Url, SyncError> {
        let mut url = Url::parse(&self.api_base_url)
            .map_err(|e| SyncError::Configuration(format!("invalid api_base_url: {e}")))?;

        let range = format!("{}:append", self.range);
        url.path_segments_mut()
            .map_err(|_| SyncError::Configuration("api_base_url cannot be a base".to_owned()))?
            .pop_if_empty()
            .extend([
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                range.as_str(),
            ]);

        url.query_pairs_mut()
            .append_pair("valueInputOption", &self.value_input_option);

        Ok(url)
    }
}
