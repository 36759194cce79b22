//! GCP Authentication
//!
//! Handles authentication using a service account key (JWT flow),
//! Application Default Credentials, or a pre-minted OAuth2 access token.

use crate::error::{ProviderError, Result};
use gcp_auth::{CustomServiceAccount, TokenProvider};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Scopes requested for every token
pub const CLIENT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/compute",
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/ndev.clouddns.readwrite",
    "https://www.googleapis.com/auth/devstorage.full_control",
];

/// Token endpoint used when the key file does not name one
pub const DEFAULT_TOKEN_URI: &str = "https://accounts.google.com/o/oauth2/token";

/// Service account key file contents
#[derive(Clone, Deserialize)]
pub struct AccountFile {
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl fmt::Debug for AccountFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountFile")
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"<redacted>")
            .field("client_email", &self.client_email)
            .field("client_id", &self.client_id)
            .field("project_id", &self.project_id)
            .finish()
    }
}

impl AccountFile {
    /// Parse key file contents
    pub fn parse(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).map_err(|e| ProviderError::CredentialParse {
            contents: contents.to_string(),
            reason: e.to_string(),
        })
    }

    /// Key JSON in the layout `gcp_auth` expects
    fn to_key_json(&self) -> String {
        serde_json::json!({
            "type": "service_account",
            "private_key_id": self.private_key_id,
            "private_key": self.private_key,
            "client_email": self.client_email,
            "client_id": self.client_id,
            "project_id": self.project_id,
            "token_uri": self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI),
        })
        .to_string()
    }
}

/// Expand a leading `~/` to the user's home directory
pub fn expand_home(value: &str) -> PathBuf {
    if let Some(rest) = value.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(value)
}

/// Read a value that is either a path to a file or the contents themselves.
///
/// Returns the contents and whether they were read from a file.
pub fn read_path_or_contents(value: &str) -> Result<(String, bool)> {
    if value.is_empty() {
        return Ok((String::new(), false));
    }

    let path = expand_home(value);
    if std::fs::metadata(&path).is_err() {
        return Ok((value.to_string(), false));
    }

    let contents = std::fs::read_to_string(&path).map_err(|source| ProviderError::CredentialRead {
        path: path.display().to_string(),
        source,
    })?;

    Ok((contents, true))
}

#[derive(Clone)]
enum TokenSource {
    Provider(Arc<dyn TokenProvider>),
    Static(String),
}

/// GCP credentials holder
///
/// Token caching and refresh are left to `gcp_auth`; nothing here mutates
/// after construction, so clones can be shared across concurrent requests.
#[derive(Clone)]
pub struct GcpCredentials {
    source: TokenSource,
}

impl GcpCredentials {
    /// Load credentials from a key (path or JSON), or fall back to
    /// Application Default Credentials when none is given
    pub async fn load(credentials: Option<&str>) -> Result<Self> {
        match credentials.filter(|c| !c.is_empty()) {
            Some(value) => {
                let (contents, _) = read_path_or_contents(value)?;
                let account = AccountFile::parse(&contents)?;
                Self::from_service_account(&account)
            }
            None => Self::application_default().await,
        }
    }

    /// JWT-based token source for a service account
    pub fn from_service_account(account: &AccountFile) -> Result<Self> {
        tracing::info!("Requesting Google token...");
        tracing::info!("  -- Email: {}", account.client_email);
        tracing::info!("  -- Scopes: {:?}", CLIENT_SCOPES);
        tracing::info!("  -- Private Key Length: {}", account.private_key.len());

        let service_account = CustomServiceAccount::from_json(&account.to_key_json())
            .map_err(|e| {
                ProviderError::auth(
                    format!("invalid service account key for {}", account.client_email),
                    Some(e),
                )
            })?;

        Ok(Self {
            source: TokenSource::Provider(Arc::new(service_account)),
        })
    }

    /// Application Default Credentials from the environment
    pub async fn application_default() -> Result<Self> {
        tracing::info!("Authenticating using default credentials");

        let provider = gcp_auth::provider().await.map_err(|e| {
            ProviderError::auth(
                "no default credentials found. Set credentials or run 'gcloud auth application-default login'",
                Some(e),
            )
        })?;

        Ok(Self {
            source: TokenSource::Provider(provider),
        })
    }

    /// Use an already minted OAuth2 access token as-is
    pub fn from_access_token(token: impl Into<String>) -> Self {
        tracing::info!("Authenticating using a static access token");
        Self {
            source: TokenSource::Static(token.into()),
        }
    }

    /// Get an access token for API calls
    pub async fn get_token(&self) -> Result<String> {
        match &self.source {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Provider(provider) => {
                let token = provider
                    .token(CLIENT_SCOPES)
                    .await
                    .map_err(|e| ProviderError::auth("Failed to get access token", Some(e)))?;
                Ok(token.as_str().to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_contents_literal() {
        let (contents, was_path) = read_path_or_contents("{\"a\": 1}").unwrap();
        assert_eq!(contents, "{\"a\": 1}");
        assert!(!was_path);
    }

    #[test]
    fn test_read_contents_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello").unwrap();

        let (contents, was_path) =
            read_path_or_contents(file.path().to_str().unwrap()).unwrap();
        assert_eq!(contents, "hello");
        assert!(was_path);
    }

    #[test]
    fn test_account_debug_redacts_key() {
        let account = AccountFile::parse(
            r#"{"private_key": "super-secret", "client_email": "a@b.iam.gserviceaccount.com"}"#,
        )
        .unwrap();
        let debug = format!("{:?}", account);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("a@b.iam.gserviceaccount.com"));
    }

    #[test]
    fn test_key_json_defaults_token_uri() {
        let account = AccountFile::parse(r#"{"private_key": "k", "client_email": "e"}"#).unwrap();
        let key: serde_json::Value = serde_json::from_str(&account.to_key_json()).unwrap();
        assert_eq!(key["token_uri"], DEFAULT_TOKEN_URI);
        assert_eq!(key["type"], "service_account");
    }

    #[test]
    fn test_invalid_private_key_is_auth_error() {
        let account = AccountFile::parse(
            r#"{"private_key": "not a pem", "client_email": "a@b.iam.gserviceaccount.com"}"#,
        )
        .unwrap();
        let err = GcpCredentials::from_service_account(&account)
            .err()
            .expect("key should be rejected");
        assert!(matches!(err, ProviderError::Auth { .. }));
    }

    #[test]
    fn test_static_token() {
        let credentials = GcpCredentials::from_access_token("ya29.token");
        let token = tokio_test::block_on(credentials.get_token()).unwrap();
        assert_eq!(token, "ya29.token");
    }
}
