//! Provider Configuration
//!
//! The provider block: which credentials to use, which project and region to
//! manage, and the client handle built from them.

use crate::error::{ProviderError, Result};
use crate::gcp::auth::GcpCredentials;
use crate::gcp::client::BigQueryClient;
use crate::gcp::http::user_agent;
use crate::resource::schema::{Attribute, AttributeType, Decoded, EnvLookup, ResourceSchema};
use crate::validation::{validate_account_file_attr, validate_credentials_attr, Diagnostics};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

pub const ENV_CREDENTIALS: &str = "GOOGLE_CREDENTIALS";
pub const ENV_ACCOUNT_FILE: &str = "GOOGLE_ACCOUNT_FILE";
pub const ENV_ACCESS_TOKEN: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
pub const ENV_PROJECT: &str = "GOOGLE_PROJECT";
pub const ENV_REGION: &str = "GOOGLE_REGION";
pub const ENV_BIGQUERY_ENDPOINT: &str = "GOOGLE_BIGQUERY_CUSTOM_ENDPOINT";

static PROVIDER_SCHEMA: OnceLock<ResourceSchema> = OnceLock::new();

/// Schema of the provider block
pub fn provider_schema() -> &'static ResourceSchema {
    PROVIDER_SCHEMA.get_or_init(|| {
        ResourceSchema::new(
            "provider",
            "Google BigQuery provider configuration",
            vec![
                Attribute::optional("credentials", AttributeType::String)
                    .env_default(ENV_CREDENTIALS)
                    .sensitive()
                    .conflicts_with(&["access_token"])
                    .describe("Service account key JSON")
                    .validate_with(validate_credentials_attr),
                Attribute::optional("account_file", AttributeType::String)
                    .env_default(ENV_ACCOUNT_FILE)
                    .sensitive()
                    .conflicts_with(&["access_token"])
                    .deprecated("use credentials instead")
                    .describe("Path to, or contents of, a service account key")
                    .validate_with(validate_account_file_attr),
                Attribute::optional("access_token", AttributeType::String)
                    .env_default(ENV_ACCESS_TOKEN)
                    .sensitive()
                    .describe("Pre-minted OAuth2 access token"),
                Attribute::required("project", AttributeType::String)
                    .env_default(ENV_PROJECT)
                    .describe("Project that owns the managed datasets"),
                Attribute::required("region", AttributeType::String)
                    .env_default(ENV_REGION)
                    .describe("Default region"),
                Attribute::optional("bigquery_custom_endpoint", AttributeType::String)
                    .env_default(ENV_BIGQUERY_ENDPOINT)
                    .describe("Override for the BigQuery REST base URL"),
            ],
        )
    })
}

/// Decoded provider block
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub credentials: Option<String>,
    #[serde(default)]
    pub account_file: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    pub project: String,
    pub region: String,
    #[serde(default)]
    pub bigquery_custom_endpoint: Option<String>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<sensitive>");
        f.debug_struct("ProviderConfig")
            .field("credentials", &redact(&self.credentials))
            .field("account_file", &redact(&self.account_file))
            .field("access_token", &redact(&self.access_token))
            .field("project", &self.project)
            .field("region", &self.region)
            .field("bigquery_custom_endpoint", &self.bigquery_custom_endpoint)
            .finish()
    }
}

impl ProviderConfig {
    /// Decode a raw provider block, consulting `env` for unset attributes
    pub fn decode(raw: &Value, env: EnvLookup<'_>) -> std::result::Result<Decoded<Self>, Diagnostics> {
        provider_schema().decode(raw, env)
    }

    /// Credentials to load: `credentials` wins over the legacy `account_file`
    pub fn effective_credentials(&self) -> Option<&str> {
        self.credentials
            .as_deref()
            .filter(|c| !c.is_empty())
            .or_else(|| self.account_file.as_deref().filter(|c| !c.is_empty()))
    }

    /// Authenticate and build the shared client handle
    pub async fn load_and_validate(&self, host_version: &str) -> Result<ClientConfig> {
        let access_token = self.access_token.as_deref().filter(|t| !t.is_empty());

        let credentials = match (access_token, self.effective_credentials()) {
            (Some(_), Some(_)) => {
                return Err(ProviderError::config(
                    "credentials and access_token are mutually exclusive",
                ))
            }
            (Some(token), None) => GcpCredentials::from_access_token(token),
            (None, credentials) => GcpCredentials::load(credentials).await?,
        };

        tracing::info!("Instantiating Google BigQuery Client...");
        let bigquery = BigQueryClient::new(
            credentials,
            &user_agent(host_version),
            self.bigquery_custom_endpoint.as_deref(),
        )?;

        Ok(ClientConfig {
            project: self.project.clone(),
            region: self.region.clone(),
            bigquery,
        })
    }
}

/// Configured client handle shared by every resource operation.
///
/// Immutable once built; clone it or share it behind an `Arc` across
/// concurrent handler calls.
#[derive(Clone)]
pub struct ClientConfig {
    pub project: String,
    pub region: String,
    pub bigquery: BigQueryClient,
}

impl ClientConfig {
    pub fn new(project: impl Into<String>, region: impl Into<String>, bigquery: BigQueryClient) -> Self {
        Self {
            project: project.into(),
            region: region.into(),
            bigquery,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("project", &self.project)
            .field("region", &self.region)
            .field("endpoint", &self.bigquery.endpoint().as_str())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::schema::no_env;
    use serde_json::json;
    use std::collections::HashMap;

    fn env_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_project_and_region_required() {
        let diags = ProviderConfig::decode(&json!({}), &no_env).unwrap_err();
        let message = diags.to_string();
        assert!(message.contains("\"project\" is required"));
        assert!(message.contains("\"region\" is required"));
    }

    #[test]
    fn test_env_defaults() {
        let env = env_from(&[(ENV_PROJECT, "env-project"), (ENV_REGION, "us-central1")]);
        let decoded = ProviderConfig::decode(&json!({}), &env).unwrap();
        assert_eq!(decoded.config.project, "env-project");
        assert_eq!(decoded.config.region, "us-central1");
        assert!(decoded.config.credentials.is_none());
    }

    #[test]
    fn test_explicit_values_win_over_env() {
        let env = env_from(&[(ENV_PROJECT, "env-project"), (ENV_REGION, "us-central1")]);
        let decoded =
            ProviderConfig::decode(&json!({"project": "mine", "region": "europe-west1"}), &env)
                .unwrap();
        assert_eq!(decoded.config.project, "mine");
        assert_eq!(decoded.config.region, "europe-west1");
    }

    #[test]
    fn test_malformed_credentials_rejected_before_network() {
        let diags = ProviderConfig::decode(
            &json!({"project": "p", "region": "r", "credentials": "{oops"}),
            &no_env,
        )
        .unwrap_err();
        assert!(matches!(
            diags.into_error(),
            Some(ProviderError::CredentialParse { .. })
        ));
    }

    #[test]
    fn test_credentials_conflict_with_access_token() {
        let diags = ProviderConfig::decode(
            &json!({
                "project": "p",
                "region": "r",
                "credentials": r#"{"private_key": "k", "client_email": "e"}"#,
                "access_token": "ya29.x"
            }),
            &no_env,
        )
        .unwrap_err();
        assert!(diags.to_string().contains("conflicts with access_token"));
    }

    #[test]
    fn test_account_file_is_deprecated_fallback() {
        let config = ProviderConfig {
            account_file: Some("{}".to_string()),
            ..Default::default()
        };
        assert_eq!(config.effective_credentials(), Some("{}"));

        let config = ProviderConfig {
            credentials: Some("a".to_string()),
            account_file: Some("b".to_string()),
            ..Default::default()
        };
        assert_eq!(config.effective_credentials(), Some("a"));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = ProviderConfig {
            access_token: Some("ya29.secret".to_string()),
            ..Default::default()
        };
        assert!(!format!("{:?}", config).contains("ya29.secret"));
    }

    #[tokio::test]
    async fn test_access_token_configures_client() {
        let config = ProviderConfig {
            access_token: Some("ya29.token".to_string()),
            project: "p".to_string(),
            region: "r".to_string(),
            ..Default::default()
        };
        let client = config.load_and_validate("1.5.7").await.unwrap();
        assert_eq!(client.project, "p");
        assert_eq!(client.region, "r");
    }
}
