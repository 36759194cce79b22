//! BigQuery Client
//!
//! Typed client for the BigQuery REST v2 dataset and table endpoints,
//! combining authentication and HTTP functionality.

use super::auth::GcpCredentials;
use super::bigquery::{Dataset, Table};
use super::http::GcpHttpClient;
use crate::error::{ProviderError, Result};
use url::Url;

/// Production BigQuery REST endpoint
pub const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2/";

/// Parse an endpoint override, making sure relative joins keep its path
pub fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let normalized = if endpoint.ends_with('/') {
        endpoint.to_string()
    } else {
        format!("{}/", endpoint)
    };

    Url::parse(&normalized)
        .map_err(|e| ProviderError::config(format!("invalid BigQuery endpoint '{}': {}", endpoint, e)))
}

/// BigQuery API client
#[derive(Clone)]
pub struct BigQueryClient {
    credentials: GcpCredentials,
    http: GcpHttpClient,
    endpoint: Url,
}

impl BigQueryClient {
    /// Create a client; `endpoint` overrides [`DEFAULT_ENDPOINT`]
    pub fn new(credentials: GcpCredentials, user_agent: &str, endpoint: Option<&str>) -> Result<Self> {
        let http = GcpHttpClient::new(user_agent)?;
        let endpoint = parse_endpoint(endpoint.unwrap_or(DEFAULT_ENDPOINT))?;

        Ok(Self {
            credentials,
            http,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build an API URL from path segments, percent-encoding each one
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let path = segments
            .iter()
            .map(|s| urlencoding::encode(s))
            .collect::<Vec<_>>()
            .join("/");

        self.endpoint
            .join(&path)
            .map_err(|e| ProviderError::config(format!("invalid BigQuery URL path '{}': {}", path, e)))
    }

    // =========================================================================
    // Datasets
    // =========================================================================

    pub async fn get_dataset(&self, project: &str, dataset_id: &str) -> Result<Dataset> {
        let url = self.url(&["projects", project, "datasets", dataset_id])?;
        let token = self.credentials.get_token().await?;
        let resource = format!("Dataset {}:{}", project, dataset_id);
        self.http.get(url, &token, &resource).await
    }

    pub async fn insert_dataset(&self, project: &str, dataset: &Dataset) -> Result<Dataset> {
        let url = self.url(&["projects", project, "datasets"])?;
        let token = self.credentials.get_token().await?;
        let resource = format!("Project {}", project);
        self.http.post(url, &token, dataset, &resource).await
    }

    /// Delete a dataset; with `delete_contents` its tables go too
    pub async fn delete_dataset(&self, project: &str, dataset_id: &str, delete_contents: bool) -> Result<()> {
        let mut url = self.url(&["projects", project, "datasets", dataset_id])?;
        if delete_contents {
            url.query_pairs_mut().append_pair("deleteContents", "true");
        }
        let token = self.credentials.get_token().await?;
        let resource = format!("Dataset {}:{}", project, dataset_id);
        self.http.delete(url, &token, &resource).await
    }

    // =========================================================================
    // Tables
    // =========================================================================

    pub async fn get_table(&self, project: &str, dataset_id: &str, table_id: &str) -> Result<Table> {
        let url = self.url(&["projects", project, "datasets", dataset_id, "tables", table_id])?;
        let token = self.credentials.get_token().await?;
        let resource = format!("Table {}:{}.{}", project, dataset_id, table_id);
        self.http.get(url, &token, &resource).await
    }

    pub async fn insert_table(&self, project: &str, dataset_id: &str, table: &Table) -> Result<Table> {
        let url = self.url(&["projects", project, "datasets", dataset_id, "tables"])?;
        let token = self.credentials.get_token().await?;
        let resource = format!("Dataset {}:{}", project, dataset_id);
        self.http.post(url, &token, table, &resource).await
    }

    pub async fn delete_table(&self, project: &str, dataset_id: &str, table_id: &str) -> Result<()> {
        let url = self.url(&["projects", project, "datasets", dataset_id, "tables", table_id])?;
        let token = self.credentials.get_token().await?;
        let resource = format!("Table {}:{}.{}", project, dataset_id, table_id);
        self.http.delete(url, &token, &resource).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: Option<&str>) -> BigQueryClient {
        BigQueryClient::new(GcpCredentials::from_access_token("t"), "test-agent", endpoint).unwrap()
    }

    #[test]
    fn test_default_endpoint() {
        assert_eq!(client(None).endpoint().as_str(), DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_endpoint_override_gets_trailing_slash() {
        let client = client(Some("http://127.0.0.1:8080/bigquery/v2"));
        assert_eq!(client.endpoint().as_str(), "http://127.0.0.1:8080/bigquery/v2/");
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        let err = BigQueryClient::new(GcpCredentials::from_access_token("t"), "a", Some("not a url"))
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::Config(_)));
    }

    #[test]
    fn test_url_encodes_domain_scoped_projects() {
        let url = client(None)
            .url(&["projects", "example.com:my-project", "datasets", "foobar"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://bigquery.googleapis.com/bigquery/v2/projects/example.com%3Amy-project/datasets/foobar"
        );
    }
}
