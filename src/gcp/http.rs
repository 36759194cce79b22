//! HTTP utilities for GCP REST API calls

use crate::error::{ProviderError, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Pull `error.message` out of a Google API error body
fn api_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(|s| s.to_string())
}

/// User agent sent with every request, e.g.
/// `(linux x86_64) Terraform/1.5.7 terraform-provider-googlebigquery/0.1.0`
pub fn user_agent(host_version: &str) -> String {
    format!(
        "({} {}) Terraform/{} terraform-provider-googlebigquery/{}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        host_version,
        crate::VERSION
    )
}

/// HTTP client wrapper for GCP API calls
#[derive(Clone)]
pub struct GcpHttpClient {
    client: Client,
}

impl GcpHttpClient {
    /// Create a new HTTP client
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(ProviderError::ClientInit)?;

        Ok(Self { client })
    }

    /// Make a GET request; `resource` names the target in not-found errors
    pub async fn get<T: DeserializeOwned>(&self, url: Url, token: &str, resource: &str) -> Result<T> {
        tracing::debug!("GET {}", url);

        let request = self.client.get(url).bearer_auth(token);
        let body = self.execute(request, resource).await?;

        parse_body(&body)
    }

    /// Make a POST request with a JSON body
    pub async fn post<B, T>(&self, url: Url, token: &str, body: &B, resource: &str) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!("POST {}", url);

        let request = self.client.post(url).bearer_auth(token).json(body);
        let response_body = self.execute(request, resource).await?;

        parse_body(&response_body)
    }

    /// Make a DELETE request; the response body is ignored
    pub async fn delete(&self, url: Url, token: &str, resource: &str) -> Result<()> {
        tracing::debug!("DELETE {}", url);

        let request = self.client.delete(url).bearer_auth(token);
        self.execute(request, resource).await?;

        Ok(())
    }

    /// Send the request and map non-success statuses to provider errors
    async fn execute(&self, request: RequestBuilder, resource: &str) -> Result<String> {
        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            tracing::debug!("{} not found", resource);
            return Err(ProviderError::NotFound {
                resource: resource.to_string(),
            });
        }

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            let message = api_error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            });
            return Err(ProviderError::RemoteApi {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(ProviderError::InvalidResponse)
}
