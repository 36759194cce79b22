//! Provider errors
//!
//! Every failure the provider can report, from credential loading through
//! configuration decoding to BigQuery API responses.

use thiserror::Error;

/// Result alias used across the provider.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors raised by the provider.
///
/// None of these are recovered locally: every variant aborts the current
/// operation and is reported to the caller. [`ProviderError::NotFound`] is the
/// one exception callers are expected to inspect, since a missing resource on
/// read means "remove from state" rather than failure.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The credentials file or content could not be read.
    #[error("Error loading credentials from '{path}': {source}")]
    CredentialRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The credentials were not valid service-account JSON.
    #[error("credentials are not valid JSON '{contents}': {reason}")]
    CredentialParse { contents: String, reason: String },

    /// No usable credentials could be turned into a token source.
    #[error("Authentication failed: {message}")]
    Auth {
        message: String,
        #[source]
        source: Option<gcp_auth::Error>,
    },

    /// The HTTP client backing the BigQuery client could not be built.
    #[error("Failed to create BigQuery client: {0}")]
    ClientInit(#[source] reqwest::Error),

    /// The remote resource does not exist.
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// BigQuery answered with a non-success status other than 404.
    #[error("BigQuery API request failed with status {status}: {message}")]
    RemoteApi { status: u16, message: String },

    /// The request never produced a response.
    #[error("Failed to send request: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body could not be decoded.
    #[error("Failed to parse response JSON: {0}")]
    InvalidResponse(#[source] serde_json::Error),

    /// Conflicting, missing or malformed configuration, caught before any
    /// network call.
    #[error("{0}")]
    Config(String),

    /// In-place updates are not supported; changes force replacement.
    #[error("{resource_type} does not support in-place updates; changed attributes force replacement")]
    UpdateUnsupported { resource_type: String },

    /// The resource type is not served by this provider.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),
}

impl ProviderError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn auth(message: impl Into<String>, source: Option<gcp_auth::Error>) -> Self {
        Self::Auth {
            message: message.into(),
            source,
        }
    }

    /// True when the error means the remote resource is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
