//! GCP API interaction module
//!
//! This module provides the functionality for talking to Google BigQuery:
//! authentication, the HTTP layer and the typed REST client.
//!
//! # Module Structure
//!
//! - [`auth`] - Service account, default credential and access token sources
//! - [`bigquery`] - REST v2 request/response bodies
//! - [`client`] - Typed client for the dataset and table endpoints
//! - [`http`] - HTTP utilities and status-to-error mapping
//!
//! # Example
//!
//! ```ignore
//! use googlebigquery::gcp::{auth::GcpCredentials, client::BigQueryClient, http::user_agent};
//!
//! async fn example() -> googlebigquery::Result<()> {
//!     let credentials = GcpCredentials::load(None).await?;
//!     let client = BigQueryClient::new(credentials, &user_agent("1.5.7"), None)?;
//!     let dataset = client.get_dataset("my-project", "foobar").await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod bigquery;
pub mod client;
pub mod http;
