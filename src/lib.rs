//! Google BigQuery provider
//!
//! Manages BigQuery datasets and tables as declarative resources: decodes and
//! validates configuration, authenticates against Google, and maps each
//! resource operation onto the BigQuery REST v2 API.
//!
//! # Module Structure
//!
//! - [`config`] - Provider block and the shared [`ClientConfig`]
//! - [`gcp`] - Authentication, HTTP and the typed BigQuery client
//! - [`resource`] - Schemas and handlers for datasets and tables
//! - [`provider`] - Host-facing facade dispatching by resource type
//! - [`validation`] - Offline checks and [`Diagnostics`]
//! - [`manifest`] - Minimal manifest runner used by the binary

pub mod config;
pub mod error;
pub mod gcp;
pub mod manifest;
pub mod provider;
pub mod resource;
pub mod validation;

/// Version injected at compile time via GOOGLEBIGQUERY_VERSION (set by CI/CD),
/// or the crate version for local builds.
pub const VERSION: &str = match option_env!("GOOGLEBIGQUERY_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

pub use config::{ClientConfig, ProviderConfig};
pub use error::{ProviderError, Result};
pub use provider::{ConfiguredProvider, Provider};
pub use validation::Diagnostics;
