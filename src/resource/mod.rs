//! Resource abstraction layer
//!
//! Each managed resource kind declares its schema and implements
//! [`Resource`], translating between its typed configuration and the
//! BigQuery REST bodies.
//!
//! # Architecture
//!
//! - [`schema`] - Attribute declarations and the decoding step
//! - [`registry`] - Lookup of resource schemas by type name
//! - [`dataset`] - `googlebigquery_dataset`
//! - [`table`] - `googlebigquery_table`
//!
//! # Example
//!
//! ```ignore
//! use googlebigquery::resource::{dataset::{DatasetConfig, DatasetResource}, Resource};
//!
//! async fn create(meta: &googlebigquery::ClientConfig) -> googlebigquery::Result<()> {
//!     let config = DatasetConfig::new("foobar");
//!     let state = DatasetResource::create(meta, config).await?;
//!     println!("created {}", state.id);
//!     Ok(())
//! }
//! ```

pub mod dataset;
pub mod registry;
pub mod schema;
pub mod table;

use crate::config::ClientConfig;
use crate::error::{ProviderError, Result};
use crate::validation::Diagnostics;
use schema::ResourceSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use registry::{get_registry, get_resource_schema, resource_types};

/// Type name of the dataset resource
pub const DATASET: &str = "googlebigquery_dataset";
/// Type name of the table resource
pub const TABLE: &str = "googlebigquery_table";

/// A managed resource kind.
///
/// Handlers receive the configured [`ClientConfig`] explicitly; nothing is
/// looked up from process-wide state.
#[allow(async_fn_in_trait)]
pub trait Resource {
    const TYPE_NAME: &'static str;

    /// Typed configuration, produced by decoding against [`Resource::schema`]
    type Config: Serialize + DeserializeOwned + Send;

    /// Configuration plus the attributes the provider computes
    type State: Serialize + DeserializeOwned + Send;

    fn schema() -> ResourceSchema;

    /// Cross-attribute checks run after decoding, before any network call
    fn validate(config: &Self::Config) -> Diagnostics {
        let _ = config;
        Diagnostics::new()
    }

    async fn create(meta: &ClientConfig, config: Self::Config) -> Result<Self::State>;

    /// Refresh from the API; `None` means the resource is gone
    async fn read(meta: &ClientConfig, state: Self::State) -> Result<Option<Self::State>>;

    /// Every attribute forces replacement, so in-place updates are refused
    async fn update(meta: &ClientConfig, prior: Self::State, config: Self::Config) -> Result<Self::State> {
        let _ = (meta, prior, config);
        Err(ProviderError::UpdateUnsupported {
            resource_type: Self::TYPE_NAME.to_string(),
        })
    }

    async fn delete(meta: &ClientConfig, state: Self::State) -> Result<()>;
}
