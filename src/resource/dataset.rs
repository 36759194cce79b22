//! `googlebigquery_dataset`
//!
//! A dataset is created once and never updated in place. Deleting it either
//! removes it remotely or, with `softDelete`, only stops tracking it.

use super::schema::{Attribute, AttributeType, ResourceSchema};
use super::{Resource, DATASET};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::gcp::bigquery::{epoch_millis_to_rfc3339, Dataset, DatasetReference};
use crate::validation::validate_resource_id;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Configured dataset attributes
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetConfig {
    pub dataset_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Keep the remote dataset when the resource is destroyed
    #[serde(default)]
    pub soft_delete: bool,
    /// Delete the dataset's tables along with it
    #[serde(default)]
    pub delete_contents: bool,
}

impl DatasetConfig {
    pub fn new(dataset_id: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            friendly_name: None,
            description: None,
            location: None,
            soft_delete: false,
            delete_contents: false,
        }
    }

    /// Insert request body
    pub fn to_request(&self, project: &str) -> Dataset {
        Dataset {
            dataset_reference: DatasetReference {
                project_id: project.to_string(),
                dataset_id: self.dataset_id.clone(),
            },
            friendly_name: self.friendly_name.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            ..Default::default()
        }
    }
}

/// Dataset as tracked in state
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetState {
    /// `project:dataset`, as reported by the API
    pub id: String,
    #[serde(flatten)]
    pub config: DatasetConfig,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub self_link: Option<String>,
    #[serde(default)]
    pub creation_time: Option<String>,
    #[serde(default)]
    pub last_modified_time: Option<String>,
}

impl DatasetState {
    /// Refresh state from an API response, keeping local-only settings
    pub fn from_response(mut config: DatasetConfig, dataset: Dataset, project: &str) -> Self {
        let id = dataset
            .id
            .unwrap_or_else(|| format!("{}:{}", project, config.dataset_id));

        config.friendly_name = dataset.friendly_name;
        config.description = dataset.description;
        if dataset.location.is_some() {
            config.location = dataset.location;
        }

        Self {
            id,
            config,
            etag: dataset.etag,
            self_link: dataset.self_link,
            creation_time: epoch_millis_to_rfc3339(dataset.creation_time.as_deref()),
            last_modified_time: epoch_millis_to_rfc3339(dataset.last_modified_time.as_deref()),
        }
    }
}

pub struct DatasetResource;

impl Resource for DatasetResource {
    const TYPE_NAME: &'static str = DATASET;
    type Config = DatasetConfig;
    type State = DatasetState;

    fn schema() -> ResourceSchema {
        ResourceSchema::new(
            DATASET,
            "A BigQuery dataset",
            vec![
                Attribute::required("datasetId", AttributeType::String)
                    .force_new()
                    .describe("Dataset id, unique within the project")
                    .validate_with(validate_resource_id),
                Attribute::optional("friendlyName", AttributeType::String)
                    .force_new()
                    .describe("Descriptive name"),
                Attribute::optional("description", AttributeType::String)
                    .force_new()
                    .describe("User-friendly description"),
                Attribute::optional_computed("location", AttributeType::String)
                    .force_new()
                    .describe("Geographic location; the API default applies when unset"),
                Attribute::optional("softDelete", AttributeType::Bool)
                    .with_default(json!(false))
                    .force_new()
                    .describe("Leave the dataset in place when the resource is destroyed"),
                Attribute::optional("deleteContents", AttributeType::Bool)
                    .with_default(json!(false))
                    .force_new()
                    .describe("Delete contained tables when the dataset is destroyed"),
                Attribute::computed("id", AttributeType::String),
                Attribute::computed("etag", AttributeType::String),
                Attribute::computed("selfLink", AttributeType::String),
                Attribute::computed("creationTime", AttributeType::String),
                Attribute::computed("lastModifiedTime", AttributeType::String),
            ],
        )
    }

    async fn create(meta: &ClientConfig, config: DatasetConfig) -> Result<DatasetState> {
        tracing::info!("Creating BigQuery dataset {}:{}", meta.project, config.dataset_id);

        let request = config.to_request(&meta.project);
        let created = meta.bigquery.insert_dataset(&meta.project, &request).await?;
        let state = DatasetState::from_response(config, created, &meta.project);

        tracing::info!("Created BigQuery dataset {}", state.id);
        Ok(state)
    }

    async fn read(meta: &ClientConfig, state: DatasetState) -> Result<Option<DatasetState>> {
        match meta
            .bigquery
            .get_dataset(&meta.project, &state.config.dataset_id)
            .await
        {
            Ok(dataset) => Ok(Some(DatasetState::from_response(
                state.config,
                dataset,
                &meta.project,
            ))),
            Err(e) if e.is_not_found() => {
                tracing::warn!("Dataset {} no longer exists, removing from state", state.id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn delete(meta: &ClientConfig, state: DatasetState) -> Result<()> {
        if state.config.soft_delete {
            tracing::warn!(
                "softDelete is set: leaving dataset {} in place and only removing it from state",
                state.id
            );
            return Ok(());
        }

        tracing::info!("Deleting BigQuery dataset {}", state.id);
        meta.bigquery
            .delete_dataset(
                &meta.project,
                &state.config.dataset_id,
                state.config.delete_contents,
            )
            .await
    }
}
