//! `googlebigquery_table`
//!
//! Tables take their columns either from inline `schema` blocks or from a
//! `schemaFile` holding a JSON array of the same shape. Exactly one source
//! must be configured.

use super::schema::{Attribute, AttributeType, ResourceSchema};
use super::{Resource, TABLE};
use crate::config::ClientConfig;
use crate::error::{ProviderError, Result};
use crate::gcp::auth::expand_home;
use crate::gcp::bigquery::{epoch_millis_to_rfc3339, Table, TableFieldSchema, TableReference, TableSchema};
use crate::validation::{
    check_field_mode, check_field_name, check_field_type, validate_field_mode, validate_field_name,
    validate_field_type, validate_resource_id, Diagnostics,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

/// Mode BigQuery assumes when none is given
pub const DEFAULT_FIELD_MODE: &str = "NULLABLE";

/// Upper-case a column type and fold standard SQL aliases onto the legacy
/// names BigQuery reports back (`INT64` is stored as `INTEGER`, and so on)
pub fn canonical_field_type(value: &str) -> String {
    let upper = value.to_ascii_uppercase();
    match upper.as_str() {
        "INT64" => "INTEGER".to_string(),
        "FLOAT64" => "FLOAT".to_string(),
        "BOOL" => "BOOLEAN".to_string(),
        "STRUCT" => "RECORD".to_string(),
        _ => upper,
    }
}

fn canonical_mode(mode: Option<&str>) -> String {
    mode.filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_FIELD_MODE)
        .to_ascii_uppercase()
}

fn default_mode() -> String {
    DEFAULT_FIELD_MODE.to_string()
}

fn deserialize_type<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    String::deserialize(deserializer).map(|s| canonical_field_type(&s))
}

fn deserialize_mode<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Option::<String>::deserialize(deserializer).map(|m| canonical_mode(m.as_deref()))
}

/// One column of a table schema.
///
/// `type` and `mode` are held in the form BigQuery reports them: upper-case,
/// aliases folded, and a missing mode read as `NULLABLE`. Configured and
/// remote schemas therefore compare equal when BigQuery would treat them as
/// the same.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type", deserialize_with = "deserialize_type")]
    pub field_type: String,
    #[serde(default = "default_mode", deserialize_with = "deserialize_mode")]
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: canonical_field_type(&field_type.into()),
            mode: default_mode(),
            description: None,
        }
    }

    pub fn with_mode(mut self, mode: &str) -> Self {
        self.mode = canonical_mode(Some(mode));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn to_api(&self) -> TableFieldSchema {
        TableFieldSchema {
            name: self.name.clone(),
            field_type: self.field_type.clone(),
            mode: Some(self.mode.clone()),
            description: self.description.clone(),
        }
    }
}

impl From<TableFieldSchema> for SchemaField {
    fn from(field: TableFieldSchema) -> Self {
        Self {
            name: field.name,
            field_type: canonical_field_type(&field.field_type),
            mode: canonical_mode(field.mode.as_deref()),
            description: field.description,
        }
    }
}

/// Check a resolved field list: valid names, types, modes and no duplicates
pub fn validate_schema_fields(fields: &[SchemaField]) -> Diagnostics {
    let mut diags = Diagnostics::new();
    let mut seen = HashSet::new();

    for (i, field) in fields.iter().enumerate() {
        let checks = [
            ("name", check_field_name(&field.name)),
            ("type", check_field_type(&field.field_type)),
            ("mode", check_field_mode(&field.mode)),
        ];
        for (attribute, check) in checks {
            if let Err(reason) = check {
                diags.config_error(format!("invalid value for \"schema.{}.{}\": {}", i, attribute, reason));
            }
        }

        if !seen.insert(field.name.to_ascii_lowercase()) {
            diags.config_error(format!("duplicate schema field \"{}\"", field.name));
        }
    }

    diags
}

/// Load schema fields from a JSON file
pub fn load_schema_file(path: &str) -> Result<Vec<SchemaField>> {
    let contents = std::fs::read_to_string(expand_home(path))
        .map_err(|e| ProviderError::config(format!("Error reading schemaFile '{}': {}", path, e)))?;

    serde_json::from_str(&contents).map_err(|e| {
        ProviderError::config(format!(
            "schemaFile '{}' is not a JSON array of schema fields: {}",
            path, e
        ))
    })
}

/// Configured table attributes
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    pub table_id: String,
    pub dataset_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schema: Vec<SchemaField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TableConfig {
    pub fn new(dataset_id: impl Into<String>, table_id: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            dataset_id: dataset_id.into(),
            schema: Vec::new(),
            schema_file: None,
            friendly_name: None,
            description: None,
        }
    }

    /// Resolve the field list from whichever source is configured
    pub fn resolve_schema(&self) -> Result<Vec<SchemaField>> {
        let fields = match (self.schema.is_empty(), &self.schema_file) {
            (false, Some(_)) => {
                return Err(ProviderError::config(
                    "schema and schemaFile are mutually exclusive; set only one",
                ))
            }
            (true, None) => {
                return Err(ProviderError::config(
                    "one of schema or schemaFile must be set",
                ))
            }
            (false, None) => self.schema.clone(),
            (true, Some(path)) => load_schema_file(path)?,
        };

        if let Some(err) = validate_schema_fields(&fields).into_error() {
            return Err(err);
        }

        Ok(fields)
    }

    /// Insert request body
    pub fn to_request(&self, project: &str, fields: &[SchemaField]) -> Table {
        Table {
            table_reference: TableReference {
                project_id: project.to_string(),
                dataset_id: self.dataset_id.clone(),
                table_id: self.table_id.clone(),
            },
            friendly_name: self.friendly_name.clone(),
            description: self.description.clone(),
            schema: Some(TableSchema {
                fields: fields.iter().map(SchemaField::to_api).collect(),
            }),
            ..Default::default()
        }
    }
}

/// Table as tracked in state; `schema` holds the fields BigQuery reports
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableState {
    /// `project:dataset.table`, as reported by the API
    pub id: String,
    #[serde(flatten)]
    pub config: TableConfig,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub self_link: Option<String>,
    #[serde(default)]
    pub creation_time: Option<String>,
    #[serde(default)]
    pub last_modified_time: Option<String>,
    #[serde(default)]
    pub num_rows: Option<u64>,
}

impl TableState {
    pub fn from_response(mut config: TableConfig, table: Table, project: &str) -> Self {
        let id = table.id.unwrap_or_else(|| {
            format!("{}:{}.{}", project, config.dataset_id, config.table_id)
        });

        if let Some(schema) = table.schema {
            config.schema = schema.fields.into_iter().map(SchemaField::from).collect();
        }
        config.friendly_name = table.friendly_name;
        config.description = table.description;

        Self {
            id,
            config,
            etag: table.etag,
            self_link: table.self_link,
            creation_time: epoch_millis_to_rfc3339(table.creation_time.as_deref()),
            last_modified_time: epoch_millis_to_rfc3339(table.last_modified_time.as_deref()),
            num_rows: table.num_rows.and_then(|n| n.parse().ok()),
        }
    }
}

pub struct TableResource;

impl Resource for TableResource {
    const TYPE_NAME: &'static str = TABLE;
    type Config = TableConfig;
    type State = TableState;

    fn schema() -> ResourceSchema {
        ResourceSchema::new(
            TABLE,
            "A BigQuery table",
            vec![
                Attribute::required("tableId", AttributeType::String)
                    .force_new()
                    .describe("Table id, unique within the dataset")
                    .validate_with(validate_resource_id),
                Attribute::required("datasetId", AttributeType::String)
                    .force_new()
                    .describe("Dataset that contains the table")
                    .validate_with(validate_resource_id),
                Attribute::optional_computed(
                    "schema",
                    AttributeType::ObjectList(vec![
                        Attribute::required("name", AttributeType::String)
                            .validate_with(validate_field_name),
                        Attribute::required("type", AttributeType::String)
                            .validate_with(validate_field_type),
                        Attribute::optional("mode", AttributeType::String)
                            .validate_with(validate_field_mode),
                        Attribute::optional("description", AttributeType::String),
                    ]),
                )
                .force_new()
                .conflicts_with(&["schemaFile"])
                .describe("Ordered column definitions"),
                Attribute::optional("schemaFile", AttributeType::String)
                    .force_new()
                    .describe("Path to a JSON array of column definitions"),
                Attribute::optional("friendlyName", AttributeType::String)
                    .force_new()
                    .describe("Descriptive name"),
                Attribute::optional("description", AttributeType::String)
                    .force_new()
                    .describe("User-friendly description"),
                Attribute::computed("id", AttributeType::String),
                Attribute::computed("etag", AttributeType::String),
                Attribute::computed("selfLink", AttributeType::String),
                Attribute::computed("creationTime", AttributeType::String),
                Attribute::computed("lastModifiedTime", AttributeType::String),
                Attribute::computed("numRows", AttributeType::Int),
            ],
        )
    }

    fn validate(config: &TableConfig) -> Diagnostics {
        match config.resolve_schema() {
            Ok(_) => Diagnostics::new(),
            Err(e) => Diagnostics::with_error(e),
        }
    }

    async fn create(meta: &ClientConfig, config: TableConfig) -> Result<TableState> {
        let fields = config.resolve_schema()?;
        tracing::info!(
            "Creating BigQuery table {}:{}.{} with {} fields",
            meta.project,
            config.dataset_id,
            config.table_id,
            fields.len()
        );

        let request = config.to_request(&meta.project, &fields);
        let created = meta
            .bigquery
            .insert_table(&meta.project, &config.dataset_id, &request)
            .await?;
        let state = TableState::from_response(config, created, &meta.project);

        tracing::info!("Created BigQuery table {}", state.id);
        Ok(state)
    }

    async fn read(meta: &ClientConfig, state: TableState) -> Result<Option<TableState>> {
        let result = meta
            .bigquery
            .get_table(&meta.project, &state.config.dataset_id, &state.config.table_id)
            .await;

        match result {
            Ok(table) => Ok(Some(TableState::from_response(state.config, table, &meta.project))),
            Err(e) if e.is_not_found() => {
                tracing::warn!("Table {} no longer exists, removing from state", state.id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn delete(meta: &ClientConfig, state: TableState) -> Result<()> {
        tracing::info!("Deleting BigQuery table {}", state.id);
        meta.bigquery
            .delete_table(&meta.project, &state.config.dataset_id, &state.config.table_id)
            .await
    }
}
