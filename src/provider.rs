//! Provider facade
//!
//! The surface a host orchestration framework binds to: schema export,
//! offline validation, configuration, and CRUD dispatch by resource type
//! name over JSON values.

use crate::config::{provider_schema, ClientConfig, ProviderConfig};
use crate::error::{ProviderError, Result};
use crate::resource::dataset::DatasetResource;
use crate::resource::schema::{no_env, EnvLookup};
use crate::resource::table::TableResource;
use crate::resource::{get_registry, get_resource_schema, Resource, DATASET, TABLE};
use crate::validation::Diagnostics;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Unconfigured provider: schemas and validation only
#[derive(Debug, Clone, Copy, Default)]
pub struct Provider;

impl Provider {
    pub fn new() -> Self {
        Self
    }

    /// Provider and resource schemas as JSON
    pub fn schema(&self) -> Value {
        let resources: Map<String, Value> = get_registry()
            .iter()
            .map(|(name, schema)| (name.to_string(), schema.to_json()))
            .collect();

        json!({
            "provider": provider_schema().to_json(),
            "resources": resources,
        })
    }

    pub fn validate_provider_config(&self, raw: &Value, env: EnvLookup<'_>) -> Diagnostics {
        match ProviderConfig::decode(raw, env) {
            Ok(decoded) => {
                let mut diags = Diagnostics::new();
                for warning in decoded.warnings {
                    diags.warn(warning);
                }
                diags
            }
            Err(diags) => diags,
        }
    }

    pub fn validate_resource_config(&self, type_name: &str, raw: &Value) -> Diagnostics {
        match type_name {
            DATASET => validate_typed::<DatasetResource>(raw),
            TABLE => validate_typed::<TableResource>(raw),
            other => Diagnostics::with_error(ProviderError::UnknownResource(other.to_string())),
        }
    }

    /// Decode the provider block, authenticate and build the client handle
    pub async fn configure(
        &self,
        raw: &Value,
        host_version: &str,
        env: EnvLookup<'_>,
    ) -> Result<ConfiguredProvider> {
        let decoded = ProviderConfig::decode(raw, env)
            .map_err(|diags| diags.into_error().unwrap_or_else(|| ProviderError::config("invalid provider configuration")))?;

        for warning in &decoded.warnings {
            tracing::warn!("{}", warning);
        }

        let meta = decoded.config.load_and_validate(host_version).await?;
        Ok(ConfiguredProvider::new(meta))
    }
}

/// Configured provider handing the shared client to every handler call
#[derive(Debug, Clone)]
pub struct ConfiguredProvider {
    meta: Arc<ClientConfig>,
}

impl ConfiguredProvider {
    pub fn new(meta: ClientConfig) -> Self {
        Self {
            meta: Arc::new(meta),
        }
    }

    pub fn meta(&self) -> &ClientConfig {
        &self.meta
    }

    pub async fn create(&self, type_name: &str, planned: &Value) -> Result<Value> {
        match type_name {
            DATASET => create_typed::<DatasetResource>(&self.meta, planned).await,
            TABLE => create_typed::<TableResource>(&self.meta, planned).await,
            other => Err(ProviderError::UnknownResource(other.to_string())),
        }
    }

    /// Refresh a resource; `None` tells the host to drop it from state
    pub async fn read(&self, type_name: &str, state: &Value) -> Result<Option<Value>> {
        match type_name {
            DATASET => read_typed::<DatasetResource>(&self.meta, state).await,
            TABLE => read_typed::<TableResource>(&self.meta, state).await,
            other => Err(ProviderError::UnknownResource(other.to_string())),
        }
    }

    pub async fn update(&self, type_name: &str, prior: &Value, planned: &Value) -> Result<Value> {
        match type_name {
            DATASET => update_typed::<DatasetResource>(&self.meta, prior, planned).await,
            TABLE => update_typed::<TableResource>(&self.meta, prior, planned).await,
            other => Err(ProviderError::UnknownResource(other.to_string())),
        }
    }

    pub async fn delete(&self, type_name: &str, state: &Value) -> Result<()> {
        match type_name {
            DATASET => delete_typed::<DatasetResource>(&self.meta, state).await,
            TABLE => delete_typed::<TableResource>(&self.meta, state).await,
            other => Err(ProviderError::UnknownResource(other.to_string())),
        }
    }
}

/// Configured attributes whose change between `prior` state and `config`
/// forces the resource to be replaced
pub fn replacement_triggers(type_name: &str, prior: &Value, config: &Value) -> Result<Vec<&'static str>> {
    let schema = get_resource_schema(type_name)
        .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))?;

    // Both sides go through the typed forms so equivalent spellings compare equal
    let (prior, proposed) = match type_name {
        DATASET => normalize::<DatasetResource>(prior, config)?,
        TABLE => normalize::<TableResource>(prior, config)?,
        other => return Err(ProviderError::UnknownResource(other.to_string())),
    };

    Ok(schema.replacement_triggers(&prior, &proposed))
}

fn normalize<R: Resource>(prior: &Value, config: &Value) -> Result<(Value, Value)> {
    let prior = encode_state::<R>(&decode_state::<R>(prior)?)?;
    let proposed = serde_json::to_value(decode_config::<R>(config)?)
        .map_err(|e| ProviderError::config(format!("{}: {}", R::TYPE_NAME, e)))?;
    Ok((prior, proposed))
}

fn validate_typed<R: Resource>(raw: &Value) -> Diagnostics {
    match R::schema().decode::<R::Config>(raw, &no_env) {
        Ok(decoded) => {
            let mut diags = R::validate(&decoded.config);
            for warning in decoded.warnings {
                diags.warn(warning);
            }
            diags
        }
        Err(diags) => diags,
    }
}

fn decode_config<R: Resource>(raw: &Value) -> Result<R::Config> {
    let decoded = R::schema().decode::<R::Config>(raw, &no_env).map_err(|diags| {
        diags
            .into_error()
            .unwrap_or_else(|| ProviderError::config(format!("invalid {} configuration", R::TYPE_NAME)))
    })?;

    if let Some(err) = R::validate(&decoded.config).into_error() {
        return Err(err);
    }

    Ok(decoded.config)
}

fn decode_state<R: Resource>(raw: &Value) -> Result<R::State> {
    serde_json::from_value(raw.clone())
        .map_err(|e| ProviderError::config(format!("invalid {} state: {}", R::TYPE_NAME, e)))
}

fn encode_state<R: Resource>(state: &R::State) -> Result<Value> {
    serde_json::to_value(state)
        .map_err(|e| ProviderError::config(format!("failed to encode {} state: {}", R::TYPE_NAME, e)))
}

async fn create_typed<R: Resource>(meta: &ClientConfig, planned: &Value) -> Result<Value> {
    let config = decode_config::<R>(planned)?;
    let state = R::create(meta, config).await?;
    encode_state::<R>(&state)
}

async fn read_typed<R: Resource>(meta: &ClientConfig, state: &Value) -> Result<Option<Value>> {
    let state = decode_state::<R>(state)?;
    match R::read(meta, state).await? {
        Some(refreshed) => encode_state::<R>(&refreshed).map(Some),
        None => Ok(None),
    }
}

async fn update_typed<R: Resource>(meta: &ClientConfig, prior: &Value, planned: &Value) -> Result<Value> {
    let prior = decode_state::<R>(prior)?;
    let config = decode_config::<R>(planned)?;
    let state = R::update(meta, prior, config).await?;
    encode_state::<R>(&state)
}

async fn delete_typed<R: Resource>(meta: &ClientConfig, state: &Value) -> Result<()> {
    let state = decode_state::<R>(state)?;
    R::delete(meta, state).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_lists_everything() {
        let schema = Provider::new().schema();
        assert!(schema["provider"]["attributes"]["project"]["required"]
            .as_bool()
            .unwrap());
        assert!(schema["resources"][DATASET]["attributes"]["datasetId"].is_object());
        assert!(schema["resources"][TABLE]["attributes"]["schema"]["block"]["name"].is_object());
    }

    #[test]
    fn test_unknown_resource_type() {
        let diags = Provider::new().validate_resource_config("googlebigquery_view", &json!({}));
        assert!(matches!(diags.errors[0], ProviderError::UnknownResource(_)));
    }

    #[test]
    fn test_table_without_schema_source_fails_validation() {
        let diags = Provider::new()
            .validate_resource_config(TABLE, &json!({"tableId": "t", "datasetId": "d"}));
        assert!(diags.to_string().contains("one of schema or schemaFile"));
    }

    #[test]
    fn test_replacement_ignores_case_only_type_differences() {
        let prior = json!({
            "id": "p:d.t",
            "tableId": "t",
            "datasetId": "d",
            "schema": [{"name": "foo", "type": "STRING"}]
        });
        let config = json!({
            "tableId": "t",
            "datasetId": "d",
            "schema": [{"name": "foo", "type": "string"}]
        });
        assert!(replacement_triggers(TABLE, &prior, &config).unwrap().is_empty());

        let renamed = json!({
            "tableId": "t2",
            "datasetId": "d",
            "schema": [{"name": "foo", "type": "string"}]
        });
        assert_eq!(replacement_triggers(TABLE, &prior, &renamed).unwrap(), vec!["tableId"]);
    }

    #[test]
    fn test_reported_type_aliases_do_not_force_replacement() {
        use crate::gcp::bigquery::{Table, TableFieldSchema, TableSchema};
        use crate::resource::table::{TableConfig, TableState};

        let field = |name: &str, field_type: &str| TableFieldSchema {
            name: name.to_string(),
            field_type: field_type.to_string(),
            mode: Some("NULLABLE".to_string()),
            description: None,
        };
        let reported = Table {
            schema: Some(TableSchema {
                fields: vec![field("foo", "INTEGER"), field("bar", "STRING")],
            }),
            ..Default::default()
        };
        let state = TableState::from_response(TableConfig::new("d", "t"), reported, "p");
        let prior = serde_json::to_value(&state).unwrap();

        let config = json!({
            "tableId": "t",
            "datasetId": "d",
            "schema": [{"name": "foo", "type": "int64"}, {"name": "bar", "type": "string"}]
        });
        assert!(replacement_triggers(TABLE, &prior, &config).unwrap().is_empty());

        let retyped = json!({
            "tableId": "t",
            "datasetId": "d",
            "schema": [{"name": "foo", "type": "string"}, {"name": "bar", "type": "string"}]
        });
        assert_eq!(replacement_triggers(TABLE, &prior, &retyped).unwrap(), vec!["schema"]);
    }

    #[test]
    fn test_dataset_soft_delete_change_forces_replacement() {
        let prior = json!({"id": "p:d", "datasetId": "d", "softDelete": false, "deleteContents": false});
        let config = json!({"datasetId": "d", "softDelete": true});
        assert_eq!(replacement_triggers(DATASET, &prior, &config).unwrap(), vec!["softDelete"]);
    }
}
