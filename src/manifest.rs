//! Manifest runner
//!
//! A minimal stand-in host: reads a manifest declaring the provider block and
//! resources, creates what is not yet tracked, refreshes tracked resources and
//! destroys them in reverse order. It does not plan or diff; a changed
//! force-new attribute is reported and the resource must be destroyed first.

use crate::error::{ProviderError, Result};
use crate::provider::{replacement_triggers, ConfiguredProvider, Provider};
use crate::resource::schema::EnvLookup;
use crate::resource::{DATASET, TABLE};
use crate::validation::Diagnostics;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

/// Current state file format version
pub const STATE_VERSION: u32 = 1;

/// One `resources:` entry
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResourceBlock {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub config: Value,
}

impl ResourceBlock {
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }
}

/// Manifest file contents
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Manifest {
    #[serde(default)]
    pub provider: Value,
    #[serde(default)]
    pub resources: Vec<ResourceBlock>,
}

impl Manifest {
    /// Parse a YAML (or JSON) manifest
    pub fn parse(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| ProviderError::config(format!("invalid manifest: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::config(format!("Error reading manifest '{}': {}", path.display(), e))
        })?;
        Self::parse(&contents)
    }

    /// Run every offline check: provider block, each resource, unique
    /// addresses, and tables referencing declared datasets
    pub fn validate(&self, provider: &Provider, env: EnvLookup<'_>) -> Diagnostics {
        let mut diags = provider.validate_provider_config(&self.provider, env);

        let mut addresses = HashSet::new();
        for block in &self.resources {
            let address = block.address();
            if !addresses.insert(address.clone()) {
                diags.config_error(format!("duplicate resource {}", address));
            }
            diags.extend(
                provider
                    .validate_resource_config(&block.resource_type, &block.config)
                    .prefixed(&address),
            );
        }

        let datasets: HashSet<&str> = self
            .resources
            .iter()
            .filter(|b| b.resource_type == DATASET)
            .filter_map(|b| b.config.get("datasetId").and_then(Value::as_str))
            .collect();

        for block in self.resources.iter().filter(|b| b.resource_type == TABLE) {
            if let Some(dataset_id) = block.config.get("datasetId").and_then(Value::as_str) {
                if !datasets.contains(dataset_id) {
                    diags.config_error(format!(
                        "{}: datasetId \"{}\" does not match any {} in this manifest",
                        block.address(),
                        dataset_id,
                        DATASET
                    ));
                }
            }
        }

        diags
    }

    /// Resources in creation order: datasets before tables, otherwise as
    /// declared
    pub fn apply_order(&self) -> Vec<&ResourceBlock> {
        let mut ordered: Vec<&ResourceBlock> = self.resources.iter().collect();
        ordered.sort_by_key(|b| b.resource_type != DATASET);
        ordered
    }
}

/// A resource tracked in the state file
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TrackedResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    pub state: Value,
}

impl TrackedResource {
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }
}

/// State file contents, in creation order
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StateFile {
    pub version: u32,
    #[serde(default)]
    pub resources: Vec<TrackedResource>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            resources: Vec::new(),
        }
    }
}

impl StateFile {
    /// Load a state file; a missing file is an empty state
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::config(format!("Error reading state '{}': {}", path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            ProviderError::config(format!("invalid state file '{}': {}", path.display(), e))
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ProviderError::config(format!("failed to encode state: {}", e)))?;
        std::fs::write(path, contents).map_err(|e| {
            ProviderError::config(format!("Error writing state '{}': {}", path.display(), e))
        })
    }

    pub fn find(&self, address: &str) -> Option<&TrackedResource> {
        self.resources.iter().find(|r| r.address() == address)
    }
}

/// Create every manifest resource that is not tracked yet.
///
/// Resources are created one at a time; the state is updated after each
/// success so a failure leaves it describing what exists.
pub async fn apply(provider: &ConfiguredProvider, manifest: &Manifest, state: &mut StateFile) -> Result<()> {
    for block in manifest.apply_order() {
        let address = block.address();

        if let Some(tracked) = state.find(&address) {
            let changed = replacement_triggers(&block.resource_type, &tracked.state, &block.config)?;
            if !changed.is_empty() {
                return Err(ProviderError::UpdateUnsupported {
                    resource_type: format!("{} (changed: {})", address, changed.join(", ")),
                });
            }
            tracing::info!("{} is up to date", address);
            continue;
        }

        tracing::info!("{}: creating...", address);
        let created = provider.create(&block.resource_type, &block.config).await?;
        state.resources.push(TrackedResource {
            resource_type: block.resource_type.clone(),
            name: block.name.clone(),
            state: created,
        });
        tracing::info!("{}: creation complete", address);
    }

    Ok(())
}

/// Refresh every tracked resource, dropping those that no longer exist
pub async fn refresh(provider: &ConfiguredProvider, state: &mut StateFile) -> Result<()> {
    let mut refreshed = Vec::with_capacity(state.resources.len());

    for tracked in &state.resources {
        match provider.read(&tracked.resource_type, &tracked.state).await? {
            Some(current) => refreshed.push(TrackedResource {
                state: current,
                ..tracked.clone()
            }),
            None => tracing::info!("{} was removed outside of this provider", tracked.address()),
        }
    }

    state.resources = refreshed;
    Ok(())
}

/// Delete tracked resources in reverse creation order
pub async fn destroy(provider: &ConfiguredProvider, state: &mut StateFile) -> Result<()> {
    while let Some(tracked) = state.resources.last() {
        tracing::info!("{}: destroying...", tracked.address());
        provider.delete(&tracked.resource_type, &tracked.state).await?;
        state.resources.pop();
    }

    Ok(())
}
