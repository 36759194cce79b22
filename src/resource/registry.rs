//! Resource Registry
//!
//! Builds the schema of every resource kind once and provides lookup
//! functions for the rest of the provider.

use super::dataset::DatasetResource;
use super::schema::ResourceSchema;
use super::table::TableResource;
use super::Resource;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Global registry of resource schemas, keyed by type name
static REGISTRY: OnceLock<BTreeMap<&'static str, ResourceSchema>> = OnceLock::new();

/// Get the resource registry (built on first access)
pub fn get_registry() -> &'static BTreeMap<&'static str, ResourceSchema> {
    REGISTRY.get_or_init(|| {
        let mut registry = BTreeMap::new();
        registry.insert(DatasetResource::TYPE_NAME, DatasetResource::schema());
        registry.insert(TableResource::TYPE_NAME, TableResource::schema());
        registry
    })
}

/// Get a resource schema by type name
pub fn get_resource_schema(type_name: &str) -> Option<&'static ResourceSchema> {
    get_registry().get(type_name)
}

/// Get all resource type names
pub fn resource_types() -> Vec<&'static str> {
    get_registry().keys().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{DATASET, TABLE};

    #[test]
    fn test_registry_contains_both_kinds() {
        assert_eq!(resource_types(), vec![DATASET, TABLE]);
    }

    #[test]
    fn test_dataset_schema_exists() {
        let schema = get_resource_schema(DATASET).expect("dataset schema should exist");
        assert!(schema.attribute("datasetId").is_some());
        assert!(schema.attribute("softDelete").is_some());
    }

    #[test]
    fn test_unknown_type() {
        assert!(get_resource_schema("googlebigquery_view").is_none());
    }

    #[test]
    fn test_every_configurable_attribute_forces_replacement() {
        for schema in get_registry().values() {
            for attribute in &schema.attributes {
                if attribute.presence != crate::resource::schema::Presence::Computed {
                    assert!(
                        attribute.force_new,
                        "{}.{} should force replacement",
                        schema.type_name,
                        attribute.name
                    );
                }
            }
        }
    }
}
