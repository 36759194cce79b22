//! Schema declarations
//!
//! Declarative attribute definitions for the provider block and each resource
//! kind, and the decoding step that turns a raw JSON configuration into a
//! typed config struct. Every problem found while decoding is collected into
//! [`Diagnostics`]; typed access only happens once the configuration is clean.

use crate::validation::{Diagnostics, ValidateFn};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

/// Attribute value type
#[derive(Debug, Clone)]
pub enum AttributeType {
    String,
    Bool,
    Int,
    /// Ordered list of nested blocks
    ObjectList(Vec<Attribute>),
}

impl AttributeType {
    fn name(&self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Bool => "bool",
            AttributeType::Int => "number",
            AttributeType::ObjectList(_) => "list(object)",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            AttributeType::String => value.is_string(),
            AttributeType::Bool => value.is_boolean(),
            AttributeType::Int => value.is_i64() || value.is_u64(),
            AttributeType::ObjectList(_) => value.is_array(),
        }
    }
}

/// Whether an attribute is set by configuration, by the provider, or both
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
    Computed,
    OptionalComputed,
}

/// Single attribute declaration
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: &'static str,
    pub ty: AttributeType,
    pub presence: Presence,
    pub default: Option<Value>,
    /// Changing the value requires replacing the resource
    pub force_new: bool,
    pub sensitive: bool,
    pub deprecated: Option<&'static str>,
    pub conflicts_with: &'static [&'static str],
    /// Environment variable consulted when the value is not configured
    pub env_default: Option<&'static str>,
    pub description: &'static str,
    pub validate: Option<ValidateFn>,
}

impl Attribute {
    fn new(name: &'static str, ty: AttributeType, presence: Presence) -> Self {
        Self {
            name,
            ty,
            presence,
            default: None,
            force_new: false,
            sensitive: false,
            deprecated: None,
            conflicts_with: &[],
            env_default: None,
            description: "",
            validate: None,
        }
    }

    pub fn required(name: &'static str, ty: AttributeType) -> Self {
        Self::new(name, ty, Presence::Required)
    }

    pub fn optional(name: &'static str, ty: AttributeType) -> Self {
        Self::new(name, ty, Presence::Optional)
    }

    pub fn computed(name: &'static str, ty: AttributeType) -> Self {
        Self::new(name, ty, Presence::Computed)
    }

    pub fn optional_computed(name: &'static str, ty: AttributeType) -> Self {
        Self::new(name, ty, Presence::OptionalComputed)
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn deprecated(mut self, message: &'static str) -> Self {
        self.deprecated = Some(message);
        self
    }

    pub fn conflicts_with(mut self, names: &'static [&'static str]) -> Self {
        self.conflicts_with = names;
        self
    }

    pub fn env_default(mut self, var: &'static str) -> Self {
        self.env_default = Some(var);
        self
    }

    pub fn describe(mut self, text: &'static str) -> Self {
        self.description = text;
        self
    }

    pub fn validate_with(mut self, validate: ValidateFn) -> Self {
        self.validate = Some(validate);
        self
    }

    fn is_configurable(&self) -> bool {
        self.presence != Presence::Computed
    }

    /// JSON description used by the `schema` command
    pub fn to_json(&self) -> Value {
        let mut out = json!({
            "type": self.ty.name(),
            "required": self.presence == Presence::Required,
            "optional": matches!(self.presence, Presence::Optional | Presence::OptionalComputed),
            "computed": matches!(self.presence, Presence::Computed | Presence::OptionalComputed),
            "force_new": self.force_new,
            "sensitive": self.sensitive,
            "description": self.description,
        });

        if let Some(default) = &self.default {
            out["default"] = default.clone();
        }
        if let Some(var) = self.env_default {
            out["env_default"] = json!(var);
        }
        if let Some(message) = self.deprecated {
            out["deprecated"] = json!(message);
        }
        if !self.conflicts_with.is_empty() {
            out["conflicts_with"] = json!(self.conflicts_with);
        }
        if let AttributeType::ObjectList(nested) = &self.ty {
            out["block"] = attributes_to_json(nested);
        }

        out
    }
}

fn attributes_to_json(attributes: &[Attribute]) -> Value {
    let map: Map<String, Value> = attributes
        .iter()
        .map(|a| (a.name.to_string(), a.to_json()))
        .collect();
    Value::Object(map)
}

/// Successfully decoded configuration plus any warnings raised on the way
#[derive(Debug)]
pub struct Decoded<T> {
    pub config: T,
    pub warnings: Vec<String>,
}

/// Environment lookup used for attribute env defaults
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Lookup that never finds anything, for resources without env defaults
pub fn no_env(_: &str) -> Option<String> {
    None
}

/// Read a variable from the process environment, ignoring empty values
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Schema for the provider block or one resource kind
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub type_name: &'static str,
    pub description: &'static str,
    pub attributes: Vec<Attribute>,
}

impl ResourceSchema {
    pub fn new(type_name: &'static str, description: &'static str, attributes: Vec<Attribute>) -> Self {
        Self {
            type_name,
            description,
            attributes,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Check a raw configuration against the schema.
    ///
    /// Returns the configuration with env defaults and defaults filled in.
    pub fn check(&self, raw: &Value, env: EnvLookup<'_>) -> (Map<String, Value>, Diagnostics) {
        let mut diags = Diagnostics::new();

        let empty = Map::new();
        let object = match raw {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                diags.config_error(format!(
                    "{}: configuration must be an object, got {}",
                    self.type_name, other
                ));
                return (Map::new(), diags);
            }
        };

        let resolved = check_object(&self.attributes, object, "", env, &mut diags);
        (resolved, diags)
    }

    /// Check a raw configuration and deserialize it into `T`
    pub fn decode<T: DeserializeOwned>(
        &self,
        raw: &Value,
        env: EnvLookup<'_>,
    ) -> Result<Decoded<T>, Diagnostics> {
        let (resolved, mut diags) = self.check(raw, env);
        if diags.has_errors() {
            return Err(diags);
        }

        match serde_json::from_value(Value::Object(resolved)) {
            Ok(config) => Ok(Decoded {
                config,
                warnings: diags.warnings,
            }),
            Err(e) => {
                diags.config_error(format!("{}: {}", self.type_name, e));
                Err(diags)
            }
        }
    }

    /// Force-new attributes whose value differs between `prior` state and the
    /// `proposed` configuration.
    ///
    /// Optional+computed attributes left out of the configuration keep the
    /// provider's value and never trigger replacement.
    pub fn replacement_triggers(&self, prior: &Value, proposed: &Value) -> Vec<&'static str> {
        self.attributes
            .iter()
            .filter(|a| a.force_new && a.is_configurable())
            .filter(|a| {
                let before = prior.get(a.name).unwrap_or(&Value::Null);
                let after = proposed.get(a.name).unwrap_or(&Value::Null);
                if after.is_null() && a.presence == Presence::OptionalComputed {
                    return false;
                }
                before != after
            })
            .map(|a| a.name)
            .collect()
    }

    pub fn to_json(&self) -> Value {
        json!({
            "description": self.description,
            "attributes": attributes_to_json(&self.attributes),
        })
    }
}

fn attribute_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn check_object(
    attributes: &[Attribute],
    object: &Map<String, Value>,
    prefix: &str,
    env: EnvLookup<'_>,
    diags: &mut Diagnostics,
) -> Map<String, Value> {
    let mut resolved = Map::new();

    for key in object.keys() {
        if !attributes.iter().any(|a| a.name == key) {
            diags.config_error(format!(
                "unsupported argument \"{}\": an argument named \"{}\" is not expected here",
                attribute_path(prefix, key),
                key
            ));
        }
    }

    for attribute in attributes {
        let path = attribute_path(prefix, attribute.name);
        let configured = object.get(attribute.name).filter(|v| !v.is_null());

        if !attribute.is_configurable() {
            if configured.is_some() {
                diags.config_error(format!(
                    "\"{}\": cannot set a value for a computed attribute",
                    path
                ));
            }
            continue;
        }

        let value = configured
            .cloned()
            .or_else(|| attribute.env_default.and_then(|var| env(var)).map(Value::String))
            .or_else(|| attribute.default.clone());

        let Some(value) = value else {
            if attribute.presence == Presence::Required {
                diags.config_error(format!("the argument \"{}\" is required, but no definition was found", path));
            }
            continue;
        };

        if !attribute.ty.matches(&value) {
            diags.config_error(format!(
                "\"{}\": expected {}, got {}",
                path,
                attribute.ty.name(),
                value
            ));
            continue;
        }

        if let Some(message) = attribute.deprecated {
            diags.warn(format!("\"{}\" is deprecated: {}", path, message));
        }

        if let Some(validate) = attribute.validate {
            diags.extend(validate(&path, &value));
        }

        let value = match (&attribute.ty, value) {
            (AttributeType::ObjectList(nested), Value::Array(items)) => {
                let mut checked = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{}.{}", path, i);
                    match item {
                        Value::Object(block) => {
                            checked.push(Value::Object(check_object(nested, block, &item_path, env, diags)));
                        }
                        other => diags.config_error(format!(
                            "\"{}\": expected an object, got {}",
                            item_path, other
                        )),
                    }
                }
                Value::Array(checked)
            }
            (_, value) => value,
        };

        resolved.insert(attribute.name.to_string(), value);
    }

    // Empty lists count as unset
    let is_set = |name: &str| {
        object
            .get(name)
            .is_some_and(|v| !v.is_null() && v.as_array().map_or(true, |items| !items.is_empty()))
    };

    for attribute in attributes {
        if !resolved.contains_key(attribute.name) || !is_set(attribute.name) {
            continue;
        }
        for other in attribute.conflicts_with {
            if is_set(*other) {
                diags.config_error(format!(
                    "\"{}\": conflicts with {}",
                    attribute_path(prefix, attribute.name),
                    attribute_path(prefix, other)
                ));
            }
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        name: String,
        #[serde(default)]
        enabled: bool,
        #[serde(default)]
        items: Vec<Item>,
    }

    #[derive(Debug, Deserialize)]
    struct Item {
        key: String,
    }

    fn schema() -> ResourceSchema {
        ResourceSchema::new(
            "sample",
            "test schema",
            vec![
                Attribute::required("name", AttributeType::String).force_new(),
                Attribute::optional("enabled", AttributeType::Bool).with_default(json!(true)),
                Attribute::optional("token", AttributeType::String)
                    .env_default("SAMPLE_TOKEN")
                    .conflicts_with(&["password"]),
                Attribute::optional("password", AttributeType::String),
                Attribute::optional_computed(
                    "items",
                    AttributeType::ObjectList(vec![Attribute::required("key", AttributeType::String)]),
                )
                .force_new(),
                Attribute::computed("id", AttributeType::String),
            ],
        )
    }

    #[test]
    fn test_decode_applies_defaults() {
        let decoded: Decoded<Sample> = schema().decode(&json!({"name": "a"}), &no_env).unwrap();
        assert_eq!(decoded.config.name, "a");
        assert!(decoded.config.enabled);
        assert!(decoded.config.items.is_empty());
    }

    #[test]
    fn test_decode_collects_all_errors() {
        let diags = schema()
            .decode::<Sample>(&json!({"enabled": "yes", "bogus": 1, "id": "x"}), &no_env)
            .unwrap_err();
        // missing name, wrong type, unknown argument, computed attribute set
        assert_eq!(diags.errors.len(), 4, "{}", diags);
    }

    #[test]
    fn test_nested_errors_name_the_path() {
        let diags = schema()
            .decode::<Sample>(&json!({"name": "a", "items": [{"key": "k"}, {}]}), &no_env)
            .unwrap_err();
        assert!(diags.to_string().contains("items.1.key"), "{}", diags);
    }

    #[test]
    fn test_env_default_used_when_unset() {
        let env = |key: &str| (key == "SAMPLE_TOKEN").then(|| "from-env".to_string());
        let (resolved, diags) = schema().check(&json!({"name": "a"}), &env);
        assert!(!diags.has_errors());
        assert_eq!(resolved["token"], "from-env");
    }

    #[test]
    fn test_env_default_does_not_conflict() {
        let env = |key: &str| (key == "SAMPLE_TOKEN").then(|| "from-env".to_string());
        let (_, diags) = schema().check(&json!({"name": "a", "password": "p"}), &env);
        assert!(!diags.has_errors(), "{}", diags);
    }

    #[test]
    fn test_conflicting_arguments() {
        let (_, diags) = schema().check(&json!({"name": "a", "token": "t", "password": "p"}), &no_env);
        assert!(diags.to_string().contains("conflicts with password"));
    }

    #[test]
    fn test_empty_list_is_not_a_conflict() {
        let schema = ResourceSchema::new(
            "sample",
            "list conflicts",
            vec![
                Attribute::optional(
                    "items",
                    AttributeType::ObjectList(vec![Attribute::required("key", AttributeType::String)]),
                )
                .conflicts_with(&["path"]),
                Attribute::optional("path", AttributeType::String),
            ],
        );

        let (_, diags) = schema.check(&json!({"items": [], "path": "p"}), &no_env);
        assert!(!diags.has_errors(), "{}", diags);

        let (_, diags) = schema.check(&json!({"items": [{"key": "k"}], "path": "p"}), &no_env);
        assert!(diags.to_string().contains("items\": conflicts with path"), "{}", diags);
    }

    #[test]
    fn test_replacement_triggers() {
        let schema = schema();
        let prior = json!({"name": "a", "items": [{"key": "k"}], "id": "1"});

        assert!(schema.replacement_triggers(&prior, &json!({"name": "a"})).is_empty());
        assert_eq!(schema.replacement_triggers(&prior, &json!({"name": "b"})), vec!["name"]);
        assert_eq!(
            schema.replacement_triggers(&prior, &json!({"name": "a", "items": []})),
            vec!["items"]
        );
    }
}
