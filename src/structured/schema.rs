//! Response schemas derived from artifact types.

use super::extract::extract_json;
use crate::error::GenerationFailure;
use crate::{Error, ErrorContext, Result};
use jsonschema::{Draft, JSONSchema};
use serde::de::DeserializeOwned;
use serde_json::json;

pub fn json_schema_from_type<T: schemars::JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(&schema).unwrap_or_else(|_| json!({}))
}

/// Compiled JSON schema an artifact must satisfy before it is deserialized.
pub struct ResponseSchema {
    name: String,
    schema: serde_json::Value,
    compiled: JSONSchema,
}

impl ResponseSchema {
    /// Schema of `T` as generated by `schemars`.
    pub fn for_type<T: schemars::JsonSchema>() -> Result<Self> {
        Self::from_value(T::schema_name(), json_schema_from_type::<T>())
    }

    pub fn from_value(name: impl Into<String>, schema: serde_json::Value) -> Result<Self> {
        let name = name.into();
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema)
            .map_err(|e| {
                Error::configuration_with_context(
                    format!("failed to compile response schema: {}", e),
                    ErrorContext::new()
                        .with_field_path(name.clone())
                        .with_source("response_schema"),
                )
            })?;
        Ok(Self {
            name,
            schema,
            compiled,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.schema
    }

    /// Pretty-printed schema, for embedding into prompts.
    pub fn to_pretty_string(&self) -> String {
        serde_json::to_string_pretty(&self.schema).unwrap_or_default()
    }

    pub fn validate(&self, value: &serde_json::Value) -> std::result::Result<(), Vec<String>> {
        self.compiled.validate(value).map_err(|errors| {
            errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{}: {}", path, e)
                    }
                })
                .collect()
        })
    }

    pub fn is_valid(&self, value: &serde_json::Value) -> bool {
        self.compiled.is_valid(value)
    }
}

impl std::fmt::Debug for ResponseSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseSchema").field("name", &self.name).finish()
    }
}

/// Extract, validate and deserialize a model response.
pub fn parse_artifact<T: DeserializeOwned>(
    text: &str,
    schema: &ResponseSchema,
) -> std::result::Result<T, GenerationFailure> {
    let value = extract_json(text)
        .ok_or_else(|| GenerationFailure::Malformed("no JSON document in response".to_string()))?;
    schema
        .validate(&value)
        .map_err(GenerationFailure::SchemaMismatch)?;
    serde_json::from_value(value).map_err(|e| GenerationFailure::Malformed(e.to_string()))
}
