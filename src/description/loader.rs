//! API description loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::description::model::ApiDescription;

/// Errors that can occur while loading an API description.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Mapping key that cannot be represented as a string.
    #[error("unsupported mapping key: {0}")]
    UnsupportedKey(String),

    #[error("remote reference not supported: {0}")]
    RemoteRef(String),

    #[error("unresolved reference: {0}")]
    UnresolvedRef(String),

    #[error("malformed description: {0}")]
    Shape(String),
}

/// Source syntax of a description document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionFormat {
    Yaml,
    Json,
}

impl DescriptionFormat {
    /// `.json` files are parsed as JSON, everything else as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DescriptionFormat::Json,
            _ => DescriptionFormat::Yaml,
        }
    }
}

/// Load, dereference and type an API description file.
pub fn load_description(path: &Path) -> Result<ApiDescription, LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let description = parse_description(&text, DescriptionFormat::from_path(path))?;

    tracing::info!(
        path = %path.display(),
        paths = description.paths.len(),
        "API description loaded"
    );
    Ok(description)
}

/// Parse and dereference a description held in memory.
pub fn parse_description(text: &str, format: DescriptionFormat) -> Result<ApiDescription, LoadError> {
    let raw = match format {
        DescriptionFormat::Json => serde_json::from_str(text)?,
        DescriptionFormat::Yaml => yaml_to_json(serde_yaml::from_str(text)?)?,
    };

    if !raw.is_object() {
        return Err(LoadError::Shape("document root must be a mapping".into()));
    }

    let resolved = dereference(&raw)?;
    serde_json::from_value(resolved).map_err(|e| LoadError::Shape(e.to_string()))
}

/// YAML allows non-string keys (`200:` under `responses`); JSON does not.
fn yaml_to_json(value: serde_yaml::Value) -> Result<Value, LoadError> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                let key = match key {
                    Yaml::String(s) => s,
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    other => return Err(LoadError::UnsupportedKey(format!("{:?}", other))),
                };
                map.insert(key, yaml_to_json(value)?);
            }
            Value::Object(map)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

/// Replace every local `$ref` with the value it points at.
fn dereference(root: &Value) -> Result<Value, LoadError> {
    let mut active = Vec::new();
    resolve_node(root, root, &mut active)
}

fn resolve_node(node: &Value, root: &Value, active: &mut Vec<String>) -> Result<Value, LoadError> {
    match node {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                if active.iter().any(|r| r == reference) {
                    tracing::debug!(reference = %reference, "Circular reference left unexpanded");
                    return Ok(node.clone());
                }

                let target = lookup(root, reference)?;
                active.push(reference.clone());
                let resolved = resolve_node(target, root, active);
                active.pop();
                return resolved;
            }

            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key.clone(), resolve_node(value, root, active)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_node(item, root, active))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn lookup<'a>(root: &'a Value, reference: &str) -> Result<&'a Value, LoadError> {
    let Some(fragment) = reference.strip_prefix('#') else {
        return Err(LoadError::RemoteRef(reference.to_string()));
    };

    let pointer = percent_decode_str(fragment).decode_utf8_lossy();
    root.pointer(&pointer)
        .ok_or_else(|| LoadError::UnresolvedRef(reference.to_string()))
}
