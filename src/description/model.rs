//! Typed view of a dereferenced API description.
//!
//! Only the parts the gate compiles are modeled. Extension fields whose shape
//! is checked by the compiler (`x-format`, `x-format-options`) are kept as raw
//! JSON values so a malformed one surfaces as a compile error with context.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Root of an API description.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ApiDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swagger: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openapi: Option<String>,

    /// Path template → path item, in document order.
    #[serde(default)]
    pub paths: IndexMap<String, PathItem>,
}

/// HTTP verbs a path item may declare operations for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
}

impl HttpMethod {
    /// Fixed traversal order used by the compiler.
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Put,
        HttpMethod::Post,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
        HttpMethod::Patch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Put => "put",
            HttpMethod::Post => "post",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
            HttpMethod::Patch => "patch",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a method name is outside the supported verb set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method: {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

/// Operations declared under one path template.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PathItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
}

impl PathItem {
    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        match method {
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
            HttpMethod::Options => self.options.as_ref(),
            HttpMethod::Head => self.head.as_ref(),
            HttpMethod::Patch => self.patch.as_ref(),
        }
    }

    /// Declared operations in the fixed verb order.
    pub fn operations(&self) -> impl Iterator<Item = (HttpMethod, &Operation)> {
        HttpMethod::ALL
            .into_iter()
            .filter_map(move |method| self.operation(method).map(|op| (method, op)))
    }
}

/// A single operation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Operation {
    #[serde(rename = "operationId", default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,

    /// `None` when the operation declares no `parameters` key at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Parameter>>,

    /// Handler reference for the host route binder.
    #[serde(rename = "x-controller", default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
}

/// A declared operation parameter.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Parameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Raw location; validated by the compiler.
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    /// Present on body parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,

    #[serde(rename = "x-format", default, skip_serializing_if = "Option::is_none")]
    pub x_format: Option<Value>,

    #[serde(rename = "x-format-options", default, skip_serializing_if = "Option::is_none")]
    pub x_format_options: Option<Value>,
}

/// The subset of a schema object that body flattening reads.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Schema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SchemaType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Schema>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<RequiredMarker>,

    #[serde(rename = "x-format", default, skip_serializing_if = "Option::is_none")]
    pub x_format: Option<Value>,

    #[serde(rename = "x-format-options", default, skip_serializing_if = "Option::is_none")]
    pub x_format_options: Option<Value>,
}

/// `type` as either a single name or a union such as `["string", "null"]`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SchemaType {
    Single(String),
    Union(Vec<String>),
}

impl SchemaType {
    /// The first non-`null` type name.
    pub fn primary(&self) -> Option<&str> {
        match self {
            SchemaType::Single(name) => Some(name.as_str()),
            SchemaType::Union(names) => names.iter().map(String::as_str).find(|n| *n != "null"),
        }
    }
}

/// `required` on a schema: a per-property flag, or the object-level list.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RequiredMarker {
    Flag(bool),
    Fields(Vec<String>),
}

impl RequiredMarker {
    pub fn flag(&self) -> Option<bool> {
        match self {
            RequiredMarker::Flag(flag) => Some(*flag),
            RequiredMarker::Fields(_) => None,
        }
    }

    pub fn lists(&self, field: &str) -> bool {
        match self {
            RequiredMarker::Flag(_) => false,
            RequiredMarker::Fields(fields) => fields.iter().any(|f| f == field),
        }
    }
}
