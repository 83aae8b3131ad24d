//! Rule compilation.
//!
//! Walks a dereferenced [`ApiDescription`] once and produces the immutable
//! state the request gate runs on: the [`RuleTable`], the [`PathIndex`] and
//! the controller bindings handed to the host router.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::compiler::rules::{FieldRules, Location, LocationRules, Rule, RuleTable};
use crate::description::{ApiDescription, HttpMethod, Parameter, RequiredMarker, Schema};
use crate::routing::{to_route_template, PathIndex};

/// Errors that make a description unusable. All of them abort startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("{operation}: parameter without a name")]
    MissingName { operation: String },

    #[error("{operation}: parameter `{name}` has no location")]
    MissingLocation { operation: String, name: String },

    #[error("{operation}: parameter `{name}` has unknown location `{location}`")]
    UnknownLocation {
        operation: String,
        name: String,
        location: String,
    },

    #[error("{operation}: body parameter `{name}` has no schema")]
    MissingSchema { operation: String, name: String },

    #[error("{operation}: body parameter `{name}` schema has no properties")]
    MissingProperties { operation: String, name: String },

    #[error("{operation}: `x-format` of `{field}` must be a string")]
    InvalidFormat { operation: String, field: String },

    #[error("{operation}: `x-format-options` of `{field}` must be an object")]
    InvalidFormatOptions { operation: String, field: String },

    #[error("{operation}: `x-format-options.{key}` of `{field}` has the wrong type")]
    InvalidOverride {
        operation: String,
        field: String,
        key: String,
    },
}

/// A (method, template, controller) triple for the host route binder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerBinding {
    pub method: HttpMethod,
    /// Template as written in the description (`/users/{id}`).
    pub template: String,
    /// Token-form template (`/users/:id`).
    pub route: String,
    pub controller: String,
}

/// Everything the compiler produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompiledDescription {
    pub rules: RuleTable,
    pub paths: PathIndex,
    pub controllers: Vec<ControllerBinding>,
}

/// Operation being compiled, for error context.
struct Site<'a> {
    template: &'a str,
    method: HttpMethod,
}

impl fmt::Display for Site<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method.as_str().to_uppercase(), self.template)
    }
}

/// Compile a description into rule table, path index and controller bindings.
pub fn compile(description: &ApiDescription) -> Result<CompiledDescription, CompileError> {
    let mut rules = RuleTable::default();
    let mut templates = Vec::with_capacity(description.paths.len());
    let mut controllers = Vec::new();
    let mut operations = 0usize;

    for (template, item) in &description.paths {
        let route = to_route_template(template);
        templates.push(route.clone());

        for (method, operation) in item.operations() {
            let site = Site { template, method };
            let compiled = match &operation.parameters {
                None => None,
                Some(parameters) => Some(compile_parameters(parameters, &site)?),
            };
            rules.insert(route.clone(), method, compiled);
            operations += 1;

            if let Some(controller) = &operation.controller {
                controllers.push(ControllerBinding {
                    method,
                    template: template.clone(),
                    route: route.clone(),
                    controller: controller.clone(),
                });
            }
        }
    }

    let paths = PathIndex::new(templates);
    for template in paths.templates().filter(|t| t.has_uppercase_literal()) {
        tracing::warn!(
            template = %template,
            "Template has uppercase literal segments and will never match a request"
        );
    }

    tracing::info!(
        templates = paths.len(),
        operations,
        controllers = controllers.len(),
        "API description compiled"
    );

    Ok(CompiledDescription {
        rules,
        paths,
        controllers,
    })
}

fn compile_parameters(parameters: &[Parameter], site: &Site<'_>) -> Result<LocationRules, CompileError> {
    let mut rules = LocationRules::default();

    for parameter in parameters {
        let name = parameter.name.as_deref().ok_or_else(|| CompileError::MissingName {
            operation: site.to_string(),
        })?;

        let raw_location = parameter
            .location
            .as_deref()
            .ok_or_else(|| CompileError::MissingLocation {
                operation: site.to_string(),
                name: name.to_string(),
            })?;

        let location: Location = raw_location
            .parse()
            .map_err(|location| CompileError::UnknownLocation {
                operation: site.to_string(),
                name: name.to_string(),
                location,
            })?;

        match location {
            Location::Body => flatten_body(parameter, name, site, &mut rules.body)?,
            Location::Path => {
                // A matched route always has its path segments.
                let mut rule = build_rule(
                    parameter.kind.as_deref(),
                    true,
                    parameter.x_format.as_ref(),
                    parameter.x_format_options.as_ref(),
                    name,
                    site,
                )?;
                rule.required = true;
                rules.path.insert(name.to_string(), rule);
            }
            other => {
                let rule = build_rule(
                    parameter.kind.as_deref(),
                    parameter.required.unwrap_or(false),
                    parameter.x_format.as_ref(),
                    parameter.x_format_options.as_ref(),
                    name,
                    site,
                )?;
                let key = match other {
                    Location::Header => name.to_ascii_lowercase(),
                    _ => name.to_string(),
                };
                rules.get_mut(other).insert(key, rule);
            }
        }
    }

    Ok(rules)
}

/// One rule per schema property. `required` comes from the property itself,
/// or from the schema's own `required` list; never from the parameter.
fn flatten_body(
    parameter: &Parameter,
    name: &str,
    site: &Site<'_>,
    body: &mut FieldRules,
) -> Result<(), CompileError> {
    let schema: &Schema = parameter.schema.as_ref().ok_or_else(|| CompileError::MissingSchema {
        operation: site.to_string(),
        name: name.to_string(),
    })?;

    let properties = schema
        .properties
        .as_ref()
        .ok_or_else(|| CompileError::MissingProperties {
            operation: site.to_string(),
            name: name.to_string(),
        })?;

    for (field, property) in properties {
        let required = property
            .required
            .as_ref()
            .and_then(RequiredMarker::flag)
            .unwrap_or_else(|| schema.required.as_ref().is_some_and(|m| m.lists(field)));

        let rule = build_rule(
            property.kind.as_ref().and_then(|k| k.primary()),
            required,
            property.x_format.as_ref(),
            property.x_format_options.as_ref(),
            field,
            site,
        )?;
        body.insert(field.clone(), rule);
    }

    Ok(())
}

/// `type` = `x-format` else declared type; `x-format-options` merged on top,
/// so an option named `type` or `required` overrides the core field.
fn build_rule(
    declared: Option<&str>,
    required: bool,
    x_format: Option<&Value>,
    x_format_options: Option<&Value>,
    field: &str,
    site: &Site<'_>,
) -> Result<Rule, CompileError> {
    let format = match x_format {
        None | Some(Value::Null) => None,
        Some(Value::String(format)) => Some(format.clone()),
        Some(_) => {
            return Err(CompileError::InvalidFormat {
                operation: site.to_string(),
                field: field.to_string(),
            })
        }
    };

    let mut rule = Rule::new(format.or_else(|| declared.map(str::to_string)), required);

    let options: Map<String, Value> = match x_format_options {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(options)) => options.clone(),
        Some(_) => {
            return Err(CompileError::InvalidFormatOptions {
                operation: site.to_string(),
                field: field.to_string(),
            })
        }
    };

    let invalid_override = |key: &str| CompileError::InvalidOverride {
        operation: site.to_string(),
        field: field.to_string(),
        key: key.to_string(),
    };

    for (key, value) in options {
        match key.as_str() {
            "type" => {
                let kind = value.as_str().ok_or_else(|| invalid_override("type"))?;
                rule.kind = Some(kind.to_string());
            }
            "required" => {
                rule.required = value.as_bool().ok_or_else(|| invalid_override("required"))?;
            }
            _ => {
                rule.options.insert(key, value);
            }
        }
    }

    Ok(rule)
}
