//! Structural validators.
//!
//! The gate only needs something that can check a data bag against a set of
//! field rules and report every failing field. [`ParameterValidator`] is the
//! built-in implementation; hosts with their own rule vocabulary plug in a
//! different [`StructuralValidator`].

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::compiler::{FieldRules, Rule};
use crate::validation::error::{FieldError, InvalidParams};
use crate::validation::DataBag;

/// Checks one data bag against one set of field rules.
pub trait StructuralValidator: Send + Sync {
    /// Validate `data`, reporting every failing field.
    fn validate(&self, rules: &FieldRules, data: &DataBag) -> Result<(), InvalidParams>;

    /// Vet rules once at startup, before the validator is shared.
    ///
    /// A rule the validator cannot enforce should be rejected here rather than
    /// at request time.
    fn prepare(&mut self, _rules: &FieldRules) -> Result<(), String> {
        Ok(())
    }
}

/// Rule types understood by [`ParameterValidator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleKind {
    Int,
    Number,
    String,
    Boolean,
    Array,
    Object,
    Enum,
    Email,
    Url,
    Date,
    DateTime,
    Id,
    File,
}

impl RuleKind {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "int" | "integer" => RuleKind::Int,
            "number" => RuleKind::Number,
            "string" => RuleKind::String,
            "bool" | "boolean" => RuleKind::Boolean,
            "array" => RuleKind::Array,
            "object" => RuleKind::Object,
            "enum" => RuleKind::Enum,
            "email" => RuleKind::Email,
            "url" => RuleKind::Url,
            "date" => RuleKind::Date,
            "dateTime" | "date-time" | "datetime" => RuleKind::DateTime,
            "id" => RuleKind::Id,
            "file" => RuleKind::File,
            _ => return None,
        })
    }
}

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .expect("email pattern is valid")
});

static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern is valid"));

static DATE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[Tt ]\d{2}:\d{2}:\d{2}(\.\d+)?([Zz]|[+-]\d{2}:?\d{2})?$")
        .expect("date-time pattern is valid")
});

static ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").expect("id pattern is valid"));

/// Parameter-style rule checker.
///
/// Absent and `null` values only fail when the rule is required. With
/// `convert` enabled, numeric and boolean strings satisfy `int`, `number`
/// and `boolean` rules, and numbers and booleans satisfy `string` rules
/// through their JSON text; the data itself is never rewritten.
#[derive(Debug, Clone, Default)]
pub struct ParameterValidator {
    convert: bool,
    patterns: HashMap<String, Regex>,
}

impl ParameterValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_convert(mut self, convert: bool) -> Self {
        self.convert = convert;
        self
    }

    fn check(&self, rule: &Rule, value: &Value) -> Result<(), String> {
        let Some(kind) = rule.kind.as_deref() else {
            return Ok(());
        };
        let Some(kind) = RuleKind::parse(kind) else {
            return Err(format!("unsupported rule type `{}`", kind));
        };

        match kind {
            RuleKind::Int => {
                let n = self.number(value).filter(|n| n.fract() == 0.0);
                let n = n.ok_or("should be an integer")?;
                check_bounds(rule, n, "should be")
            }
            RuleKind::Number => {
                let n = self.number(value).ok_or("should be a number")?;
                check_bounds(rule, n, "should be")
            }
            RuleKind::String => self.check_string(rule, value),
            RuleKind::Boolean => match value {
                Value::Bool(_) => Ok(()),
                Value::String(s) if self.convert && (s == "true" || s == "false") => Ok(()),
                _ => Err("should be a boolean".into()),
            },
            RuleKind::Array => {
                let items = value.as_array().ok_or("should be an array")?;
                check_bounds(rule, items.len() as f64, "length should be")?;
                if let Some(item_type) = rule.option("itemType").and_then(Value::as_str) {
                    let each = item_rule(rule, item_type);
                    for (i, item) in items.iter().enumerate() {
                        self.check(&each, item)
                            .map_err(|message| format!("item {}: {}", i, message))?;
                    }
                }
                Ok(())
            }
            RuleKind::Object => value
                .is_object()
                .then_some(())
                .ok_or_else(|| "should be an object".into()),
            RuleKind::Enum => {
                let values = rule
                    .option("values")
                    .and_then(Value::as_array)
                    .ok_or("enum rule has no `values`")?;
                if values.contains(value) {
                    Ok(())
                } else {
                    Err(format!("should be one of {}", Value::Array(values.clone())))
                }
            }
            RuleKind::Email => matches_pattern(value, &EMAIL, "should be an email"),
            RuleKind::Url => {
                let text = value.as_str().ok_or("should be a url")?;
                match url::Url::parse(text) {
                    Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
                    _ => Err("should be a url".into()),
                }
            }
            RuleKind::Date => matches_pattern(value, &DATE, "should be a date (YYYY-MM-DD)"),
            RuleKind::DateTime => matches_pattern(value, &DATE_TIME, "should be a date-time"),
            RuleKind::Id => matches_pattern(value, &ID, "should be an id"),
            RuleKind::File => Ok(()),
        }
    }

    fn check_string(&self, rule: &Rule, value: &Value) -> Result<(), String> {
        let rendered;
        let text = match value {
            Value::String(text) => text.as_str(),
            Value::Number(_) | Value::Bool(_) if self.convert => {
                rendered = value.to_string();
                rendered.as_str()
            }
            _ => return Err("should be a string".into()),
        };

        let allow_empty = rule.option("allowEmpty").and_then(Value::as_bool).unwrap_or(false);
        if text.is_empty() {
            return if allow_empty {
                Ok(())
            } else {
                Err("should not be empty".into())
            };
        }

        check_bounds(rule, text.chars().count() as f64, "length should be")?;

        if let Some(pattern) = rule.option("format").and_then(Value::as_str) {
            let compiled;
            let regex = match self.patterns.get(pattern) {
                Some(regex) => regex,
                None => {
                    compiled = Regex::new(pattern).map_err(|e| format!("bad format pattern: {}", e))?;
                    &compiled
                }
            };
            if !regex.is_match(text) {
                return Err(format!("should match {}", pattern));
            }
        }

        Ok(())
    }

    fn number(&self, value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) if self.convert => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }
}

/// Rule applied to each array item. `min`/`max` bound the array length and stay behind.
fn item_rule(rule: &Rule, item_type: &str) -> Rule {
    let mut item = Rule::new(Some(item_type.to_string()), true);
    for key in ["values", "format", "allowEmpty"] {
        if let Some(value) = rule.option(key) {
            item.options.insert(key.to_string(), value.clone());
        }
    }
    item
}

fn check_bounds(rule: &Rule, n: f64, subject: &str) -> Result<(), String> {
    if let Some(min) = rule.option("min").and_then(Value::as_f64) {
        if n < min {
            return Err(format!("{} at least {}", subject, min));
        }
    }
    if let Some(max) = rule.option("max").and_then(Value::as_f64) {
        if n > max {
            return Err(format!("{} at most {}", subject, max));
        }
    }
    Ok(())
}

fn matches_pattern(value: &Value, pattern: &Regex, message: &str) -> Result<(), String> {
    match value.as_str() {
        Some(text) if pattern.is_match(text) => Ok(()),
        _ => Err(message.to_string()),
    }
}

impl StructuralValidator for ParameterValidator {
    fn validate(&self, rules: &FieldRules, data: &DataBag) -> Result<(), InvalidParams> {
        let errors: Vec<FieldError> = rules
            .iter()
            .filter_map(|(field, rule)| match data.get(field) {
                None | Some(Value::Null) => rule.required.then(|| FieldError::missing(field)),
                Some(value) => self
                    .check(rule, value)
                    .err()
                    .map(|message| FieldError::invalid(field, message)),
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(InvalidParams::new(errors))
        }
    }

    fn prepare(&mut self, rules: &FieldRules) -> Result<(), String> {
        for (field, rule) in rules {
            let kinds = [
                rule.kind.as_deref(),
                rule.option("itemType").and_then(Value::as_str),
            ];
            for kind in kinds.into_iter().flatten() {
                let parsed = RuleKind::parse(kind)
                    .ok_or_else(|| format!("field `{}`: unsupported rule type `{}`", field, kind))?;
                if parsed == RuleKind::Enum && rule.option("values").and_then(Value::as_array).is_none() {
                    return Err(format!("field `{}`: enum rule needs a `values` array", field));
                }
            }

            if let Some(pattern) = rule.option("format").and_then(Value::as_str) {
                if !self.patterns.contains_key(pattern) {
                    let regex = Regex::new(pattern)
                        .map_err(|e| format!("field `{}`: bad format pattern: {}", field, e))?;
                    self.patterns.insert(pattern.to_string(), regex);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules(value: Value) -> FieldRules {
        serde_json::from_value(value).unwrap()
    }

    fn bag(value: Value) -> DataBag {
        match value {
            Value::Object(map) => map,
            _ => panic!("bag must be an object"),
        }
    }

    #[test]
    fn test_required_and_optional() {
        let rules = rules(json!({
            "name": {"type": "string", "required": true},
            "nickname": {"type": "string", "required": false}
        }));
        let validator = ParameterValidator::new();

        let err = validator.validate(&rules, &bag(json!({"nickname": null}))).unwrap_err();
        assert_eq!(err.errors, vec![FieldError::missing("name")]);

        assert!(validator.validate(&rules, &bag(json!({"name": "rex"}))).is_ok());
    }

    #[test]
    fn test_reports_every_failing_field() {
        let rules = rules(json!({
            "age": {"type": "int", "required": true, "min": 0},
            "active": {"type": "boolean", "required": true},
            "email": {"type": "email", "required": true}
        }));
        let data = bag(json!({"age": -1, "active": "yes", "email": "nobody"}));

        let err = ParameterValidator::new().validate(&rules, &data).unwrap_err();
        let fields: Vec<_> = err.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["age", "active", "email"]);
        assert!(err.errors.iter().all(|e| e.code == "invalid"));
    }

    #[test]
    fn test_convert_accepts_numeric_strings() {
        let rules = rules(json!({"id": {"type": "integer", "required": true}}));
        let data = bag(json!({"id": "42"}));

        assert!(ParameterValidator::new().validate(&rules, &data).is_err());
        assert!(ParameterValidator::new().with_convert(true).validate(&rules, &data).is_ok());

        let data = bag(json!({"id": "4.2"}));
        assert!(ParameterValidator::new().with_convert(true).validate(&rules, &data).is_err());
    }

    #[test]
    fn test_string_options() {
        let rules = rules(json!({
            "code": {"type": "string", "required": true, "format": "^[A-Z]{3}$"},
            "note": {"type": "string", "required": false, "allowEmpty": true, "max": 5}
        }));
        let mut validator = ParameterValidator::new();
        validator.prepare(&rules).unwrap();

        assert!(validator.validate(&rules, &bag(json!({"code": "ABC", "note": ""}))).is_ok());

        let err = validator.validate(&rules, &bag(json!({"code": "abc", "note": "too long"}))).unwrap_err();
        assert_eq!(err.errors.len(), 2);
        assert_eq!(err.errors[1].message, "length should be at most 5");

        let err = validator.validate(&rules, &bag(json!({"code": ""}))).unwrap_err();
        assert_eq!(err.errors[0].message, "should not be empty");
    }

    #[test]
    fn test_array_and_enum() {
        let rules = rules(json!({
            "tags": {"type": "array", "required": true, "itemType": "string", "max": 2},
            "status": {"type": "enum", "required": true, "values": ["open", "closed"]}
        }));
        let validator = ParameterValidator::new();

        assert!(validator
            .validate(&rules, &bag(json!({"tags": ["a"], "status": "open"})))
            .is_ok());

        let err = validator
            .validate(&rules, &bag(json!({"tags": ["a", 1], "status": "pending"})))
            .unwrap_err();
        assert_eq!(err.errors[0].message, "item 1: should be a string");
        assert!(err.errors[1].message.starts_with("should be one of"));
    }

    #[test]
    fn test_enum_items_use_outer_values() {
        let rules = rules(json!({
            "tags": {"type": "array", "required": true, "itemType": "enum", "values": ["a", "b"], "max": 3}
        }));
        let mut validator = ParameterValidator::new();
        validator.prepare(&rules).unwrap();

        assert!(validator.validate(&rules, &bag(json!({"tags": ["a"]}))).is_ok());
        assert!(validator.validate(&rules, &bag(json!({"tags": ["b", "a", "b"]}))).is_ok());

        let err = validator.validate(&rules, &bag(json!({"tags": ["a", "c"]}))).unwrap_err();
        assert!(err.errors[0].message.starts_with("item 1: should be one of"));

        let err = validator
            .validate(&rules, &bag(json!({"tags": ["a", "a", "a", "a"]})))
            .unwrap_err();
        assert_eq!(err.errors[0].message, "length should be at most 3");
    }

    #[test]
    fn test_string_items_use_outer_format() {
        let rules = rules(json!({
            "codes": {"type": "array", "required": true, "itemType": "string", "format": "^[A-Z]+$"}
        }));
        let mut validator = ParameterValidator::new();
        validator.prepare(&rules).unwrap();

        assert!(validator.validate(&rules, &bag(json!({"codes": ["AB", "C"]}))).is_ok());
        let err = validator.validate(&rules, &bag(json!({"codes": ["AB", "c"]}))).unwrap_err();
        assert_eq!(err.errors[0].message, "item 1: should match ^[A-Z]+$");
    }

    #[test]
    fn test_convert_accepts_scalars_for_strings() {
        let rules = rules(json!({
            "zip": {"type": "string", "required": true, "max": 5},
            "flag": {"type": "string", "required": true}
        }));
        let data = bag(json!({"zip": 2134, "flag": true}));

        assert!(ParameterValidator::new().validate(&rules, &data).is_err());
        assert!(ParameterValidator::new().with_convert(true).validate(&rules, &data).is_ok());

        let err = ParameterValidator::new()
            .with_convert(true)
            .validate(&rules, &bag(json!({"zip": 123456, "flag": [1]})))
            .unwrap_err();
        assert_eq!(err.errors[0].message, "length should be at most 5");
        assert_eq!(err.errors[1].message, "should be a string");
    }

    #[test]
    fn test_formats() {
        let rules = rules(json!({
            "born": {"type": "date", "required": true},
            "seen": {"type": "dateTime", "required": true},
            "home": {"type": "url", "required": true},
            "ref": {"type": "id", "required": true}
        }));
        let data = bag(json!({
            "born": "1990-04-01",
            "seen": "2024-01-02T03:04:05Z",
            "home": "https://example.com",
            "ref": "123"
        }));
        assert!(ParameterValidator::new().validate(&rules, &data).is_ok());
    }

    #[test]
    fn test_untyped_rule_checks_presence_only() {
        let rules = rules(json!({"anything": {"required": true}}));
        let validator = ParameterValidator::new();
        assert!(validator.validate(&rules, &bag(json!({"anything": [1, "x"]}))).is_ok());
        assert!(validator.validate(&rules, &bag(json!({}))).is_err());
    }

    #[test]
    fn test_prepare_rejects_unusable_rules() {
        let mut validator = ParameterValidator::new();
        assert!(validator
            .prepare(&rules(json!({"x": {"type": "uuid-ish", "required": false}})))
            .is_err());
        assert!(validator
            .prepare(&rules(json!({"x": {"type": "enum", "required": false}})))
            .is_err());
        assert!(validator
            .prepare(&rules(json!({"x": {"type": "string", "required": false, "format": "("}})))
            .is_err());
        assert!(validator
            .prepare(&rules(json!({"x": {"type": "array", "required": false, "itemType": "int"}})))
            .is_ok());
    }
}
