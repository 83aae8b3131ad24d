//! Per-request validation orchestration.
//!
//! # Responsibilities
//! - Resolve the request to a compiled route + method
//! - Gather the data bag for each location with rules
//! - Coerce the query bag, then hand each bag to the structural validator
//! - Stamp the location on every failing record
//!
//! # Design Decisions
//! - Pass-through is a normal outcome, not an error
//! - Fail fast by default: the first failing location ends the pass
//! - Compiled state is shared read-only; per-request bags are owned here

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compiler::{CompiledDescription, Location, LocationRules};
use crate::description::HttpMethod;
use crate::observability::metrics;
use crate::routing::PathParams;
use crate::validation::coerce::coerce_bag;
use crate::validation::error::ValidationError;
use crate::validation::validator::{ParameterValidator, StructuralValidator};
use crate::validation::DataBag;

/// How many locations a failing request reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Stop at the first failing location.
    #[default]
    FailFast,
    /// Check every location and report all failures together.
    Aggregate,
}

/// Request data as seen by the gate.
#[derive(Debug, Clone, Default)]
pub struct GateRequest {
    pub path: String,
    pub method: String,
    pub query: DataBag,
    pub headers: DataBag,
    /// Path parameters from the host router; `None` uses the gate's own capture.
    pub path_params: Option<DataBag>,
    /// Parsed body, used for both `formData` and `body` rules.
    pub body: DataBag,
}

/// Result of a request that was not rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No rules applied.
    PassThrough,
    /// Rules applied and every location passed.
    Validated { template: String },
}

/// Rules selected for one request.
#[derive(Debug, Clone)]
pub struct RoutePlan<'a> {
    pub template: &'a str,
    pub method: HttpMethod,
    pub rules: &'a LocationRules,
    pub params: PathParams,
}

impl RoutePlan<'_> {
    pub fn needs_body(&self) -> bool {
        self.rules.needs_body()
    }
}

/// A compiled rule the validator refused at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{method} {template} ({location}): {reason}")]
pub struct RuleRejected {
    pub template: String,
    pub method: String,
    pub location: Location,
    pub reason: String,
}

/// Applies compiled rules to requests.
pub struct ValidationOrchestrator<V = ParameterValidator> {
    compiled: Arc<CompiledDescription>,
    validator: V,
    mode: ValidationMode,
}

impl<V: StructuralValidator> ValidationOrchestrator<V> {
    /// Create an orchestrator, letting the validator vet every compiled rule first.
    pub fn new(
        compiled: Arc<CompiledDescription>,
        mut validator: V,
        mode: ValidationMode,
    ) -> Result<Self, RuleRejected> {
        for (template, method, rules) in compiled.rules.iter() {
            let Some(rules) = rules else { continue };
            for (location, fields) in rules.iter() {
                validator.prepare(fields).map_err(|reason| RuleRejected {
                    template: template.to_string(),
                    method: method.as_str().to_uppercase(),
                    location,
                    reason,
                })?;
            }
        }

        Ok(Self {
            compiled,
            validator,
            mode,
        })
    }

    pub fn compiled(&self) -> &CompiledDescription {
        &self.compiled
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Select the rules for a request, or `None` when the request passes through.
    pub fn plan(&self, path: &str, method: &str) -> Option<RoutePlan<'_>> {
        let method: HttpMethod = method.to_ascii_lowercase().parse().ok()?;
        let matched = self.compiled.paths.resolve(path)?;
        let rules = self.compiled.rules.lookup(matched.template, method)?;

        Some(RoutePlan {
            template: matched.template,
            method,
            rules,
            params: matched.params,
        })
    }

    /// Run the structural validator over every location with rules.
    pub fn check(&self, plan: &RoutePlan<'_>, request: &GateRequest) -> Result<(), ValidationError> {
        let captured;
        let path_bag = match &request.path_params {
            Some(params) => params,
            None => {
                captured = plan
                    .params
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone().into()))
                    .collect::<DataBag>();
                &captured
            }
        };

        let mut failure: Option<ValidationError> = None;

        for (location, fields) in plan.rules.iter() {
            let result = match location {
                Location::Query => self.validator.validate(fields, &coerce_bag(&request.query)),
                Location::Header => self.validator.validate(fields, &request.headers),
                Location::Path => self.validator.validate(fields, path_bag),
                Location::FormData | Location::Body => self.validator.validate(fields, &request.body),
            };

            let Err(invalid) = result else { continue };

            metrics::record_rejection(location);
            match failure.as_mut() {
                Some(error) => error.extend(invalid, location),
                None => failure = Some(ValidationError::at(invalid, location)),
            }

            if self.mode == ValidationMode::FailFast {
                break;
            }
        }

        match failure {
            None => {
                metrics::record_outcome("validated");
                tracing::debug!(
                    template = plan.template,
                    method = %plan.method,
                    "Request passed validation"
                );
                Ok(())
            }
            Some(error) => {
                metrics::record_outcome("rejected");
                tracing::info!(
                    template = plan.template,
                    method = %plan.method,
                    location = ?error.location(),
                    errors = error.errors().len(),
                    "Request rejected"
                );
                Err(error)
            }
        }
    }

    /// Gate one request.
    pub fn validate(&self, request: &GateRequest) -> Result<Outcome, ValidationError> {
        let start = Instant::now();

        let Some(plan) = self.plan(&request.path, &request.method) else {
            tracing::trace!(method = %request.method, path = %request.path, "No rules apply");
            metrics::record_outcome("passed");
            return Ok(Outcome::PassThrough);
        };

        let result = self.check(&plan, request);
        metrics::record_duration(start);

        result.map(|()| Outcome::Validated {
            template: plan.template.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile, FieldRules};
    use crate::validation::error::InvalidParams;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn compiled() -> Arc<CompiledDescription> {
        let description = serde_json::from_value(json!({
            "paths": {
                "/users/{id}": {
                    "get": {"parameters": [
                        {"name": "id", "in": "path", "type": "string", "x-format": "id"},
                        {"name": "age", "in": "query", "type": "integer", "required": true},
                        {"name": "active", "in": "query", "type": "boolean"},
                        {"name": "name", "in": "query", "type": "string"}
                    ]},
                    "post": {}
                },
                "/users/active": {
                    "get": {"parameters": [
                        {"name": "limit", "in": "query", "type": "integer", "required": true}
                    ]}
                },
                "/users": {
                    "post": {"parameters": [
                        {"name": "X-Client", "in": "header", "type": "string", "required": true},
                        {"name": "body", "in": "body", "schema": {"properties": {
                            "name": {"type": "string", "required": true},
                            "email": {"type": "email"}
                        }}}
                    ]}
                }
            }
        }))
        .unwrap();
        Arc::new(compile(&description).unwrap())
    }

    fn gate(mode: ValidationMode) -> ValidationOrchestrator {
        ValidationOrchestrator::new(compiled(), ParameterValidator::new(), mode).unwrap()
    }

    fn request(method: &str, path: &str) -> GateRequest {
        GateRequest {
            path: path.into(),
            method: method.into(),
            ..Default::default()
        }
    }

    fn bag(value: Value) -> DataBag {
        match value {
            Value::Object(map) => map,
            _ => panic!("bag must be an object"),
        }
    }

    /// Counts calls; fails every bag.
    struct Recording {
        calls: Arc<AtomicUsize>,
    }

    impl StructuralValidator for Recording {
        fn validate(&self, rules: &FieldRules, _data: &DataBag) -> Result<(), InvalidParams> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(InvalidParams::new(
                rules
                    .keys()
                    .map(|f| crate::validation::FieldError::invalid(f, "rejected"))
                    .collect(),
            ))
        }
    }

    #[test]
    fn test_query_is_coerced_before_validation() {
        let mut req = request("GET", "/users/7");
        req.query = bag(json!({"age": "30", "active": "true", "name": "null"}));

        let outcome = gate(ValidationMode::FailFast).validate(&req).unwrap();
        assert_eq!(
            outcome,
            Outcome::Validated {
                template: "/users/:id".into()
            }
        );
    }

    #[test]
    fn test_only_query_is_coerced() {
        let description = serde_json::from_value(json!({
            "paths": {"/orders/{id}": {"post": {"parameters": [
                {"name": "id", "in": "path", "type": "string"},
                {"name": "X-Client", "in": "header", "type": "string", "required": true},
                {"name": "body", "in": "body", "schema": {"properties": {
                    "age": {"type": "int", "required": true}
                }}}
            ]}}}
        }))
        .unwrap();
        let compiled = Arc::new(compile(&description).unwrap());
        let gate = ValidationOrchestrator::new(compiled, ParameterValidator::new(), ValidationMode::Aggregate).unwrap();

        let mut req = request("POST", "/orders/123");
        req.headers = bag(json!({"x-client": "123"}));
        req.body = bag(json!({"age": "30"}));

        let err = gate.validate(&req).unwrap_err();
        assert_eq!(err.errors().len(), 1);
        assert_eq!(err.errors()[0].field, "age");
        assert_eq!(err.errors()[0].location, Some(Location::Body));

        req.body = bag(json!({"age": 30}));
        assert!(gate.validate(&req).is_ok());
    }

    #[test]
    fn test_literal_route_rules_win() {
        let gate = gate(ValidationMode::FailFast);

        let mut req = request("GET", "/users/active");
        req.query = bag(json!({"age": "30"}));
        let err = gate.validate(&req).unwrap_err();
        assert_eq!(err.errors()[0].field, "limit");

        req.query = bag(json!({"limit": "10"}));
        assert!(gate.validate(&req).is_ok());
    }

    #[test]
    fn test_path_and_method_case_insensitive() {
        let gate = gate(ValidationMode::FailFast);
        let lower = gate.plan("/users/1", "get").unwrap();
        let upper = gate.plan("/Users/1", "GET").unwrap();
        assert_eq!(lower.template, upper.template);
    }

    #[test]
    fn test_captured_path_params_are_validated() {
        let gate = gate(ValidationMode::FailFast);
        let mut req = request("GET", "/users/abc");
        req.query = bag(json!({"age": "1"}));

        let err = gate.validate(&req).unwrap_err();
        assert_eq!(err.location(), Some(Location::Path));
        assert_eq!(err.errors()[0].field, "id");
    }

    #[test]
    fn test_host_path_params_take_precedence() {
        let gate = gate(ValidationMode::FailFast);
        let mut req = request("GET", "/users/abc");
        req.query = bag(json!({"age": "1"}));
        req.path_params = Some(bag(json!({"id": "99"})));

        assert!(gate.validate(&req).is_ok());
    }

    #[test]
    fn test_missing_body_property_yields_single_body_record() {
        let mut req = request("POST", "/users");
        req.headers = bag(json!({"x-client": "cli"}));
        req.body = bag(json!({"email": "a@b.io"}));

        let err = gate(ValidationMode::FailFast).validate(&req).unwrap_err();
        assert_eq!(err.errors().len(), 1);
        assert_eq!(err.errors()[0].field, "name");
        assert_eq!(err.errors()[0].location, Some(Location::Body));
    }

    #[test]
    fn test_fail_fast_stops_at_first_location() {
        let mut req = request("POST", "/users");
        req.body = bag(json!({}));

        let err = gate(ValidationMode::FailFast).validate(&req).unwrap_err();
        assert!(err.errors().iter().all(|e| e.location == Some(Location::Header)));
    }

    #[test]
    fn test_aggregate_collects_every_location() {
        let mut req = request("POST", "/users");
        req.body = bag(json!({}));

        let err = gate(ValidationMode::Aggregate).validate(&req).unwrap_err();
        let locations: Vec<_> = err.errors().iter().filter_map(|e| e.location).collect();
        assert_eq!(locations, vec![Location::Header, Location::Body]);
    }

    #[test]
    fn test_pass_through_never_calls_validator() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = ValidationOrchestrator::new(
            compiled(),
            Recording { calls: calls.clone() },
            ValidationMode::FailFast,
        )
        .unwrap();

        // Declared without parameters.
        assert_eq!(gate.validate(&request("POST", "/users/1")).unwrap(), Outcome::PassThrough);
        // Method not declared.
        assert_eq!(gate.validate(&request("DELETE", "/users")).unwrap(), Outcome::PassThrough);
        // Unsupported method.
        assert_eq!(gate.validate(&request("TRACE", "/users")).unwrap(), Outcome::PassThrough);
        // No template.
        assert_eq!(gate.validate(&request("GET", "/pets")).unwrap(), Outcome::PassThrough);

        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(gate.validate(&request("GET", "/users/active")).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_validator_can_reject_rules_at_startup() {
        struct Picky;
        impl StructuralValidator for Picky {
            fn validate(&self, _: &FieldRules, _: &DataBag) -> Result<(), InvalidParams> {
                Ok(())
            }
            fn prepare(&mut self, rules: &FieldRules) -> Result<(), String> {
                match rules.contains_key("X-Client") || rules.contains_key("x-client") {
                    true => Err("headers not supported".into()),
                    false => Ok(()),
                }
            }
        }

        let err = ValidationOrchestrator::new(compiled(), Picky, ValidationMode::FailFast)
            .err()
            .unwrap();
        assert_eq!(err.location, Location::Header);
        assert_eq!(err.template, "/users");
    }
}
