//! Validation error types.

use serde::Serialize;
use thiserror::Error;

use crate::compiler::Location;

/// Error code carried by every structured validation failure.
pub const INVALID_PARAM: &str = "invalid_param";

/// One failed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    /// `missing_field` or `invalid`.
    pub code: String,
    pub message: String,
    /// Set by the orchestrator before the error leaves the gate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl FieldError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: "missing_field".to_string(),
            message: "required".to_string(),
            location: None,
        }
    }

    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: "invalid".to_string(),
            message: message.into(),
            location: None,
        }
    }
}

/// Structured failure raised by a structural validator for one data bag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid_param: {} field error(s)", .errors.len())]
pub struct InvalidParams {
    pub errors: Vec<FieldError>,
}

impl InvalidParams {
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    pub fn code(&self) -> &'static str {
        INVALID_PARAM
    }

    /// Stamp `location` on every record.
    pub fn locate(self, location: Location) -> Vec<FieldError> {
        self.errors
            .into_iter()
            .map(|mut error| {
                error.location = Some(location);
                error
            })
            .collect()
    }
}

/// Validation failure crossing the gate boundary. Every record has a location.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("Validation Failed: {}", summary(.errors))]
pub struct ValidationError {
    code: &'static str,
    message: &'static str,
    errors: Vec<FieldError>,
}

impl ValidationError {
    pub(crate) fn at(invalid: InvalidParams, location: Location) -> Self {
        Self {
            code: INVALID_PARAM,
            message: "Validation Failed",
            errors: invalid.locate(location),
        }
    }

    pub(crate) fn extend(&mut self, invalid: InvalidParams, location: Location) {
        self.errors.extend(invalid.locate(location));
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Location of the first failing record.
    pub fn location(&self) -> Option<Location> {
        self.errors.first().and_then(|e| e.location)
    }
}

fn summary(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| match e.location {
            Some(location) => format!("{}.{} {}", location, e.field, e.message),
            None => format!("{} {}", e.field, e.message),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
