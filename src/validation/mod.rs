//! Request validation subsystem.
//!
//! # Data Flow
//! ```text
//! GateRequest (method, path, query, headers, path params, body)
//!     → orchestrator.rs: PathIndex resolve → RuleTable lookup
//!         → none: pass through
//!         → for each location in order query, header, path, formData, body:
//!               coerce.rs (query only)
//!               validator.rs (structural check of one bag)
//!               error.rs (stamp location)
//!     → Ok(Outcome) | Err(ValidationError)
//! ```
//!
//! # Design Decisions
//! - The structural validator is a trait; the built-in one is rule-driven
//! - Errors never leave the gate without a location
//! - Fail-fast is the default mode

pub mod coerce;
pub mod error;
pub mod orchestrator;
pub mod validator;

use serde_json::{Map, Value};

/// Field name to value for one request location.
pub type DataBag = Map<String, Value>;

pub use coerce::{coerce_bag, coerce_value};
pub use error::{FieldError, InvalidParams, ValidationError, INVALID_PARAM};
pub use orchestrator::{GateRequest, Outcome, RoutePlan, RuleRejected, ValidationMode, ValidationOrchestrator};
pub use validator::{ParameterValidator, StructuralValidator};
