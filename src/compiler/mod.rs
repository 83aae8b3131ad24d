//! Rule compilation subsystem.
//!
//! # Data Flow
//! ```text
//! ApiDescription (dereferenced)
//!     → compile.rs (single pass over paths × methods)
//!         → PathIndex     (token templates, sorted)
//!         → RuleTable     (template → method → LocationRules | none)
//!         → bindings      (method, template, x-controller)
//!     → CompiledDescription, shared via Arc, never mutated
//! ```
//!
//! # Design Decisions
//! - Any malformed parameter aborts compilation; nothing is skipped
//! - An operation without `parameters` compiles to a `None` entry
//! - Body rules come from the schema's properties, not the parameter

pub mod compile;
pub mod rules;

pub use compile::{compile, CompileError, CompiledDescription, ControllerBinding};
pub use rules::{FieldRules, Location, LocationRules, Rule, RuleTable};
