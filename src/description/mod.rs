//! API description subsystem.
//!
//! # Data Flow
//! ```text
//! description file (YAML/JSON)
//!     → loader.rs (parse, resolve local $ref pointers)
//!     → model.rs (typed ApiDescription)
//!     → compiler (RuleTable + PathIndex)
//! ```
//!
//! # Design Decisions
//! - Loaded once at startup; any failure aborts startup
//! - Only document-local references are resolved, never remote ones
//! - Circular references are left in place instead of expanded forever
//! - Fields the gate does not need are ignored, not rejected

pub mod loader;
pub mod model;

pub use loader::{load_description, parse_description, DescriptionFormat, LoadError};
pub use model::{ApiDescription, HttpMethod, Operation, Parameter, PathItem, RequiredMarker, Schema};
