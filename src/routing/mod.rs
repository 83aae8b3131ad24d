//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → index.rs (lowercase, walk templates in priority order)
//!     → matcher.rs (segment-by-segment structural match)
//!     → Return: matched template + captured params, or NoMatch
//!
//! Index Compilation (at startup):
//!     description path keys
//!     → rewrite {name} → :name
//!     → sort descending by template text
//!     → freeze as immutable PathIndex
//! ```
//!
//! # Design Decisions
//! - Templates compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same template
//! - First match wins (ordered by sort key)

pub mod index;
pub mod matcher;

pub use index::{to_route_template, PathIndex, RouteMatch};
pub use matcher::{PathParams, RouteTemplate, Segment};
