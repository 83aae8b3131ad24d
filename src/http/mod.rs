//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout)
//!     → middleware.rs (plan → bags from request.rs → orchestrator)
//!         → rejected: error.rs (422 / 400 / 413)
//!         → accepted: bound controller (binding.rs) or upstream proxy
//! ```

pub mod binding;
pub mod error;
pub mod middleware;
pub mod request;
pub mod server;

pub use binding::{bind_controllers, BindError, Controller, ControllerRegistry};
pub use error::RequestError;
pub use middleware::{validation_middleware, GateState};
pub use server::{GateServer, UpstreamError};
