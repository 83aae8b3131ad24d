//! Request validation gate driven by a Swagger/OpenAPI description.

pub mod compiler;
pub mod config;
pub mod description;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod validation;

pub use compiler::{compile, CompiledDescription};
pub use config::GateConfig;
pub use description::{load_description, ApiDescription};
pub use http::{bind_controllers, ControllerRegistry, GateServer, GateState};
pub use lifecycle::{prepare_gate, Gate, Shutdown};
pub use validation::{GateRequest, Outcome, ValidationError, ValidationOrchestrator};
