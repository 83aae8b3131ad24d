//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the API description
//! - Compile it into rules and the path index
//! - Build the orchestrator around the compiled state
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - File IO and compilation run off the async executor
//! - The gate is never served before compilation finishes

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::compiler::{compile, CompileError, CompiledDescription};
use crate::config::ValidationConfig;
use crate::description::{load_description, ApiDescription, LoadError};
use crate::validation::{ParameterValidator, RuleRejected, ValidationOrchestrator};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load description: {0}")]
    Load(#[from] LoadError),

    #[error("failed to compile description: {0}")]
    Compile(#[from] CompileError),

    #[error("rule rejected by validator: {0}")]
    Rule(#[from] RuleRejected),

    #[error("startup task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A compiled, ready-to-serve gate.
pub struct Gate {
    pub compiled: Arc<CompiledDescription>,
    pub orchestrator: Arc<ValidationOrchestrator>,
}

/// Load, compile and wire the gate from a description file.
pub async fn prepare_gate(path: &Path, config: &ValidationConfig) -> Result<Gate, StartupError> {
    let path: PathBuf = path.to_path_buf();
    let description = tokio::task::spawn_blocking(move || load_description(&path)).await??;

    let config = config.clone();
    tokio::task::spawn_blocking(move || prepare_gate_from(&description, &config)).await?
}

/// Compile and wire the gate from an already parsed description.
pub fn prepare_gate_from(description: &ApiDescription, config: &ValidationConfig) -> Result<Gate, StartupError> {
    let compiled = Arc::new(compile(description)?);
    let validator = ParameterValidator::new().with_convert(config.convert_strings);
    let orchestrator = ValidationOrchestrator::new(compiled.clone(), validator, config.mode)?;

    tracing::info!(
        templates = compiled.paths.len(),
        operations = compiled.rules.len(),
        controllers = compiled.controllers.len(),
        mode = ?config.mode,
        "Gate ready"
    );

    Ok(Gate {
        compiled,
        orchestrator: Arc::new(orchestrator),
    })
}
