//! Error types for the Nodal simulation engine.
//!
//! This module provides a unified error type [`NodalError`] that covers
//! circuit construction, property validation and every numerical failure
//! an analysis can hit. None of these errors are retried internally: they
//! abort the analysis in progress and surface to the caller.

use thiserror::Error;

/// Result type alias using [`NodalError`].
pub type Result<T> = std::result::Result<T, NodalError>;

/// Unified error type for all Nodal operations.
#[derive(Error, Debug)]
pub enum NodalError {
    // ============ Circuit Construction Errors ============
    /// Node identifier already present in the circuit
    #[error("Duplicate node '{name}'")]
    DuplicateNode { name: String },

    /// Device instance identifier already present in the circuit
    #[error("Duplicate device instance '{name}'")]
    DuplicateDevice { name: String },

    /// Model name already registered
    #[error("Duplicate model '{name}'")]
    DuplicateModel { name: String },

    /// Device connected to the wrong number of nodes
    #[error("Device '{device}' expects {expected} terminals, got {found}")]
    TerminalCount {
        device: String,
        expected: usize,
        found: usize,
    },

    /// No device class registered under this id
    #[error("Unknown device class '{class}'")]
    UnknownDeviceClass { class: String },

    /// Node not found in circuit
    #[error("Node '{node}' not found in circuit")]
    NodeNotFound { node: String },

    /// Device instance not found in circuit
    #[error("Device '{device}' not found in circuit")]
    DeviceNotFound { device: String },

    /// Undefined model reference
    #[error("Undefined model '{model}' referenced by device '{device}'")]
    UndefinedModel { model: String, device: String },

    /// Model bound to another device class
    #[error("Model '{model}' is a '{model_class}' model, device '{device}' is a '{device_class}'")]
    ModelClassMismatch {
        model: String,
        model_class: String,
        device: String,
        device_class: String,
    },

    // ============ Property Validation Errors ============
    /// Property name not in the device schema
    #[error("Unknown property '{property}'")]
    UnknownProperty { property: String },

    /// Property value violates its schema entry
    #[error("Invalid value for property '{property}': {message}")]
    InvalidProperty { property: String, message: String },

    /// Property without default was never set
    #[error("Missing required property '{property}'")]
    MissingProperty { property: String },

    /// Sweep or parameter variable does not name anything in the circuit
    #[error("Unknown circuit parameter '{name}'")]
    UnknownParameter { name: String },

    // ============ Simulation Errors ============
    /// Matrix is singular and cannot be solved
    #[error("Singular matrix at pivot {index} - circuit may have a short circuit or floating node")]
    SingularMatrix { index: usize },

    /// Newton-Raphson iteration did not converge
    #[error("Newton-Raphson did not converge after {iterations} iterations (worst: {unknown})")]
    ConvergenceFailure { iterations: usize, unknown: String },

    /// Predictor-corrector loop did not settle
    #[error("Corrector did not settle after {iterations} iterations at t={time:.3e}")]
    CorrectorFailure { iterations: usize, time: f64 },

    /// Capacitor or inductor with zero value
    #[error("Device '{device}' has zero {quantity}")]
    ZeroReactance { device: String, quantity: &'static str },

    /// A transient time step failed
    #[error("Transient step at t={time:.6e} failed: {source}")]
    StepFailed {
        time: f64,
        #[source]
        source: Box<NodalError>,
    },

    /// Invalid simulation parameter
    #[error("Invalid simulation parameter: {message}")]
    InvalidSimulationParam { message: String },
}

impl NodalError {
    /// Create an invalid property error
    pub fn invalid_property(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidProperty {
            property: property.into(),
            message: message.into(),
        }
    }

    /// Create a convergence failure error
    pub fn convergence_failure(iterations: usize, unknown: impl Into<String>) -> Self {
        Self::ConvergenceFailure {
            iterations,
            unknown: unknown.into(),
        }
    }

    /// Create an invalid simulation parameter error
    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::InvalidSimulationParam {
            message: message.into(),
        }
    }

    /// The circuit gained unknowns since its last reset, or was never reset
    pub fn not_reset() -> Self {
        Self::invalid_param("circuit must be reset before solving")
    }

    /// Wrap an error raised while solving the time step at `time`
    pub fn step_failed(time: f64, source: NodalError) -> Self {
        Self::StepFailed {
            time,
            source: Box::new(source),
        }
    }

    /// Whether this error came from the linear solver finding a zero pivot.
    pub fn is_singular(&self) -> bool {
        match self {
            Self::SingularMatrix { .. } => true,
            Self::StepFailed { source, .. } => source.is_singular(),
            _ => false,
        }
    }
}
