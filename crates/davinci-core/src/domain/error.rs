//! Domain-level error taxonomy for the Da Vinci Codex.

use serde::{Deserialize, Serialize};

/// Errors produced by registry lookups and registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("invention not found: {slug}")]
    NotFound { slug: String },

    #[error("invention slug registered twice: {slug}")]
    DuplicateSlug { slug: String },
}

/// Errors raised by a single pipeline stage.
///
/// Stage errors are values, not panics: they are carried inside run results
/// and run manifests, so they serialize and clone.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageError {
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error("simulation diverged in {solver} after {iterations} iterations (residual {residual:e})")]
    SimulationDivergence {
        solver: String,
        iterations: u64,
        residual: f64,
    },

    #[error("geometry error: {reason}")]
    Geometry { reason: String },

    #[error("stage {stage} timed out after {elapsed_ms}ms")]
    Timeout { stage: String, elapsed_ms: u64 },

    #[error("stage cancelled")]
    Cancelled,

    #[error("simulation result is missing metric: {name}")]
    MissingMetric { name: String },

    #[error("artifact write failed for {path}: {reason}")]
    Artifact { path: String, reason: String },

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl StageError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub fn geometry(reason: impl Into<String>) -> Self {
        Self::Geometry {
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "invalid_config",
            Self::SimulationDivergence { .. } => "simulation_divergence",
            Self::Geometry { .. } => "geometry",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled => "cancelled",
            Self::MissingMetric { .. } => "missing_metric",
            Self::Artifact { .. } => "artifact",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Top-level errors for library callers that are not tied to one stage.
#[derive(Debug, thiserror::Error)]
pub enum CodexError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("config parse error in {path}: {reason}")]
    ConfigParse { path: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for a single stage.
pub type StageResult<T> = std::result::Result<T, StageError>;

/// Result type for general codex operations.
pub type Result<T> = std::result::Result<T, CodexError>;
