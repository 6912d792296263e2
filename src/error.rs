//! Dependency tracker error types and handling utilities
use std::path::PathBuf;

/// Main error type for dependency tracking operations
#[derive(Debug, thiserror::Error)]
pub enum DepInfoError {
    /// No node with this name exists in the registry
    #[error("Package info not found for {name}")]
    NotFound { name: String },
    /// The package source could not open or classify the artifact
    #[error("Unable to resolve {name}: {reason}")]
    Unresolvable { name: String, reason: String },
    /// The artifact resolved, but something in its closure did not
    #[error("Dependency {dependency} of {name} could not be resolved")]
    DependencyUnresolvable { name: String, dependency: String },
    /// Concurrent resolution stopped before the work list drained
    #[error("Dependency resolution was cancelled")]
    Cancelled,
    /// Configuration could not be loaded
    #[error("Config error in {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
    /// Wrapped anyhow error for lower-level failures
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DepInfoError {
    /// Per-query failures that leave the rest of the registry usable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            DepInfoError::NotFound { .. } => true,
            DepInfoError::Unresolvable { .. } => true,
            DepInfoError::DependencyUnresolvable { .. } => true,
            DepInfoError::Cancelled => true,
            DepInfoError::Config { .. } => false,
            DepInfoError::Other(_) => false,
        }
    }
}

pub type Result<T, E = DepInfoError> = std::result::Result<T, E>;
