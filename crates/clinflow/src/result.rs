//! Result and error types for Clinflow.

use thiserror::Error;

use crate::scenario::Stage;
use crate::session::BootstrapPhase;

/// Result type for Clinflow operations
pub type FlowResult<T> = Result<T, FlowError>;

/// Errors that can occur while driving a journey
#[derive(Debug, Error)]
pub enum FlowError {
    /// Expected element never appeared
    #[error("Element not found: {locator} (waited {ms}ms)")]
    NotFound {
        /// Locator description
        locator: String,
        /// Time spent polling
        ms: u64,
    },

    /// Condition not met within its budget
    #[error("Timed out after {ms}ms waiting for {condition}")]
    Timeout {
        /// What was being waited for
        condition: String,
        /// Budget in milliseconds
        ms: u64,
    },

    /// Observed state diverges from expected
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// An overlay expected to close did not
    #[error("Overlay '{overlay}' still visible after {ms}ms")]
    StaleOverlay {
        /// Overlay description
        overlay: String,
        /// Budget in milliseconds
        ms: u64,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Target surface adapter failure (CDP, script evaluation, ...)
    #[error("Surface error: {message}")]
    Surface {
        /// Error message
        message: String,
    },

    /// Operation called in the wrong session or UI state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Session bootstrap phase failed
    #[error("Bootstrap failed during {phase}: {source}")]
    Bootstrap {
        /// Phase that failed
        phase: BootstrapPhase,
        /// Underlying error
        #[source]
        source: Box<FlowError>,
    },

    /// Scenario stage failed
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        /// Stage that failed
        stage: Stage,
        /// Underlying error
        #[source]
        source: Box<FlowError>,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl FlowError {
    /// Create an assertion failure
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Create a surface adapter error
    #[must_use]
    pub fn surface(message: impl Into<String>) -> Self {
        Self::Surface {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Attribute this error to a bootstrap phase
    #[must_use]
    pub fn in_phase(self, phase: BootstrapPhase) -> Self {
        Self::Bootstrap {
            phase,
            source: Box::new(self),
        }
    }

    /// Attribute this error to a scenario stage
    #[must_use]
    pub fn in_stage(self, stage: Stage) -> Self {
        Self::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Stage the error was raised in, if attributed
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The innermost error, with stage and phase wrappers removed
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Stage { source, .. } | Self::Bootstrap { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_locator() {
        let err = FlowError::NotFound {
            locator: "role=button[name=\"Confirm\"]".to_string(),
            ms: 10_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("Confirm"));
        assert!(msg.contains("10000ms"));
    }

    #[test]
    fn test_stage_wrapping_keeps_root() {
        let err = FlowError::assertion("row missing")
            .in_phase(BootstrapPhase::Confirm)
            .in_stage(Stage::Bootstrap);
        assert_eq!(err.stage(), Some(Stage::Bootstrap));
        assert!(matches!(err.root(), FlowError::AssertionFailed { .. }));
        assert!(err.to_string().contains("bootstrap"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: FlowError = io_err.into();
        assert!(err.to_string().contains("I/O"));
    }
}
