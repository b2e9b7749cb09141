//! Error types for the pipeflow engine.
//!
//! Every failure a pipeline run can produce is a variant of [`PipelineError`].
//! Parse-time problems surface before any element flows; stream-time problems
//! carry enough structure to tell which stage failed and on what.

use thiserror::Error;

/// The main error type for pipeline operations.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// The pipeline text could not be parsed or validated.
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// A command name matched no registered stage.
    #[error("{0}")]
    UnknownCommand(#[from] UnknownCommandError),

    /// A stage required an environment value that was not set.
    #[error("{0}")]
    MissingEnvironment(#[from] MissingEnvironmentError),

    /// A stage received an element of a shape it cannot process.
    #[error("{0}")]
    DataShape(#[from] DataShapeError),

    /// The graph store reported a failure.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// The pipeline run was cancelled.
    #[error("Pipeline cancelled: {0}")]
    Cancelled(String),
}

impl PipelineError {
    /// Creates a parse error from a message.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(ParseError::new(message))
    }

    /// Creates an unknown command error.
    #[must_use]
    pub fn unknown_command(name: impl Into<String>) -> Self {
        Self::UnknownCommand(UnknownCommandError::new(name))
    }

    /// Creates a missing environment error.
    #[must_use]
    pub fn missing_env(command: impl Into<String>, key: impl Into<String>) -> Self {
        Self::MissingEnvironment(MissingEnvironmentError::new(command, key))
    }

    /// Creates a data shape error.
    #[must_use]
    pub fn data_shape(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataShape(DataShapeError::new(stage, message))
    }

    /// Creates a cancellation error.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled(reason.into())
    }
}

/// Error raised when a pipeline expression or a stage argument is invalid.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    /// The error message.
    pub message: String,
}

impl ParseError {
    /// Creates a new parse error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error raised when a command name is not registered in any namespace.
#[derive(Debug, Clone, Error)]
#[error("Command '{name}' is not known")]
pub struct UnknownCommandError {
    /// The command name as written in the pipeline.
    pub name: String,
}

impl UnknownCommandError {
    /// Creates a new unknown command error.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Error raised when a stage needs an environment value that is missing.
#[derive(Debug, Clone, Error)]
#[error("Command '{command}' requires environment value '{key}'")]
pub struct MissingEnvironmentError {
    /// The stage that asked for the value.
    pub command: String,
    /// The missing environment key.
    pub key: String,
}

impl MissingEnvironmentError {
    /// Creates a new missing environment error.
    #[must_use]
    pub fn new(command: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            key: key.into(),
        }
    }
}

/// Error raised when a stream element does not have the shape a stage needs.
#[derive(Debug, Clone, Error)]
#[error("Command '{stage}' cannot process element: {message}")]
pub struct DataShapeError {
    /// The stage that rejected the element.
    pub stage: String,
    /// What was wrong with the element.
    pub message: String,
}

impl DataShapeError {
    /// Creates a new data shape error.
    #[must_use]
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Errors reported by a graph store backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The requested graph does not exist in the store.
    #[error("Graph '{name}' is not known")]
    UnknownGraph {
        /// The graph name.
        name: String,
    },

    /// A store call failed.
    #[error("Graph store call failed: {reason}")]
    Call {
        /// The reason for the failure.
        reason: String,
    },
}

impl StoreError {
    /// Creates an unknown graph error.
    #[must_use]
    pub fn unknown_graph(name: impl Into<String>) -> Self {
        Self::UnknownGraph { name: name.into() }
    }

    /// Creates a store call error.
    #[must_use]
    pub fn call(reason: impl Into<String>) -> Self {
        Self::Call {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = PipelineError::parse("chunk must be a positive number");
        assert_eq!(err.to_string(), "chunk must be a positive number");
    }

    #[test]
    fn test_unknown_command_display() {
        let err = PipelineError::unknown_command("tail");
        assert_eq!(err.to_string(), "Command 'tail' is not known");
    }

    #[test]
    fn test_missing_environment_display() {
        let err = PipelineError::missing_env("match", "graph");
        assert_eq!(
            err.to_string(),
            "Command 'match' requires environment value 'graph'"
        );
    }

    #[test]
    fn test_data_shape_display() {
        let err = PipelineError::data_shape("uniq", "arrays have no identity");
        assert_eq!(
            err.to_string(),
            "Command 'uniq' cannot process element: arrays have no identity"
        );
    }

    #[test]
    fn test_store_error_converts() {
        let err: PipelineError = StoreError::unknown_graph("prod").into();
        assert!(matches!(err, PipelineError::Store(_)));
        assert_eq!(err.to_string(), "Graph 'prod' is not known");
    }

    #[test]
    fn test_cancelled_display() {
        let err = PipelineError::cancelled("shutdown requested");
        assert_eq!(err.to_string(), "Pipeline cancelled: shutdown requested");
    }
}
