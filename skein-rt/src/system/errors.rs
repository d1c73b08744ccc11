//! System-level error types.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
// (none)

/// Errors from spawning actors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpawnError {
    /// The system no longer accepts new actors.
    #[error("system shutdown in progress")]
    ShuttingDown,

    /// The requested name is already registered.
    #[error("actor name already taken: {0}")]
    NameTaken(String),
}

/// System-level errors for runtime operations.
#[derive(Error, Debug)]
pub enum SystemError {
    /// Configuration validation failed.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The system is already shutting down or stopped.
    #[error("system shutdown in progress")]
    ShuttingDown,

    /// Actors failed to drain within the shutdown grace period.
    #[error("shutdown grace period exceeded after {0:?}")]
    ShutdownTimeout(Duration),

    /// Spawn failure surfaced at the system level.
    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

impl SystemError {
    /// Whether the system cannot continue operating.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SystemError::ShuttingDown | SystemError::ShutdownTimeout(_)
        )
    }

    /// Whether the error can be handled without stopping the system.
    pub fn is_recoverable(&self) -> bool {
        !self.is_fatal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = SystemError::ConfigError(String::from("scheduler.workers must be > 0"));
        assert!(err.to_string().contains("configuration error"));
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn test_shutdown_timeout_display() {
        let err = SystemError::ShutdownTimeout(Duration::from_secs(5));
        assert!(err.to_string().contains("grace period"));
        assert!(err.is_fatal());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_spawn_error_conversion() {
        let err: SystemError = SpawnError::NameTaken(String::from("worker")).into();
        assert!(err.to_string().contains("worker"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_name_taken_display() {
        let err = SpawnError::NameTaken(String::from("registrar"));
        assert_eq!(err.to_string(), "actor name already taken: registrar");
    }
}
