//! Error types for cdhooks-core operations.
//!
//! Only `MissingDependency` and `NavigationFailure` abort a transition outright.
//! Everything else that goes wrong mid-transition is downgraded to a
//! [`Diagnostic`](crate::diagnostics::Diagnostic) and the transition continues.

use std::path::PathBuf;

/// All errors that can occur in cdhooks-core operations.
#[derive(Debug, thiserror::Error)]
pub enum CdhooksError {
    // ─────────────────────────────────────────────────────────────────────
    // Transition-Aborting Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Required dependency missing: {dependency}")]
    MissingDependency { dependency: String },

    #[error("Cannot change directory to {path}: {source}")]
    NavigationFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found; set CDHOOKS_HOME")]
    HomeDirNotFound,

    #[error("Invalid path: {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    // ─────────────────────────────────────────────────────────────────────
    // Hook Queue Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Leave hooks can only be registered while a leave script is running")]
    HookOutsideLeave,

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Script execution failed: {command}: {details}")]
    CommandFailed { command: String, details: String },
}

impl CdhooksError {
    pub fn missing_dependency(dependency: impl Into<String>) -> Self {
        CdhooksError::MissingDependency {
            dependency: dependency.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        CdhooksError::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit code a CLI should surface for this error.
    ///
    /// Navigation failures propagate the OS error code so that a wrapped `cd`
    /// behaves like the builtin it wraps.
    pub fn exit_code(&self) -> i32 {
        match self {
            CdhooksError::NavigationFailure { source, .. } => {
                source.raw_os_error().filter(|code| *code > 0).unwrap_or(1)
            }
            _ => 1,
        }
    }

    /// Whether this error must be shown even in quiet mode.
    pub fn is_always_reported(&self) -> bool {
        matches!(self, CdhooksError::MissingDependency { .. })
    }
}

/// Convenience type alias for Results using CdhooksError.
pub type Result<T> = std::result::Result<T, CdhooksError>;

impl From<CdhooksError> for String {
    fn from(err: CdhooksError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_failure_uses_os_code() {
        let err = CdhooksError::NavigationFailure {
            path: PathBuf::from("/nope"),
            source: std::io::Error::from_raw_os_error(2),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn navigation_failure_without_os_code_is_one() {
        let err = CdhooksError::NavigationFailure {
            path: PathBuf::from("/nope"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "synthetic"),
        };
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn missing_dependency_is_always_reported() {
        assert!(CdhooksError::missing_dependency("session store").is_always_reported());
        assert!(!CdhooksError::HookOutsideLeave.is_always_reported());
    }
}
