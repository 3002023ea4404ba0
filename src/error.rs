//! Error types for keyshell.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for keyshell operations.
#[derive(Error, Debug)]
pub enum KeyshellError {
    /// The session directory could not be created.
    #[error("cannot create session directory {}: {source}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backend failed to spawn a session.
    #[error("session creation failed: {0}")]
    SessionCreation(String),

    /// The session's handle is no longer live.
    #[error("session is no longer live: {0}")]
    DeadSession(String),

    /// No tracked session carries the given name.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A string could not be parsed as a canonical session name.
    #[error("invalid session name: {0}")]
    InvalidSessionName(String),

    /// Backend-specific failure outside of session creation.
    #[error("backend error: {0}")]
    Backend(String),

    /// The home directory could not be determined.
    #[error("home directory not found")]
    NoHomeDirectory,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for keyshell operations.
pub type Result<T> = std::result::Result<T, KeyshellError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_not_found_display() {
        let err = KeyshellError::SessionNotFound("1.build.kernel".into());
        assert!(err.to_string().contains("1.build.kernel"));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_directory_creation_display() {
        let err = KeyshellError::DirectoryCreation {
            path: PathBuf::from("/sessions/kernel/1"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/sessions/kernel/1"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: KeyshellError = io_err.into();
        assert!(matches!(err, KeyshellError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_dead_session_display() {
        let err = KeyshellError::DeadSession("2.git.kernel".into());
        assert!(err.to_string().contains("no longer live"));
        assert!(err.to_string().contains("2.git.kernel"));
    }
}
