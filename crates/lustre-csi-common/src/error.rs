//! Error types for the node agent.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`CsiError`].
pub type CsiResult<T> = Result<T, CsiError>;

/// Status class of a [`CsiError`], one per CSI/gRPC status code the node
/// agent can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The request was malformed.
    InvalidArgument,
    /// A path expected to exist is gone.
    NotFound,
    /// The node is not in a state where the operation can run.
    FailedPrecondition,
    /// A mount, unmount or filesystem operation failed.
    Internal,
    /// The operation is not supported by this driver.
    Unimplemented,
    /// The driver is not configured well enough to answer.
    Unavailable,
}

impl ErrorCode {
    /// Canonical upper-case name, as used by gRPC status codes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Internal => "INTERNAL",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Unavailable => "UNAVAILABLE",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by node and identity operations.
#[derive(Error, Diagnostic, Debug)]
pub enum CsiError {
    /// Missing or malformed request field.
    #[error("Invalid argument: {message}")]
    #[diagnostic(code(lustre_csi::invalid_argument))]
    InvalidArgument {
        /// What was wrong with the request.
        message: String,
    },

    /// Path not found.
    #[error("Not found: {message}")]
    #[diagnostic(code(lustre_csi::not_found))]
    NotFound {
        /// What could not be found.
        message: String,
    },

    /// Node state does not allow the operation.
    #[error("Failed precondition: {message}")]
    #[diagnostic(code(lustre_csi::failed_precondition))]
    FailedPrecondition {
        /// The violated precondition.
        message: String,
    },

    /// Mount, unmount or directory operation failed.
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(lustre_csi::internal),
        help("Check the node's mount table and the agent logs for the failing path")
    )]
    Internal {
        /// The error message, including source and target paths.
        message: String,
    },

    /// Operation not supported by this driver.
    #[error("Operation not implemented: {operation}")]
    #[diagnostic(code(lustre_csi::unimplemented))]
    Unimplemented {
        /// The unsupported operation.
        operation: String,
    },

    /// Driver is missing configuration.
    #[error("Unavailable: {message}")]
    #[diagnostic(code(lustre_csi::unavailable))]
    Unavailable {
        /// The missing piece of configuration.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(lustre_csi::io))]
    Io(#[from] std::io::Error),
}

impl CsiError {
    /// Build an [`CsiError::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Build a [`CsiError::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Build a [`CsiError::FailedPrecondition`].
    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::FailedPrecondition {
            message: message.into(),
        }
    }

    /// Build an [`CsiError::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Build an [`CsiError::Unimplemented`].
    pub fn unimplemented(operation: impl Into<String>) -> Self {
        Self::Unimplemented {
            operation: operation.into(),
        }
    }

    /// Build an [`CsiError::Unavailable`].
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Status class of this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::FailedPrecondition { .. } => ErrorCode::FailedPrecondition,
            Self::Internal { .. } | Self::Io(_) => ErrorCode::Internal,
            Self::Unimplemented { .. } => ErrorCode::Unimplemented,
            Self::Unavailable { .. } => ErrorCode::Unavailable,
        }
    }
}
