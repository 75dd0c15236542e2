/// Unified error handling for relevo
///
/// Two layers live here: `OperationError` is what a caller's operation
/// reports back for a single node, `RelevoError` is what the router hands
/// back to the caller once it has decided to stop failing over.

use std::fmt;
use std::io;
use thiserror::Error;

use crate::core::OperationKind;

pub use crate::config::ConfigError;

/// Main error type for relevo routing operations
#[derive(Debug, Error)]
pub enum RelevoError {
    /// The operation failed on a node and the failure was not absorbed by failover
    #[error("Operation failed: {0}")]
    Operation(#[from] OperationError),

    /// Every candidate node was skipped or failed
    #[error(
        "Attempted to connect to master and all replicas have failed, giving up. \
         Failed to get in touch with any of the {attempted} instances"
    )]
    Exhausted { attempted: usize },

    /// The failover policy forbids sending this operation to a secondary
    #[error("Could not send {kind} operation to secondary node, failover behavior is: {policy}")]
    PolicyViolation { kind: OperationKind, policy: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Topology document errors
    #[error("Topology error: {message}")]
    Topology { message: String },

    /// Internal errors (should not happen in normal operation)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Failure reported by an operation against a single endpoint
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("Request timed out: {message}")]
    Timeout { message: String },

    #[error("Connection refused by {address}")]
    ConnectionRefused { address: String },

    #[error("Could not resolve {host}")]
    NameResolution { host: String },

    #[error("Connection closed: {message}")]
    ConnectionClosed { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Application error: {message}")]
    Application { message: String },
}

/// How the executor should treat a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The node looks unreachable; fail over to the next candidate
    ServerDown { timed_out: bool },
    /// HTTP 401
    Unauthorized,
    /// Anything else; retrying on another node would not help
    Fatal,
}

/// Result type alias for relevo operations
pub type RelevoResult<T> = Result<T, RelevoError>;

impl RelevoError {
    /// Create a topology error
    pub fn topology<S: Into<String>>(message: S) -> Self {
        RelevoError::Topology {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        RelevoError::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (a later call may succeed)
    pub fn is_recoverable(&self) -> bool {
        match self {
            RelevoError::Exhausted { .. } => true,
            RelevoError::Operation(e) => matches!(e.classify(), FailureClass::ServerDown { .. }),
            RelevoError::Topology { .. } => true,
            _ => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RelevoError::Config(_) => ErrorSeverity::Critical,
            RelevoError::Internal { .. } => ErrorSeverity::Critical,
            RelevoError::Exhausted { .. } => ErrorSeverity::Error,
            RelevoError::PolicyViolation { .. } => ErrorSeverity::Error,
            RelevoError::Operation(_) => ErrorSeverity::Warning,
            RelevoError::Topology { .. } => ErrorSeverity::Info,
        }
    }
}

impl OperationError {
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        OperationError::Timeout {
            message: message.into(),
        }
    }

    pub fn connection_refused<S: Into<String>>(address: S) -> Self {
        OperationError::ConnectionRefused {
            address: address.into(),
        }
    }

    pub fn name_resolution<S: Into<String>>(host: S) -> Self {
        OperationError::NameResolution { host: host.into() }
    }

    pub fn http<S: Into<String>>(status: u16, message: S) -> Self {
        OperationError::Http {
            status,
            message: message.into(),
        }
    }

    pub fn application<S: Into<String>>(message: S) -> Self {
        OperationError::Application {
            message: message.into(),
        }
    }

    /// Classify the failure for failover purposes
    pub fn classify(&self) -> FailureClass {
        match self {
            OperationError::Timeout { .. } => FailureClass::ServerDown { timed_out: true },
            OperationError::ConnectionRefused { .. }
            | OperationError::NameResolution { .. }
            | OperationError::ConnectionClosed { .. } => FailureClass::ServerDown { timed_out: false },
            OperationError::Io(e) => match e.kind() {
                io::ErrorKind::TimedOut => FailureClass::ServerDown { timed_out: true },
                _ => FailureClass::ServerDown { timed_out: false },
            },
            OperationError::Http { status, .. } => match status {
                408 | 504 => FailureClass::ServerDown { timed_out: true },
                502 | 503 => FailureClass::ServerDown { timed_out: false },
                401 => FailureClass::Unauthorized,
                _ => FailureClass::Fatal,
            },
            OperationError::Application { .. } => FailureClass::Fatal,
        }
    }

    pub fn is_server_down(&self) -> bool {
        matches!(self.classify(), FailureClass::ServerDown { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        self.classify() == FailureClass::Unauthorized
    }
}

/// Error severity levels for logging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical errors that require immediate attention
    Critical,
    /// Errors that affect functionality but don't crash the system
    Error,
    /// Warnings about potential issues
    Warning,
    /// Informational messages about recoverable issues
    Info,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Warning => write!(f, "WARNING"),
            ErrorSeverity::Info => write!(f, "INFO"),
        }
    }
}
