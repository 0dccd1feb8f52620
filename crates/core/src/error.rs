// Central Error Type for CacheTool
// Every fault is normalized into one of these kinds before it leaves an Adapter.

use std::fmt;
use thiserror::Error;

/// Classification of a transport-level fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFault {
    /// Endpoint refused the connection or does not exist (socket missing, spawn failed)
    Refused,
    /// Peer closed or reset an open connection before the request completed
    Forbidden,
    /// Connect, read, write or subprocess wait exceeded its deadline
    TimedOut,
    /// Any other I/O failure
    Io,
}

impl TransportFault {
    /// Only a rejected in-flight connection is safe to replay on a fresh one
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportFault::Forbidden)
    }
}

impl fmt::Display for TransportFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFault::Refused => write!(f, "refused"),
            TransportFault::Forbidden => write!(f, "forbidden"),
            TransportFault::TimedOut => write!(f, "timed out"),
            TransportFault::Io => write!(f, "io"),
        }
    }
}

/// Application-level error type
#[derive(Error, Debug)]
pub enum CacheToolError {
    #[error("{0}")]
    Configuration(String),

    #[error("{message}")]
    Staging {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("{message} ({fault})")]
    Transport {
        fault: TransportFault,
        message: String,
    },

    #[error("{0}")]
    Protocol(String),

    #[error("status {status}: {stderr}: {stdout}")]
    Execution {
        status: u16,
        stderr: String,
        stdout: String,
    },
}

impl CacheToolError {
    pub fn staging(message: impl Into<String>, source: std::io::Error) -> Self {
        CacheToolError::Staging {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn transport(fault: TransportFault, message: impl Into<String>) -> Self {
        CacheToolError::Transport {
            fault,
            message: message.into(),
        }
    }

    /// Short name of the error kind, used for the single-line operator report
    pub fn kind(&self) -> &'static str {
        match self {
            CacheToolError::Configuration(_) => "Configuration",
            CacheToolError::Staging { .. } => "Staging",
            CacheToolError::Transport { .. } => "Transport",
            CacheToolError::Protocol(_) => "Protocol",
            CacheToolError::Execution { .. } => "Execution",
        }
    }

    /// Fault class when this is a transport error
    pub fn transport_fault(&self) -> Option<TransportFault> {
        match self {
            CacheToolError::Transport { fault, .. } => Some(*fault),
            _ => None,
        }
    }
}

/// Result type alias using CacheToolError
pub type Result<T> = std::result::Result<T, CacheToolError>;
