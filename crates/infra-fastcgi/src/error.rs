//! FastCGI error types and their mapping onto the CacheTool taxonomy.

use std::io;
use std::time::Duration;

use cachetool_core::{CacheToolError, TransportFault};
use thiserror::Error;

use crate::record::ProtocolStatus;

#[derive(Debug, Error)]
pub enum FastCgiError {
    #[error("invalid connection string `{0}`")]
    InvalidEndpoint(String),

    #[error("could not connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("connection closed by server before the request completed")]
    Closed,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("request rejected by server: {0}")]
    Rejected(ProtocolStatus),
}

impl FastCgiError {
    /// Transport fault class, `None` for protocol and configuration errors
    pub fn fault(&self) -> Option<TransportFault> {
        match self {
            FastCgiError::Connect { .. } => Some(TransportFault::Refused),
            FastCgiError::Closed => Some(TransportFault::Forbidden),
            FastCgiError::Timeout(_) => Some(TransportFault::TimedOut),
            FastCgiError::Io(e) => Some(match e.kind() {
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof => TransportFault::Forbidden,
                _ => TransportFault::Io,
            }),
            FastCgiError::InvalidEndpoint(_)
            | FastCgiError::Malformed(_)
            | FastCgiError::Rejected(_) => None,
        }
    }
}

impl From<FastCgiError> for CacheToolError {
    fn from(err: FastCgiError) -> Self {
        match err.fault() {
            Some(fault) => CacheToolError::transport(
                fault,
                format!("Could not connect to FastCGI server: {}", err),
            ),
            None => match err {
                FastCgiError::InvalidEndpoint(_) => CacheToolError::Configuration(err.to_string()),
                _ => CacheToolError::Protocol(err.to_string()),
            },
        }
    }
}
