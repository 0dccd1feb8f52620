// CacheTool Core - Code Units, Decoding & Ports
// NO socket or subprocess dependencies (hexagonal architecture)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{CacheToolError, Result, TransportFault};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
