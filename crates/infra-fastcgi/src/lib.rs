//! CacheTool FastCGI infrastructure.
//!
//! Implements the `Adapter` port by speaking the FastCGI wire protocol to a
//! PHP-FPM pool over TCP or a unix-domain socket.

pub mod adapter;
pub mod client;
pub mod endpoint;
pub mod error;
pub mod params;
pub mod record;

pub use adapter::{FastCgiAdapter, FastCgiConfig};
pub use client::{ClientOptions, FastCgiClient, FastCgiResponse};
pub use endpoint::Endpoint;
pub use error::FastCgiError;
pub use params::Params;
pub use record::{Record, RecordCodec, RecordType};
