//! FastCGI connection strings.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::FastCgiError;

/// Socket checked first when no connection string is given
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/php5-fpm.sock";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9000;

/// `host:port` or a unix-domain socket path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

impl Endpoint {
    /// Well-known local socket if it exists, otherwise `127.0.0.1:9000`
    pub fn discover() -> Self {
        Self::discover_from(Path::new(DEFAULT_SOCKET_PATH))
    }

    pub fn discover_from(socket: &Path) -> Self {
        if socket.exists() {
            Endpoint::Unix(socket.to_path_buf())
        } else {
            Endpoint::Tcp {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
            }
        }
    }
}

impl FromStr for Endpoint {
    type Err = FastCgiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(path) = s.strip_prefix("unix://") {
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }

        match s.rsplit_once(':') {
            Some((host, port)) => {
                let port: u16 = port
                    .parse()
                    .map_err(|_| FastCgiError::InvalidEndpoint(s.to_string()))?;
                let host = host
                    .trim_start_matches("tcp://")
                    .trim_start_matches('[')
                    .trim_end_matches(']');
                if host.is_empty() {
                    return Err(FastCgiError::InvalidEndpoint(s.to_string()));
                }
                Ok(Endpoint::Tcp {
                    host: host.to_string(),
                    port,
                })
            }
            None if s.is_empty() => Err(FastCgiError::InvalidEndpoint(s.to_string())),
            None => Ok(Endpoint::Unix(PathBuf::from(s))),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { host, port } => write!(f, "{}:{}", host, port),
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}
