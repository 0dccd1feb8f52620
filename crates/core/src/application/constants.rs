// Shared constants (no magic values)
use std::time::Duration;

/// Deadline for every socket read/write and subprocess wait (60s)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Grace period between SIGTERM and SIGKILL for a timed-out subprocess (1s)
pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Interpreter binary used by the subprocess adapter
pub const DEFAULT_PHP_BINARY: &str = "php";
