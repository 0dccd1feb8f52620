// Subprocess adapter implementation
// reason: async-trait, tokio for async process management
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{info, warn, Instrument, Span};

use cachetool_core::application::constants::{
    DEFAULT_PHP_BINARY, DEFAULT_TIMEOUT, GRACEFUL_SHUTDOWN_TIMEOUT,
};
use cachetool_core::application::StagedFile;
use cachetool_core::domain::{AdapterResult, Code, STATUS_FAILED, STATUS_OK};
use cachetool_core::port::Adapter;
use cachetool_core::{CacheToolError, Result, TransportFault};

/// Subprocess adapter configuration
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Interpreter to run (looked up on PATH when not absolute)
    pub php_binary: PathBuf,
    /// Extra arguments placed before the script path
    pub php_args: Vec<String>,
    /// Wall-clock limit for one run
    pub timeout: Duration,
    /// Directory for staged snippets, OS temp dir when `None`
    pub temp_dir: Option<PathBuf>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            php_binary: PathBuf::from(DEFAULT_PHP_BINARY),
            php_args: vec!["-d".to_string(), "display_errors=stderr".to_string()],
            timeout: DEFAULT_TIMEOUT,
            temp_dir: None,
        }
    }
}

/// Process adapter
/// Runs each snippet in a fresh local interpreter process
pub struct ProcessAdapter {
    config: ProcessConfig,
    span: Span,
}

impl ProcessAdapter {
    /// Create a new process adapter
    ///
    /// # Example
    /// ```ignore
    /// let adapter = ProcessAdapter::new(ProcessConfig {
    ///     php_binary: "/usr/bin/php".into(),
    ///     ..ProcessConfig::default()
    /// });
    /// ```
    pub fn new(config: ProcessConfig) -> Self {
        let span = tracing::info_span!("process", binary = %config.php_binary.display());
        Self { config, span }
    }

    /// Scope every event of this adapter under `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    fn spawn(&self, staged: &StagedFile) -> Result<Child> {
        Command::new(&self.config.php_binary)
            .args(&self.config.php_args)
            .arg(staged.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CacheToolError::transport(
                    TransportFault::Refused,
                    format!(
                        "Could not spawn {}: {}",
                        self.config.php_binary.display(),
                        e
                    ),
                )
            })
    }

    /// Collect both pipes and the exit status, bounded by the configured timeout
    async fn wait_with_deadline(&self, mut child: Child) -> Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let collected = tokio::time::timeout(self.config.timeout, async {
            let (out, err, status) = tokio::join!(
                drain(stdout_pipe.as_mut(), &mut stdout),
                drain(stderr_pipe.as_mut(), &mut stderr),
                child.wait()
            );
            out.and(err).and(status)
        })
        .await;

        match collected {
            Ok(Ok(status)) => Ok((status, stdout, stderr)),
            Ok(Err(e)) => Err(CacheToolError::transport(
                TransportFault::Io,
                format!("Could not read interpreter output: {}", e),
            )),
            Err(_) => {
                terminate(&mut child).await;
                Err(CacheToolError::transport(
                    TransportFault::TimedOut,
                    format!(
                        "Interpreter did not finish within {}ms",
                        self.config.timeout.as_millis()
                    ),
                ))
            }
        }
    }

    async fn execute_staged(&mut self, code: &Code) -> Result<AdapterResult> {
        let staged = StagedFile::stage(code, self.config.temp_dir.as_deref())?;
        let started = Instant::now();

        info!(path = %staged.path().display(), "Starting interpreter");

        let outcome = match self.spawn(&staged) {
            Ok(child) => self.wait_with_deadline(child).await,
            Err(e) => Err(e),
        };
        // removal runs before any error is propagated
        let removed = staged.remove();

        let (status, stdout, stderr) = outcome?;
        removed?;

        let status_code = if status.success() {
            STATUS_OK
        } else {
            STATUS_FAILED
        };

        info!(
            duration_ms = %started.elapsed().as_millis(),
            exit_code = ?status.code(),
            status = status_code,
            "Interpreter finished"
        );

        Ok(AdapterResult::new(status_code, stdout, stderr))
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<&mut R>, buf: &mut Vec<u8>) -> std::io::Result<()> {
    match pipe {
        Some(pipe) => pipe.read_to_end(buf).await.map(|_| ()),
        None => Ok(()),
    }
}

/// SIGTERM first, SIGKILL if the process is still alive after the grace period
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            info!(pid = %pid, "Sending SIGTERM to timed-out interpreter");
            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                && tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, child.wait())
                    .await
                    .is_ok()
            {
                return;
            }
        }
    }

    warn!("Interpreter did not exit, sending SIGKILL");
    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill interpreter");
    }
}

#[async_trait]
impl Adapter for ProcessAdapter {
    fn name(&self) -> &'static str {
        "cli"
    }

    async fn execute(&mut self, code: &Code) -> Result<AdapterResult> {
        let span = self.span.clone();
        self.execute_staged(code).instrument(span).await
    }
}
