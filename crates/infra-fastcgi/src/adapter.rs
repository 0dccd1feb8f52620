//! FastCGI adapter: stages the snippet, points a request at it, replays once
//! on a rejected connection.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn, Instrument, Span};

use cachetool_core::application::constants::DEFAULT_TIMEOUT;
use cachetool_core::application::{RetryDecision, RetryPolicy, StagedFile};
use cachetool_core::domain::{AdapterResult, Code};
use cachetool_core::port::Adapter;
use cachetool_core::Result;

use crate::client::{ClientOptions, FastCgiClient, FastCgiResponse};
use crate::endpoint::Endpoint;
use crate::error::FastCgiError;
use crate::params::Params;
use crate::record::MAX_CONTENT_LENGTH;

/// FastCGI adapter configuration
#[derive(Debug, Clone)]
pub struct FastCgiConfig {
    pub endpoint: Endpoint,
    pub read_write_timeout: Duration,
    /// Keep one connection open for the life of the adapter
    pub keep_alive: bool,
    /// Socket shared across processes; not supported, the connection never
    /// outlives the adapter
    pub persistent: bool,
    /// Directory for staged snippets, OS temp dir when `None`
    pub temp_dir: Option<PathBuf>,
    pub max_record_content: usize,
}

impl FastCgiConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            read_write_timeout: DEFAULT_TIMEOUT,
            keep_alive: true,
            persistent: false,
            temp_dir: None,
            max_record_content: MAX_CONTENT_LENGTH,
        }
    }
}

impl Default for FastCgiConfig {
    fn default() -> Self {
        Self::new(Endpoint::discover())
    }
}

pub struct FastCgiAdapter {
    client: FastCgiClient,
    temp_dir: Option<PathBuf>,
    retry: RetryPolicy,
    suppressed_faults: u32,
    span: Span,
}

impl FastCgiAdapter {
    pub fn new(config: FastCgiConfig) -> Self {
        let span = tracing::info_span!("fastcgi", endpoint = %config.endpoint);
        if config.persistent {
            span.in_scope(|| {
                warn!("Persistent sockets are not supported, using a per-adapter connection")
            });
        }
        let options = ClientOptions {
            read_write_timeout: config.read_write_timeout,
            keep_alive: config.keep_alive,
            max_record_content: config.max_record_content,
        };

        Self {
            client: FastCgiClient::new(config.endpoint, options),
            temp_dir: config.temp_dir,
            retry: RetryPolicy::single(),
            suppressed_faults: 0,
            span,
        }
    }

    /// Scope every event of this adapter under `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.client.endpoint()
    }

    /// Transient faults absorbed by the retry policy so far
    pub fn suppressed_faults(&self) -> u32 {
        self.suppressed_faults
    }

    async fn send(&mut self, params: &Params) -> std::result::Result<FastCgiResponse, FastCgiError> {
        let mut attempt = 0;
        loop {
            match self.client.request(params, &[]).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    let decision = err
                        .fault()
                        .map_or(RetryDecision::GiveUp, |fault| {
                            self.retry.should_retry(fault, attempt)
                        });
                    if decision == RetryDecision::GiveUp {
                        return Err(err);
                    }

                    warn!(attempt = %attempt, error = %err, "Connection rejected, retrying on a fresh connection");
                    self.client.close();
                    self.suppressed_faults += 1;
                    attempt += 1;
                }
            }
        }
    }
}

fn request_params(staged: &StagedFile) -> Params {
    let mut params = Params::new();
    params.insert("REQUEST_METHOD".to_string(), "POST".to_string());
    params.insert("REQUEST_URI".to_string(), "/".to_string());
    params.insert(
        "SCRIPT_FILENAME".to_string(),
        staged.path().to_string_lossy().into_owned(),
    );
    params
}

#[async_trait]
impl Adapter for FastCgiAdapter {
    fn name(&self) -> &'static str {
        "fastcgi"
    }

    async fn execute(&mut self, code: &Code) -> Result<AdapterResult> {
        let span = self.span.clone();
        self.execute_staged(code).instrument(span).await
    }
}

impl FastCgiAdapter {
    async fn execute_staged(&mut self, code: &Code) -> Result<AdapterResult> {
        let staged = StagedFile::stage(code, self.temp_dir.as_deref())?;
        let params = request_params(&staged);

        let outcome = self.send(&params).await;
        // removal runs before any error is propagated
        let removed = staged.remove();

        let response = outcome?;
        removed?;

        info!(
            status = response.status_code,
            app_status = response.app_status,
            "FastCGI request completed"
        );
        debug!(response = ?String::from_utf8_lossy(&response.body), "FastCGI response");

        Ok(AdapterResult::new(
            response.status_code,
            response.body,
            response.stderr,
        ))
    }
}
