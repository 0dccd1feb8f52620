// Adapter Port
// Abstraction for executing a code unit against a PHP runtime (subprocess or FastCGI pool)

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::{AdapterResult, Code, DecodedValue, ResultDecoder};
use crate::error::{CacheToolError, Result};

/// Execution backend
///
/// Implementations:
/// - ProcessAdapter: spawns a local `php` interpreter
/// - FastCgiAdapter: sends one request to a FastCGI process pool
///
/// Each instance owns its connection or process handle exclusively; `&mut self`
/// keeps a second request from ever sharing it.
#[async_trait]
pub trait Adapter: Send {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Execute the snippet and return the raw status and streams
    ///
    /// # Errors
    /// - CacheToolError::Staging if the snippet cannot be staged or removed
    /// - CacheToolError::Transport if the backend cannot be reached
    /// - CacheToolError::Protocol if the reply is malformed
    async fn execute(&mut self, code: &Code) -> Result<AdapterResult>;

    /// Execute and decode per the code's return convention
    ///
    /// # Errors
    /// Everything `execute` raises, plus CacheToolError::Execution when the
    /// snippet fails or its output does not decode
    async fn run(&mut self, code: Code) -> Result<DecodedValue> {
        let result = self.execute(&code).await?;
        debug!(
            adapter = self.name(),
            status = result.status_code,
            stdout_bytes = result.stdout.len(),
            stderr_bytes = result.stderr.len(),
            "Adapter returned"
        );
        ResultDecoder::decode(result, code.convention())
    }

    /// Fail fast when the runtime lacks `name`
    ///
    /// # Errors
    /// - CacheToolError::Configuration if the extension is not loaded
    async fn ensure_capability(&mut self, name: &str) -> Result<()> {
        let loaded = self.run(Code::extension_loaded(name)).await?;

        if loaded.as_json() == Some(&Value::Bool(true)) {
            info!(adapter = self.name(), capability = %name, "Capability present");
            Ok(())
        } else {
            Err(CacheToolError::Configuration(format!(
                "Extension `{}` is not loaded",
                name
            )))
        }
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted reply for one `execute` call
    #[derive(Debug)]
    pub enum MockReply {
        Result(AdapterResult),
        Error(CacheToolError),
    }

    impl MockReply {
        pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
            MockReply::Result(AdapterResult::new(200, stdout, Vec::new()))
        }
    }

    /// Mock Adapter replaying scripted replies and recording what it was sent
    pub struct MockAdapter {
        replies: VecDeque<MockReply>,
        executed: Arc<Mutex<Vec<Code>>>,
    }

    impl MockAdapter {
        pub fn new(replies: impl IntoIterator<Item = MockReply>) -> Self {
            Self {
                replies: replies.into_iter().collect(),
                executed: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Shared log of executed code units
        pub fn executed(&self) -> Arc<Mutex<Vec<Code>>> {
            self.executed.clone()
        }
    }

    #[async_trait]
    impl Adapter for MockAdapter {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn execute(&mut self, code: &Code) -> Result<AdapterResult> {
            self.executed.lock().unwrap().push(code.clone());

            match self.replies.pop_front() {
                Some(MockReply::Result(result)) => Ok(result),
                Some(MockReply::Error(err)) => Err(err),
                None => Err(CacheToolError::Protocol(
                    "mock adapter has no reply left".to_string(),
                )),
            }
        }
    }
}
