// CacheTool facade - the single entry point commands go through

use tracing::{info, Instrument};

use crate::domain::{Code, DecodedValue};
use crate::error::Result;
use crate::port::Adapter;

/// Wraps one adapter; every call checks its capability before dispatching
pub struct CacheTool {
    adapter: Box<dyn Adapter>,
}

impl CacheTool {
    pub fn new(adapter: Box<dyn Adapter>) -> Self {
        Self { adapter }
    }

    pub fn adapter_name(&self) -> &'static str {
        self.adapter.name()
    }

    /// Verify `capability`, then run `code`
    ///
    /// No part of `code` is sent when the capability check fails.
    ///
    /// # Errors
    /// - CacheToolError::Configuration if the capability is missing
    /// - any error raised by `Adapter::run`
    pub async fn call(&mut self, capability: &str, code: Code) -> Result<DecodedValue> {
        let span = tracing::info_span!("call", adapter = self.adapter.name(), capability = %capability);
        self.checked_run(capability, code).instrument(span).await
    }

    async fn checked_run(&mut self, capability: &str, code: Code) -> Result<DecodedValue> {
        self.adapter.ensure_capability(capability).await?;
        let value = self.adapter.run(code).await?;
        info!("Call completed");
        Ok(value)
    }

    /// Run `code` without a capability check
    pub async fn run(&mut self, code: Code) -> Result<DecodedValue> {
        self.adapter.run(code).await
    }
}
