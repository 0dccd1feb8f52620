// Application Layer - staging, retry policy and the call facade

pub mod cache_tool;
pub mod constants;
pub mod retry;
pub mod staging;

// Re-exports
pub use cache_tool::CacheTool;
pub use retry::{RetryDecision, RetryPolicy};
pub use staging::StagedFile;
