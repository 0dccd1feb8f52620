// CacheTool Infrastructure - System Adapters
// Implements: Adapter (local php-cli subprocess)

pub mod process_adapter;

pub use process_adapter::{ProcessAdapter, ProcessConfig};
