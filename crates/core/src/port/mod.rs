// Port Layer - Interfaces for execution backends

pub mod adapter;

// Re-exports
pub use adapter::Adapter;
