// Domain Layer - snippets and their results

pub mod code;
pub mod literal;
pub mod result;
pub mod value;

// Re-exports
pub use code::{Code, ReturnConvention};
pub use literal::php_literal;
pub use result::{AdapterResult, ResultDecoder, STATUS_FAILED, STATUS_OK};
pub use value::DecodedValue;
