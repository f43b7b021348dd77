//! gcompute Common Library
//!
//! Shared types for the operation waiter and the resource lifecycle layer.

pub mod error;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use error::{ApiError, Error, Result};
pub use types::*;
pub use value::{AttrValue, Attributes};
