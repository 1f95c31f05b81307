//! Core abstractions for sqlchain
//!
//! This module provides the request entity, the collaborator and interceptor
//! contracts, the chain runner and the terminal dispatcher that together form
//! the statement pipeline.

pub mod chain;
pub mod context;
pub(crate) mod dispatch;
pub mod error;
pub mod request;
pub mod traits;
pub mod value;

#[cfg(test)]
pub(crate) mod mock;

// Re-export commonly used types
pub use chain::Next;
pub use context::QueryContext;
pub use error::{ErrorContext, SqlError, SqlResult};
pub use request::{Operation, Outcome, Request};
pub use traits::{from_fn, FnInterceptor, Interceptor, Queryer};
pub use value::Value;
