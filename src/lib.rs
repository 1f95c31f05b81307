//! This crate contains the core logic of the sqlchain statement pipeline.
//!
//! A [`Pipeline`] sits in front of a database connection (anything that
//! implements [`Queryer`]) and runs every `exec`, `query_many` and
//! `query_one` call through an ordered chain of [`Interceptor`]s before the
//! statement reaches the connection.
//!
//! ```
//! use sqlchain::{args, Pipeline, QueryContext, Queryer, SqlResult, Value};
//!
//! struct Db;
//!
//! impl Queryer for Db {
//!     type ExecResult = u64;
//!     type Rows = Vec<String>;
//!     type Row = Option<String>;
//!
//!     fn exec(&self, _ctx: &QueryContext, _query: &str, args: &[Value]) -> SqlResult<u64> {
//!         Ok(args.len() as u64)
//!     }
//!
//!     fn query_many(&self, _ctx: &QueryContext, query: &str, _args: &[Value]) -> SqlResult<Vec<String>> {
//!         Ok(vec![query.to_string()])
//!     }
//!
//!     fn query_one(&self, _ctx: &QueryContext, query: &str, _args: &[Value]) -> Option<String> {
//!         Some(query.to_string())
//!     }
//! }
//!
//! let pipeline = Pipeline::new(Db);
//! pipeline.register_fn("audit", |req, next| {
//!     let query = format!("/* audit */ {}", req.query());
//!     req.set_query(query);
//!     next.run(req);
//! });
//!
//! let rows = pipeline
//!     .query_many(&QueryContext::background(), "SELECT 1", args![])
//!     .unwrap();
//! assert_eq!(rows, vec!["/* audit */ SELECT 1".to_string()]);
//! ```

pub mod config;
pub mod core;
pub mod interceptor;
pub mod logging;
pub mod pipeline;

pub use crate::core::{
    from_fn, Interceptor, Next, Operation, Outcome, QueryContext, Queryer, Request, SqlError,
    SqlResult, Value,
};
pub use interceptor::InterceptorRegistry;
pub use pipeline::Pipeline;
