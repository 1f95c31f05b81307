//! Per-call request state
//!
//! A [`Request`] is created fresh for every pipeline call, threaded through
//! the interceptor chain and the terminal dispatcher, and consumed when the
//! caller's result is unpacked. It is the only channel interceptors and the
//! dispatcher use to talk to each other.

use std::{any::Any, collections::HashMap, fmt, time::Instant};

use serde::{Deserialize, Serialize};

use super::{
    context::QueryContext,
    error::{SqlError, SqlResult},
    traits::Queryer,
    value::Value,
};

/// The three statement kinds a pipeline can run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// A command that returns no rows (INSERT, UPDATE, DELETE, DDL)
    Exec,
    /// A query returning any number of rows
    QueryMany,
    /// A query returning at most one row
    QueryOne,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Exec => "exec",
            Operation::QueryMany => "query_many",
            Operation::QueryOne => "query_one",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The populated result slot of a request, keyed by operation.
pub enum Outcome<Q: Queryer> {
    Exec(Q::ExecResult),
    Rows(Q::Rows),
    Row(Q::Row),
}

impl<Q: Queryer> Outcome<Q> {
    pub fn operation(&self) -> Operation {
        match self {
            Outcome::Exec(_) => Operation::Exec,
            Outcome::Rows(_) => Operation::QueryMany,
            Outcome::Row(_) => Operation::QueryOne,
        }
    }
}

impl<Q: Queryer> fmt::Debug for Outcome<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Outcome::{}", self.operation())
    }
}

/// Mutable record of a single statement moving through the pipeline.
pub struct Request<Q: Queryer> {
    operation: Operation,
    query: String,
    args: Vec<Value>,
    ctx: QueryContext,

    outcome: Option<Outcome<Q>>,
    error: Option<SqlError>,

    /// Custom variables available to interceptors (type-erased, thread-safe)
    vars: HashMap<String, Box<dyn Any + Send + Sync>>,

    started: Instant,
    last_entered: Option<String>,
    dispatched: bool,
}

impl<Q: Queryer> Request<Q> {
    pub fn new(
        operation: Operation,
        ctx: QueryContext,
        query: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            operation,
            query: query.into(),
            args,
            ctx,
            outcome: None,
            error: None,
            vars: HashMap::new(),
            started: Instant::now(),
            last_entered: None,
            dispatched: false,
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn context(&self) -> &QueryContext {
        &self.ctx
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut String {
        &mut self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn args_mut(&mut self) -> &mut Vec<Value> {
        &mut self.args
    }

    pub fn set_args(&mut self, args: Vec<Value>) {
        self.args = args;
    }

    /// Time since the request was created.
    pub fn elapsed(&self) -> std::time::Duration {
        self.started.elapsed()
    }

    pub fn error(&self) -> Option<&SqlError> {
        self.error.as_ref()
    }

    /// Set the request error; an interceptor that does this and does not
    /// advance short-circuits the chain.
    pub fn set_error(&mut self, err: SqlError) {
        self.error = Some(err);
    }

    /// Remove the error, e.g. to translate or swallow it after advancing.
    pub fn take_error(&mut self) -> Option<SqlError> {
        self.error.take()
    }

    pub fn outcome(&self) -> Option<&Outcome<Q>> {
        self.outcome.as_ref()
    }

    pub fn outcome_mut(&mut self) -> Option<&mut Outcome<Q>> {
        self.outcome.as_mut()
    }

    /// Populate the result slot directly, without reaching the collaborator.
    ///
    /// The outcome must match the request's operation.
    pub fn set_outcome(&mut self, outcome: Outcome<Q>) -> SqlResult<()> {
        if outcome.operation() != self.operation {
            return Err(SqlError::OperationMismatch {
                expected: self.operation,
                found: outcome.operation(),
            });
        }
        self.outcome = Some(outcome);
        Ok(())
    }

    pub fn exec_result(&self) -> Option<&Q::ExecResult> {
        match &self.outcome {
            Some(Outcome::Exec(result)) => Some(result),
            _ => None,
        }
    }

    pub fn rows(&self) -> Option<&Q::Rows> {
        match &self.outcome {
            Some(Outcome::Rows(rows)) => Some(rows),
            _ => None,
        }
    }

    pub fn row(&self) -> Option<&Q::Row> {
        match &self.outcome {
            Some(Outcome::Row(row)) => Some(row),
            _ => None,
        }
    }

    /// Whether an outcome or an error has been recorded.
    pub fn is_resolved(&self) -> bool {
        self.outcome.is_some() || self.error.is_some()
    }

    /// Whether the chain reached the terminal dispatcher.
    pub fn is_dispatched(&self) -> bool {
        self.dispatched
    }

    /// Store a typed value into the request
    pub fn set_var<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.vars.insert(key.into(), Box::new(value));
    }

    /// Get a typed reference from the request
    pub fn var<T: Any>(&self, key: &str) -> Option<&T> {
        self.vars.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Get a string slice if the stored value is a `String`
    pub fn var_str(&self, key: &str) -> Option<&str> {
        self.var::<String>(key).map(|s| s.as_str())
    }

    pub fn remove_var(&mut self, key: &str) -> Option<Box<dyn Any + Send + Sync>> {
        self.vars.remove(key)
    }

    pub(crate) fn enter(&mut self, interceptor: &str) {
        self.last_entered = Some(interceptor.to_string());
    }

    pub(crate) fn resolve(&mut self, outcome: Outcome<Q>) {
        debug_assert_eq!(outcome.operation(), self.operation);
        self.outcome = Some(outcome);
    }

    pub(crate) fn mark_dispatched(&mut self) {
        self.dispatched = true;
    }

    /// Consume the request into its outcome, resolving precedence between
    /// the result slot and the error.
    ///
    /// An error always wins. A request with neither resolves to
    /// [`SqlError::Unresolved`].
    pub(crate) fn into_outcome(self) -> SqlResult<Outcome<Q>> {
        if let Some(err) = self.error {
            return Err(err);
        }
        match self.outcome {
            Some(outcome) => Ok(outcome),
            None if self.dispatched => Err(SqlError::Unresolved(
                "result was discarded after dispatch".to_string(),
            )),
            None => Err(SqlError::Unresolved(match self.last_entered {
                Some(name) => format!("interceptor '{name}' neither advanced nor set a result"),
                None => "chain never started".to_string(),
            })),
        }
    }
}

impl<Q: Queryer> fmt::Debug for Request<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("operation", &self.operation)
            .field("query", &self.query)
            .field("args", &self.args)
            .field("outcome", &self.outcome)
            .field("error", &self.error)
            .field("dispatched", &self.dispatched)
            .finish()
    }
}
