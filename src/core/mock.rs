//! Recording collaborator shared by the unit tests

use std::{
    fmt,
    sync::{Arc, Mutex},
    time::Instant,
};

use super::{
    chain::Next,
    context::QueryContext,
    error::{SqlError, SqlResult},
    request::{Operation, Request},
    traits::{from_fn, Interceptor, Queryer},
    value::Value,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrConstraint;

impl fmt::Display for ErrConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "constraint violation")
    }
}

impl std::error::Error for ErrConstraint {}

#[derive(Clone, Debug)]
pub struct Call {
    pub operation: Operation,
    pub query: String,
    pub args: Vec<Value>,
    pub deadline: Option<Instant>,
}

#[derive(Debug, PartialEq)]
pub struct MockExec {
    pub rows_affected: u64,
}

#[derive(Debug)]
pub struct MockRows {
    pub query: String,
}

#[derive(Debug)]
pub struct MockRow {
    pub query: String,
    err: Option<ErrConstraint>,
}

impl MockRow {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            err: None,
        }
    }

    /// Reading the row is where a deferred error shows up.
    pub fn scan(&self) -> SqlResult<&str> {
        match self.err {
            Some(err) => Err(SqlError::driver(err)),
            None => Ok(&self.query),
        }
    }
}

#[derive(Default)]
pub struct MockQueryer {
    calls: Mutex<Vec<Call>>,
    fail: bool,
}

impl MockQueryer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A collaborator whose every call fails with [`ErrConstraint`].
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.calls().into_iter().map(|c| c.operation).collect()
    }

    fn record(&self, operation: Operation, ctx: &QueryContext, query: &str, args: &[Value]) {
        self.calls.lock().unwrap().push(Call {
            operation,
            query: query.to_string(),
            args: args.to_vec(),
            deadline: ctx.deadline(),
        });
    }
}

impl Queryer for MockQueryer {
    type ExecResult = MockExec;
    type Rows = MockRows;
    type Row = MockRow;

    fn exec(&self, ctx: &QueryContext, query: &str, args: &[Value]) -> SqlResult<MockExec> {
        self.record(Operation::Exec, ctx, query, args);
        if self.fail {
            return Err(SqlError::driver(ErrConstraint));
        }
        Ok(MockExec {
            rows_affected: args.len() as u64,
        })
    }

    fn query_many(&self, ctx: &QueryContext, query: &str, args: &[Value]) -> SqlResult<MockRows> {
        self.record(Operation::QueryMany, ctx, query, args);
        if self.fail {
            return Err(SqlError::driver(ErrConstraint));
        }
        Ok(MockRows {
            query: query.to_string(),
        })
    }

    fn query_one(&self, ctx: &QueryContext, query: &str, args: &[Value]) -> MockRow {
        self.record(Operation::QueryOne, ctx, query, args);
        MockRow {
            query: query.to_string(),
            err: self.fail.then_some(ErrConstraint),
        }
    }
}

/// An interceptor that appends its name to `log` and advances.
pub fn recording(name: &str, log: &Arc<Mutex<Vec<String>>>) -> impl Interceptor<MockQueryer> {
    let log = log.clone();
    let label = name.to_string();
    from_fn(
        name,
        move |req: &mut Request<MockQueryer>, next: Next<'_, MockQueryer>| {
            log.lock().unwrap().push(label.clone());
            next.run(req);
        },
    )
}
