//! Core traits for sqlchain components
//!
//! [`Queryer`] is the contract the database collaborator fulfils and
//! [`Interceptor`] is the contract every middleware step fulfils. Implementing
//! `Queryer` for a connection type is the one-time conformance check done when
//! a pipeline is wired up.

use std::{fmt, sync::Arc};

use super::{
    chain::Next,
    context::QueryContext,
    error::SqlResult,
    request::Request,
    value::Value,
};

/// A connection-like capability able to run the three statement kinds.
pub trait Queryer: Send + Sync {
    /// Result of a command that returns no rows
    type ExecResult;
    /// Handle over a multi-row result set
    type Rows;
    /// Handle over a single row; errors surface when the row is read
    type Row;

    fn exec(&self, ctx: &QueryContext, query: &str, args: &[Value]) -> SqlResult<Self::ExecResult>;

    fn query_many(&self, ctx: &QueryContext, query: &str, args: &[Value])
        -> SqlResult<Self::Rows>;

    /// Run a single-row query.
    ///
    /// Never fails here: any error must be deferred into the returned row.
    fn query_one(&self, ctx: &QueryContext, query: &str, args: &[Value]) -> Self::Row;
}

impl<Q: Queryer + ?Sized> Queryer for Arc<Q> {
    type ExecResult = Q::ExecResult;
    type Rows = Q::Rows;
    type Row = Q::Row;

    fn exec(&self, ctx: &QueryContext, query: &str, args: &[Value]) -> SqlResult<Self::ExecResult> {
        (**self).exec(ctx, query, args)
    }

    fn query_many(
        &self,
        ctx: &QueryContext,
        query: &str,
        args: &[Value],
    ) -> SqlResult<Self::Rows> {
        (**self).query_many(ctx, query, args)
    }

    fn query_one(&self, ctx: &QueryContext, query: &str, args: &[Value]) -> Self::Row {
        (**self).query_one(ctx, query, args)
    }
}

impl<Q: Queryer + ?Sized> Queryer for Box<Q> {
    type ExecResult = Q::ExecResult;
    type Rows = Q::Rows;
    type Row = Q::Row;

    fn exec(&self, ctx: &QueryContext, query: &str, args: &[Value]) -> SqlResult<Self::ExecResult> {
        (**self).exec(ctx, query, args)
    }

    fn query_many(
        &self,
        ctx: &QueryContext,
        query: &str,
        args: &[Value],
    ) -> SqlResult<Self::Rows> {
        (**self).query_many(ctx, query, args)
    }

    fn query_one(&self, ctx: &QueryContext, query: &str, args: &[Value]) -> Self::Row {
        (**self).query_one(ctx, query, args)
    }
}

/// A unit of middleware logic in the statement chain.
///
/// An interceptor may inspect or rewrite the request, advance by calling
/// [`Next::run`], inspect the request again once the rest of the chain has
/// returned, or drop `next` to short-circuit after setting an error or outcome.
pub trait Interceptor<Q: Queryer>: Send + Sync {
    /// Return the name of this interceptor
    fn name(&self) -> &str;

    /// Return the priority of this interceptor
    ///
    /// Only used to order chains built from configuration; higher runs earlier.
    fn priority(&self) -> i32 {
        0
    }

    fn intercept(&self, req: &mut Request<Q>, next: Next<'_, Q>);
}

/// Interceptor backed by a closure.
pub struct FnInterceptor<F> {
    name: String,
    priority: i32,
    f: F,
}

impl<F> FnInterceptor<F> {
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl<F> fmt::Debug for FnInterceptor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnInterceptor")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Build an interceptor from a closure.
pub fn from_fn<Q, F, S>(name: S, f: F) -> FnInterceptor<F>
where
    Q: Queryer,
    F: Fn(&mut Request<Q>, Next<'_, Q>) + Send + Sync,
    S: Into<String>,
{
    FnInterceptor {
        name: name.into(),
        priority: 0,
        f,
    }
}

impl<Q, F> Interceptor<Q> for FnInterceptor<F>
where
    Q: Queryer,
    F: Fn(&mut Request<Q>, Next<'_, Q>) + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn intercept(&self, req: &mut Request<Q>, next: Next<'_, Q>) {
        (self.f)(req, next)
    }
}
