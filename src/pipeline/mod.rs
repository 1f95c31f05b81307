//! Statement pipeline facade
//!
//! [`Pipeline`] is what callers talk to. Each of its three entry points
//! builds a fresh [`Request`], runs it through the registered interceptors
//! and the terminal dispatcher, and unpacks the outcome.
//!
//! The interceptor list is copy-on-write: registration swaps in a new list
//! while calls already in flight keep iterating the snapshot they loaded when
//! they started. Registration and execution may therefore overlap freely.

use std::sync::Arc;

use arc_swap::ArcSwap;
use log::{debug, info};

use crate::{
    config::Config,
    core::{
        from_fn, Interceptor, Next, Operation, Outcome, QueryContext, Queryer, Request, SqlError,
        SqlResult, Value,
    },
    interceptor::InterceptorRegistry,
};

type InterceptorList<Q> = Vec<Arc<dyn Interceptor<Q>>>;

pub struct Pipeline<Q: Queryer> {
    queryer: Q,
    interceptors: ArcSwap<InterceptorList<Q>>,
}

impl<Q: Queryer> Pipeline<Q> {
    pub fn new(queryer: Q) -> Self {
        Self {
            queryer,
            interceptors: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Build a pipeline whose chain comes from the `interceptors` section of
    /// the configuration, ordered by descending priority.
    pub fn from_config(
        queryer: Q,
        config: &Config,
        registry: &InterceptorRegistry<Q>,
    ) -> SqlResult<Self> {
        let pipeline = Self::new(queryer);
        let chain = registry.build_chain(&config.interceptors)?;
        info!("Loaded {} interceptors from configuration", chain.len());
        pipeline.register_all(chain);
        Ok(pipeline)
    }

    /// The wrapped collaborator.
    pub fn queryer(&self) -> &Q {
        &self.queryer
    }

    /// Append one interceptor to the end of the chain.
    pub fn register<I>(&self, interceptor: I)
    where
        I: Interceptor<Q> + 'static,
    {
        self.register_arc(Arc::new(interceptor));
    }

    pub fn register_arc(&self, interceptor: Arc<dyn Interceptor<Q>>) {
        self.register_all(std::iter::once(interceptor));
    }

    /// Append interceptors in iteration order. Calls already running are not
    /// affected; calls started afterwards see the new chain.
    pub fn register_all<I>(&self, interceptors: I)
    where
        I: IntoIterator<Item = Arc<dyn Interceptor<Q>>>,
    {
        let added: InterceptorList<Q> = interceptors.into_iter().collect();
        if added.is_empty() {
            return;
        }
        for interceptor in &added {
            debug!("Registering interceptor '{}'", interceptor.name());
        }
        self.interceptors.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + added.len());
            next.extend(current.iter().cloned());
            next.extend(added.iter().cloned());
            next
        });
    }

    /// Register a closure as an interceptor.
    pub fn register_fn<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(&mut Request<Q>, Next<'_, Q>) + Send + Sync + 'static,
    {
        self.register(from_fn::<Q, F, _>(name, f));
    }

    pub fn interceptor_names(&self) -> Vec<String> {
        self.interceptors
            .load()
            .iter()
            .map(|i| i.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.interceptors.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run a statement that returns no rows.
    pub fn exec(
        &self,
        ctx: &QueryContext,
        query: impl Into<String>,
        args: Vec<Value>,
    ) -> SqlResult<Q::ExecResult> {
        match self.process(ctx, Operation::Exec, query.into(), args)? {
            Outcome::Exec(result) => Ok(result),
            other => Err(mismatch(Operation::Exec, &other)),
        }
    }

    /// Run a query returning any number of rows.
    pub fn query_many(
        &self,
        ctx: &QueryContext,
        query: impl Into<String>,
        args: Vec<Value>,
    ) -> SqlResult<Q::Rows> {
        match self.process(ctx, Operation::QueryMany, query.into(), args)? {
            Outcome::Rows(rows) => Ok(rows),
            other => Err(mismatch(Operation::QueryMany, &other)),
        }
    }

    /// Run a query returning a single row.
    ///
    /// Collaborator errors are not reported here: they stay inside the row
    /// and surface when it is read. The `Err` side only carries errors that
    /// leave no row behind, such as an interceptor rejecting the statement,
    /// a cancelled context or a chain that never resolved.
    pub fn query_one(
        &self,
        ctx: &QueryContext,
        query: impl Into<String>,
        args: Vec<Value>,
    ) -> SqlResult<Q::Row> {
        match self.process(ctx, Operation::QueryOne, query.into(), args)? {
            Outcome::Row(row) => Ok(row),
            other => Err(mismatch(Operation::QueryOne, &other)),
        }
    }

    fn process(
        &self,
        ctx: &QueryContext,
        operation: Operation,
        query: String,
        args: Vec<Value>,
    ) -> SqlResult<Outcome<Q>> {
        let mut req = Request::new(operation, ctx.clone(), query, args);
        // Own the snapshot for the whole call; the collaborator may block.
        let chain = self.interceptors.load_full();
        Next::new(&chain, &self.queryer).run(&mut req);
        req.into_outcome()
    }
}

fn mismatch<Q: Queryer>(expected: Operation, outcome: &Outcome<Q>) -> SqlError {
    SqlError::OperationMismatch {
        expected,
        found: outcome.operation(),
    }
}

/// A pipeline is itself a collaborator, so pipelines can be stacked.
impl<Q: Queryer> Queryer for Pipeline<Q> {
    type ExecResult = Q::ExecResult;
    type Rows = Q::Rows;
    type Row = SqlResult<Q::Row>;

    fn exec(&self, ctx: &QueryContext, query: &str, args: &[Value]) -> SqlResult<Self::ExecResult> {
        Pipeline::exec(self, ctx, query, args.to_vec())
    }

    fn query_many(
        &self,
        ctx: &QueryContext,
        query: &str,
        args: &[Value],
    ) -> SqlResult<Self::Rows> {
        Pipeline::query_many(self, ctx, query, args.to_vec())
    }

    fn query_one(&self, ctx: &QueryContext, query: &str, args: &[Value]) -> Self::Row {
        Pipeline::query_one(self, ctx, query, args.to_vec())
    }
}
