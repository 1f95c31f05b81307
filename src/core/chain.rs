//! Interceptor chain runner
//!
//! The chain is driven by [`Next`], a continuation that owns the slice of
//! interceptors still to run. Calling [`Next::run`] either hands the request
//! to the next interceptor together with a fresh continuation for the rest of
//! the chain, or, once the slice is exhausted, performs the terminal dispatch.
//!
//! `Next` is consumed by `run` and cannot be cloned, so an interceptor can
//! advance at most once. Dropping it without running short-circuits the chain.

use std::sync::Arc;

use log::trace;

use super::{
    dispatch::dispatch,
    request::Request,
    traits::{Interceptor, Queryer},
};

/// Continuation handed to every interceptor.
#[must_use = "dropping `Next` without calling `run` short-circuits the chain"]
pub struct Next<'a, Q: Queryer> {
    remaining: &'a [Arc<dyn Interceptor<Q>>],
    queryer: &'a Q,
}

impl<'a, Q: Queryer> Next<'a, Q> {
    pub(crate) fn new(chain: &'a [Arc<dyn Interceptor<Q>>], queryer: &'a Q) -> Self {
        Self {
            remaining: chain,
            queryer,
        }
    }

    /// Number of interceptors still ahead of the dispatcher.
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// Advance the chain. Returns once every later step, including the
    /// database call, has finished and written into `req`.
    pub fn run(self, req: &mut Request<Q>) {
        match self.remaining.split_first() {
            None => dispatch(self.queryer, req),
            Some((interceptor, rest)) => {
                trace!(
                    "Entering interceptor '{}' ({} left)",
                    interceptor.name(),
                    rest.len()
                );
                req.enter(interceptor.name());
                interceptor.intercept(req, Next::new(rest, self.queryer));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    };

    use super::*;
    use crate::core::{
        mock::{recording, MockQueryer},
        traits::from_fn,
        Operation, QueryContext, SqlError, Value,
    };

    type Chain = Vec<Arc<dyn Interceptor<MockQueryer>>>;

    fn run(chain: &Chain, queryer: &MockQueryer, req: &mut Request<MockQueryer>) {
        Next::new(chain, queryer).run(req);
    }

    fn exec_request(query: &str) -> Request<MockQueryer> {
        Request::new(Operation::Exec, QueryContext::background(), query, vec![])
    }

    #[test]
    fn test_runs_in_registration_order_before_dispatch() {
        let queryer = MockQueryer::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: Chain = vec![
            Arc::new(recording("first", &log)),
            Arc::new(recording("second", &log)),
            Arc::new(recording("third", &log)),
        ];

        for _ in 0..2 {
            let mut req = exec_request("UPDATE t SET a = 1");
            run(&chain, &queryer, &mut req);
            assert!(req.is_dispatched());
            assert!(req.exec_result().is_some());
        }

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first", "second", "third", "first", "second", "third"]
        );
        assert_eq!(queryer.calls().len(), 2);
    }

    #[test]
    fn test_empty_chain_dispatches_directly() {
        let queryer = MockQueryer::new();
        let mut req = exec_request("DELETE FROM t");
        run(&vec![], &queryer, &mut req);
        assert!(req.is_dispatched());
        assert_eq!(queryer.operations(), vec![Operation::Exec]);
    }

    #[test]
    fn test_short_circuit_skips_rest_and_dispatcher() {
        let queryer = MockQueryer::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: Chain = vec![
            Arc::new(recording("first", &log)),
            Arc::new(from_fn("deny", |req: &mut Request<MockQueryer>, _next| {
                req.set_error(SqlError::Rejected("denied".to_string()));
            })),
            Arc::new(recording("never", &log)),
        ];

        let mut req = exec_request("DROP TABLE t");
        run(&chain, &queryer, &mut req);

        assert_eq!(*log.lock().unwrap(), vec!["first"]);
        assert!(!req.is_dispatched());
        assert!(queryer.calls().is_empty());
        assert!(matches!(req.error(), Some(SqlError::Rejected(m)) if m == "denied"));
    }

    #[test]
    fn test_rewrites_reach_the_dispatcher() {
        let queryer = MockQueryer::new();
        let chain: Chain = vec![Arc::new(from_fn(
            "rewrite",
            |req: &mut Request<MockQueryer>, next: Next<'_, MockQueryer>| {
                req.set_query("SELECT * FROM users WHERE id = ?");
                req.args_mut().push(Value::Int(42));
                next.run(req);
            },
        ))];

        let mut req = Request::new(
            Operation::QueryMany,
            QueryContext::background(),
            "SELECT * FROM users",
            vec![],
        );
        run(&chain, &queryer, &mut req);

        let calls = queryer.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].query, "SELECT * FROM users WHERE id = ?");
        assert_eq!(calls[0].args, vec![Value::Int(42)]);
    }

    #[test]
    fn test_post_processing_sees_dispatch_result() {
        let queryer = MockQueryer::failing();
        let saw_error = Arc::new(AtomicBool::new(false));
        let flag = saw_error.clone();
        let chain: Chain = vec![Arc::new(from_fn(
            "observer",
            move |req: &mut Request<MockQueryer>, next: Next<'_, MockQueryer>| {
                assert!(req.error().is_none());
                next.run(req);
                flag.store(req.error().is_some(), Ordering::SeqCst);
            },
        ))];

        let mut req = exec_request("INSERT INTO t VALUES (1)");
        run(&chain, &queryer, &mut req);
        assert!(saw_error.load(Ordering::SeqCst));
    }

    #[test]
    fn test_next_reports_remaining() {
        let queryer = MockQueryer::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain: Chain = (0..3)
            .map(|i| {
                let seen = seen.clone();
                Arc::new(from_fn(
                    format!("step-{i}"),
                    move |req: &mut Request<MockQueryer>, next: Next<'_, MockQueryer>| {
                        seen.lock().unwrap().push(next.remaining());
                        next.run(req);
                    },
                )) as Arc<dyn Interceptor<MockQueryer>>
            })
            .collect();

        let mut req = exec_request("UPDATE t SET a = 1");
        run(&chain, &queryer, &mut req);
        assert_eq!(*seen.lock().unwrap(), vec![2, 1, 0]);
    }
}
