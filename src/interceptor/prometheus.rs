use std::{sync::Arc, time::Instant};

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramOpts, HistogramVec,
    IntCounterVec, TextEncoder,
};
use serde_json::Value as JsonValue;

use crate::core::{Interceptor, Next, Queryer, Request, SqlError, SqlResult};

const DEFAULT_BUCKETS: &[f64] = &[
    0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0,
    30000.0,
];

// Statements per operation and status
static STATEMENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "sql_statements_total",
        "The total number of statements that went through sqlchain pipelines",
        &[
            "operation", // exec, query_many or query_one
            "status",    // ok, error or rejected
        ]
    )
    .unwrap()
});

// Histogram for statement latency
static LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    let opts = HistogramOpts::new(
        "sql_statement_latency",
        "Statement latency in milliseconds, measured around the rest of the chain",
    )
    .buckets(DEFAULT_BUCKETS.to_vec());
    register_histogram_vec!(opts, &["operation"]).unwrap()
});

pub const INTERCEPTOR_NAME: &str = "prometheus";
const PRIORITY: i32 = 500;

pub fn create_prometheus_interceptor<Q: Queryer>(
    _cfg: JsonValue,
) -> SqlResult<Arc<dyn Interceptor<Q>>> {
    Ok(Arc::new(InterceptorPrometheus))
}

/// Render every metric of the default registry in the Prometheus text format.
pub fn gather_metrics() -> SqlResult<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| SqlError::Internal(format!("Failed to encode metrics: {e}")))?;
    String::from_utf8(buffer).map_err(|e| SqlError::Internal(e.to_string()))
}

pub struct InterceptorPrometheus;

/// Status label for a finished request.
fn status<Q: Queryer>(req: &Request<Q>) -> &'static str {
    match req.error() {
        None => "ok",
        Some(err) if err.is_driver() => "error",
        Some(_) => "rejected",
    }
}

impl<Q: Queryer> Interceptor<Q> for InterceptorPrometheus {
    fn name(&self) -> &str {
        INTERCEPTOR_NAME
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn intercept(&self, req: &mut Request<Q>, next: Next<'_, Q>) {
        let start = Instant::now();
        next.run(req);

        let operation = req.operation().as_str();
        STATEMENTS
            .with_label_values(&[operation, status(req)])
            .inc();
        LATENCY
            .with_label_values(&[operation])
            .observe(start.elapsed().as_secs_f64() * 1000.0);
    }
}
