use std::sync::Arc;

use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::core::{Interceptor, Next, Queryer, Request, SqlError, SqlResult};

use super::request_id::REQUEST_ID_VAR;

pub const INTERCEPTOR_NAME: &str = "query-logger";
const PRIORITY: i32 = 399;

static VARIABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$[a-zA-Z0-9_]+").unwrap());

pub fn create_query_logger_interceptor<Q: Queryer>(
    cfg: JsonValue,
) -> SqlResult<Arc<dyn Interceptor<Q>>> {
    let config: InterceptorConfig = serde_json::from_value(cfg).map_err(|e| {
        SqlError::serialization_error("Invalid query logger interceptor config", e)
    })?;

    let log_format = LogFormat::parse(&config.log_format);

    Ok(Arc::new(InterceptorQueryLogger {
        log_format,
        slow_threshold_ms: config.slow_threshold_ms,
    }))
}

/// Configuration for the query logger interceptor.
#[derive(Default, Debug, Serialize, Deserialize)]
struct InterceptorConfig {
    #[serde(default = "InterceptorConfig::default_log_format")]
    log_format: String,
    /// Statements slower than this are logged at warn level.
    slow_threshold_ms: Option<u64>,
}

impl InterceptorConfig {
    fn default_log_format() -> String {
        "$operation \"$query\" $status $elapsed_ms".to_string()
    }
}

pub struct InterceptorQueryLogger {
    log_format: LogFormat,
    slow_threshold_ms: Option<u64>,
}

impl<Q: Queryer> Interceptor<Q> for InterceptorQueryLogger {
    fn name(&self) -> &str {
        INTERCEPTOR_NAME
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn intercept(&self, req: &mut Request<Q>, next: Next<'_, Q>) {
        next.run(req);

        let line = self.log_format.render(req);
        let slow = self
            .slow_threshold_ms
            .is_some_and(|threshold| req.elapsed().as_millis() >= threshold as u128);
        if slow {
            warn!(target: "sqlchain::query", "{line}");
        } else {
            info!(target: "sqlchain::query", "{line}");
        }
    }
}

#[derive(Debug)]
enum Segment {
    Static(String),
    Variable(String),
}

#[derive(Debug)]
struct LogFormat {
    segments: Vec<Segment>,
}

impl LogFormat {
    fn parse(format: &str) -> Self {
        let mut segments = Vec::new();
        let mut last_pos = 0;

        for mat in VARIABLE.find_iter(format) {
            if last_pos < mat.start() {
                segments.push(Segment::Static(format[last_pos..mat.start()].to_string()));
            }
            segments.push(Segment::Variable(mat.as_str()[1..].to_string()));
            last_pos = mat.end();
        }

        if last_pos < format.len() {
            segments.push(Segment::Static(format[last_pos..].to_string()));
        }

        LogFormat { segments }
    }

    fn render<Q: Queryer>(&self, req: &Request<Q>) -> String {
        let mut output = String::with_capacity(req.query().len() + 64);

        for segment in &self.segments {
            match segment {
                Segment::Static(text) => output.push_str(text),
                Segment::Variable(var) => match var.as_str() {
                    "operation" => output.push_str(req.operation().as_str()),
                    "query" => output.push_str(req.query()),
                    "args" => {
                        let args: Vec<String> = req.args().iter().map(ToString::to_string).collect();
                        output.push('[');
                        output.push_str(&args.join(", "));
                        output.push(']');
                    }
                    "arg_count" => output.push_str(&req.args().len().to_string()),
                    "elapsed_ms" => output.push_str(&req.elapsed().as_millis().to_string()),
                    "status" => output.push_str(if req.error().is_some() { "error" } else { "ok" }),
                    "error" => {
                        if let Some(err) = req.error() {
                            output.push_str(&err.to_string());
                        }
                    }
                    "request_id" => output.push_str(req.var_str(REQUEST_ID_VAR).unwrap_or_default()),
                    _ => {}
                },
            }
        }

        output
    }
}
