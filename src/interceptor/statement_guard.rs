use std::sync::Arc;

use log::warn;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::core::{Interceptor, Next, Operation, Queryer, Request, SqlError, SqlResult};

pub const INTERCEPTOR_NAME: &str = "statement-guard";
const PRIORITY: i32 = 3000;

/// Creates a Statement Guard interceptor instance.
/// This interceptor rejects statements based on configured allow and deny
/// lists of regular expressions matched against the statement text, and can
/// put the pipeline in read-only mode.
pub fn create_statement_guard_interceptor<Q: Queryer>(
    cfg: JsonValue,
) -> SqlResult<Arc<dyn Interceptor<Q>>> {
    #[derive(Deserialize)]
    struct RawConfig {
        #[serde(default)]
        allow: Vec<String>,
        #[serde(default)]
        deny: Vec<String>,
        #[serde(default)]
        read_only: bool,
        message: Option<String>,
    }

    let raw_config: RawConfig = serde_json::from_value(cfg).map_err(|e| {
        SqlError::serialization_error("Invalid statement guard interceptor config", e)
    })?;

    let compile = |patterns: Vec<String>, list: &str| {
        patterns
            .into_iter()
            .map(|p| {
                Regex::new(&p).map_err(|e| {
                    SqlError::Configuration(format!("Invalid {list} pattern '{p}': {e}"))
                })
            })
            .collect::<SqlResult<Vec<_>>>()
    };

    let config = InterceptorConfig {
        allow: compile(raw_config.allow, "allow")?,
        deny: compile(raw_config.deny, "deny")?,
        read_only: raw_config.read_only,
        message: raw_config.message,
    };

    Ok(Arc::new(InterceptorStatementGuard { config }))
}

#[derive(Debug)]
struct InterceptorConfig {
    /// If non-empty, only statements matching one of these patterns pass.
    allow: Vec<Regex>,

    /// Statements matching any of these patterns are rejected.
    deny: Vec<Regex>,

    /// Reject every `exec` statement.
    read_only: bool,

    /// Optional message for the rejection error, replacing the generated reason.
    message: Option<String>,
}

pub struct InterceptorStatementGuard {
    config: InterceptorConfig,
}

impl InterceptorStatementGuard {
    /// The reason a statement is refused, or `None` if it may pass.
    fn check(&self, operation: Operation, query: &str) -> Option<String> {
        if self.config.read_only && operation == Operation::Exec {
            return Some("pipeline is read-only".to_string());
        }

        if let Some(re) = self.config.deny.iter().find(|re| re.is_match(query)) {
            return Some(format!("statement matches deny pattern '{}'", re.as_str()));
        }

        if !self.config.allow.is_empty() && !self.config.allow.iter().any(|re| re.is_match(query))
        {
            return Some("statement matches no allow pattern".to_string());
        }

        None
    }
}

impl<Q: Queryer> Interceptor<Q> for InterceptorStatementGuard {
    fn name(&self) -> &str {
        INTERCEPTOR_NAME
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn intercept(&self, req: &mut Request<Q>, next: Next<'_, Q>) {
        match self.check(req.operation(), req.query()) {
            Some(reason) => {
                warn!("Rejected {} statement: {reason}", req.operation());
                let message = self.config.message.clone().unwrap_or(reason);
                req.set_error(SqlError::Rejected(message));
            }
            None => next.run(req),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        args,
        core::{mock::MockQueryer, QueryContext},
        pipeline::Pipeline,
    };

    fn guarded(cfg: JsonValue) -> Pipeline<MockQueryer> {
        let pipeline = Pipeline::new(MockQueryer::new());
        pipeline.register_arc(create_statement_guard_interceptor(cfg).unwrap());
        pipeline
    }

    #[test]
    fn test_invalid_pattern() {
        let result = create_statement_guard_interceptor::<MockQueryer>(json!({ "deny": ["("] }));
        assert!(matches!(result.err(), Some(SqlError::Configuration(_))));
    }

    #[test]
    fn test_read_only_rejects_exec_only() {
        let pipeline = guarded(json!({ "read_only": true }));
        let ctx = QueryContext::background();

        let err = pipeline.exec(&ctx, "DELETE FROM t", args![]).unwrap_err();
        assert!(matches!(err, SqlError::Rejected(ref m) if m == "pipeline is read-only"));

        pipeline.query_many(&ctx, "SELECT * FROM t", args![]).unwrap();
        assert_eq!(pipeline.queryer().operations(), vec![Operation::QueryMany]);
    }

    #[test]
    fn test_deny_list() {
        let pipeline = guarded(json!({
            "deny": ["(?i)^\\s*drop\\s"],
            "message": "DDL is not allowed"
        }));
        let ctx = QueryContext::background();

        let err = pipeline.exec(&ctx, "drop table users", args![]).unwrap_err();
        assert!(matches!(err, SqlError::Rejected(ref m) if m == "DDL is not allowed"));
        pipeline.exec(&ctx, "DELETE FROM users", args![]).unwrap();
        assert_eq!(pipeline.queryer().calls().len(), 1);
    }

    #[test]
    fn test_allow_list() {
        let pipeline = guarded(json!({ "allow": ["^SELECT "] }));
        let ctx = QueryContext::background();

        assert!(pipeline.query_one(&ctx, "SELECT 1", args![]).is_ok());
        let err = pipeline
            .query_one(&ctx, "UPDATE t SET a = 1", args![])
            .unwrap_err();
        assert!(matches!(err, SqlError::Rejected(ref m) if m.contains("no allow pattern")));
    }

    #[test]
    fn test_deny_wins_over_allow() {
        let pipeline = guarded(json!({
            "allow": ["^SELECT "],
            "deny": ["pg_sleep"]
        }));
        let err = pipeline
            .query_many(&QueryContext::background(), "SELECT pg_sleep(10)", args![])
            .unwrap_err();
        assert!(matches!(err, SqlError::Rejected(ref m) if m.contains("pg_sleep")));
    }
}
