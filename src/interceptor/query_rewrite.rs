use std::sync::Arc;

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::{Validate, ValidationError};

use crate::core::{Interceptor, Next, Queryer, Request, SqlError, SqlResult};

pub const INTERCEPTOR_NAME: &str = "query-rewrite";
const PRIORITY: i32 = 1008;

pub fn create_query_rewrite_interceptor<Q: Queryer>(
    cfg: JsonValue,
) -> SqlResult<Arc<dyn Interceptor<Q>>> {
    let config: InterceptorConfig = serde_json::from_value(cfg).map_err(|e| {
        SqlError::serialization_error("Invalid query rewrite interceptor config", e)
    })?;

    config.validate()?;

    // Precompile regex patterns; validation already proved they parse
    let regex_patterns = config
        .regex_query
        .chunks(2)
        .map(|pair| {
            Regex::new(&pair[0])
                .map(|re| (re, pair[1].clone()))
                .map_err(|e| SqlError::Configuration(format!("Invalid regex_query pattern: {e}")))
        })
        .collect::<SqlResult<Vec<_>>>()?;

    Ok(Arc::new(InterceptorQueryRewrite {
        config,
        regex_patterns,
    }))
}

#[derive(Default, Debug, Serialize, Deserialize, Validate)]
struct InterceptorConfig {
    /// Flat list of `[pattern, template, pattern, template, ...]`. The first
    /// pattern that matches rewrites every match with its template, which may
    /// reference capture groups as `$1` or `${name}`.
    #[serde(default)]
    #[validate(custom(function = "InterceptorConfig::validate_regex_query"))]
    regex_query: Vec<String>,
    /// Text prepended to the statement, e.g. a `/* tag */` comment.
    prefix: Option<String>,
    /// Text appended to the statement.
    suffix: Option<String>,
}

impl InterceptorConfig {
    fn validate_regex_query(regex_query: &[String]) -> Result<(), ValidationError> {
        if regex_query.len() % 2 != 0 {
            return Err(ValidationError::new("regex_query_length"));
        }

        regex_query
            .iter()
            .step_by(2)
            .map(|pattern| Regex::new(pattern).map_err(|_| ValidationError::new("invalid_regex")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(())
    }
}

pub struct InterceptorQueryRewrite {
    config: InterceptorConfig,
    regex_patterns: Vec<(Regex, String)>, // Precompiled regex and template pairs
}

impl InterceptorQueryRewrite {
    fn rewrite(&self, query: &str) -> Option<String> {
        let mut rewritten = self
            .regex_patterns
            .iter()
            .find(|(re, _)| re.is_match(query))
            .map(|(re, template)| re.replace_all(query, template.as_str()).into_owned());

        if self.config.prefix.is_none() && self.config.suffix.is_none() {
            return rewritten;
        }

        let body = rewritten.take().unwrap_or_else(|| query.to_string());
        Some(format!(
            "{}{}{}",
            self.config.prefix.as_deref().unwrap_or_default(),
            body,
            self.config.suffix.as_deref().unwrap_or_default()
        ))
    }
}

impl<Q: Queryer> Interceptor<Q> for InterceptorQueryRewrite {
    fn name(&self) -> &str {
        INTERCEPTOR_NAME
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn intercept(&self, req: &mut Request<Q>, next: Next<'_, Q>) {
        if let Some(query) = self.rewrite(req.query()) {
            debug!("Rewrote statement '{}' to '{query}'", req.query());
            req.set_query(query);
        }
        next.run(req);
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

    fn interceptor(cfg: JsonValue) -> SqlResult<Arc<dyn Interceptor<MockQueryer>>> {
        create_query_rewrite_interceptor(cfg)
    }

    #[test]
    fn test_odd_regex_list_is_rejected() {
        let result = interceptor(json!({ "regex_query": ["^SELECT"] }));
        assert!(matches!(result.err(), Some(SqlError::Validation(_))));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let result = interceptor(json!({ "regex_query": ["(", "x"] }));
        assert!(matches!(result.err(), Some(SqlError::Validation(_))));
    }

    #[test]
    fn test_first_matching_pattern_wins() {
        let pipeline = Pipeline::new(MockQueryer::new());
        pipeline.register_arc(
            interceptor(json!({
                "regex_query": [
                    "\\bFROM users\\b", "FROM users_v2",
                    "\\bFROM (\\w+)", "FROM archive.$1"
                ]
            }))
            .unwrap(),
        );
        let ctx = QueryContext::background();

        pipeline
            .query_many(&ctx, "SELECT * FROM users", args![])
            .unwrap();
        pipeline
            .query_many(&ctx, "SELECT * FROM orders", args![])
            .unwrap();
        pipeline.query_many(&ctx, "SELECT 1", args![]).unwrap();

        let queries: Vec<String> = pipeline
            .queryer()
            .calls()
            .into_iter()
            .map(|c| c.query)
            .collect();
        assert_eq!(
            queries,
            vec![
                "SELECT * FROM users_v2",
                "SELECT * FROM archive.orders",
                "SELECT 1"
            ]
        );
    }

    #[test]
    fn test_prefix_and_suffix() {
        let pipeline = Pipeline::new(MockQueryer::new());
        pipeline.register_arc(
            interceptor(json!({
                "prefix": "/* audit */ ",
                "suffix": " -- tagged"
            }))
            .unwrap(),
        );

        pipeline
            .exec(&QueryContext::background(), "DELETE FROM t", args![])
            .unwrap();
        assert_eq!(
            pipeline.queryer().calls()[0].query,
            "/* audit */ DELETE FROM t -- tagged"
        );
    }
}
