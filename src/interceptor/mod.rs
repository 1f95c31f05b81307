pub mod fault_injection;
pub mod prometheus;
pub mod query_logger;
pub mod query_rewrite;
pub mod request_id;
pub mod statement_guard;

use std::{cmp::Reverse, collections::HashMap, sync::Arc};

use log::debug;
use serde_json::Value as JsonValue;

use crate::{
    config::InterceptorEntry,
    core::{Interceptor, Queryer, SqlError, SqlResult},
};

/// Factory turning an interceptor configuration into an interceptor instance.
pub type InterceptorCreateFn<Q> = fn(JsonValue) -> SqlResult<Arc<dyn Interceptor<Q>>>;

/// Registry mapping interceptor names to their factory functions.
///
/// Built-in interceptors are registered with their priority values as comments
/// for reference. Higher priority values execute earlier in a configured chain.
pub struct InterceptorRegistry<Q: Queryer> {
    builders: HashMap<String, InterceptorCreateFn<Q>>,
}

impl<Q: Queryer> Default for InterceptorRegistry<Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q: Queryer> InterceptorRegistry<Q> {
    /// A registry holding every built-in interceptor.
    pub fn new() -> Self {
        let arr: Vec<(&str, InterceptorCreateFn<Q>)> = vec![
            (
                query_logger::INTERCEPTOR_NAME,
                query_logger::create_query_logger_interceptor::<Q>,
            ), // 399
            (
                prometheus::INTERCEPTOR_NAME,
                prometheus::create_prometheus_interceptor::<Q>,
            ), // 500
            (
                query_rewrite::INTERCEPTOR_NAME,
                query_rewrite::create_query_rewrite_interceptor::<Q>,
            ), // 1008
            (
                statement_guard::INTERCEPTOR_NAME,
                statement_guard::create_statement_guard_interceptor::<Q>,
            ), // 3000
            (
                fault_injection::INTERCEPTOR_NAME,
                fault_injection::create_fault_injection_interceptor::<Q>,
            ), // 11000
            (
                request_id::INTERCEPTOR_NAME,
                request_id::create_request_id_interceptor::<Q>,
            ), // 12015
        ];
        Self {
            builders: arr
                .into_iter()
                .map(|(name, builder)| (name.to_string(), builder))
                .collect(),
        }
    }

    /// Add or replace the factory for `name`.
    pub fn register_builder(&mut self, name: impl Into<String>, builder: InterceptorCreateFn<Q>) {
        self.builders.insert(name.into(), builder);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Creates an interceptor instance from its configuration.
    ///
    /// Fails fast for unknown interceptor names. A missing (`null`) config is
    /// treated as an empty object so every field falls back to its default.
    pub fn build(&self, name: &str, cfg: JsonValue) -> SqlResult<Arc<dyn Interceptor<Q>>> {
        let builder = self
            .builders
            .get(name)
            .ok_or_else(|| SqlError::Configuration(format!("Unknown interceptor type: {name}")))?;
        let cfg = match cfg {
            JsonValue::Null => JsonValue::Object(Default::default()),
            cfg => cfg,
        };
        builder(cfg)
    }

    /// Build every configured interceptor and order them by descending
    /// priority. Interceptors with equal priority keep their configured order.
    pub fn build_chain(
        &self,
        configs: &[InterceptorEntry],
    ) -> SqlResult<Vec<Arc<dyn Interceptor<Q>>>> {
        let mut chain = configs
            .iter()
            .map(|c| self.build(&c.name, c.config.clone()))
            .collect::<SqlResult<Vec<_>>>()?;
        chain.sort_by_key(|i| Reverse(i.priority()));
        debug!(
            "Built interceptor chain: {:?}",
            chain.iter().map(|i| i.name()).collect::<Vec<_>>()
        );
        Ok(chain)
    }
}
