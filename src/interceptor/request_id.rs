use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::core::{Interceptor, Next, Queryer, Request, SqlError, SqlResult};

pub const INTERCEPTOR_NAME: &str = "request-id";
const PRIORITY: i32 = 12015;

/// Request variable holding the generated id.
pub const REQUEST_ID_VAR: &str = "request-id";

const ALGORITHM_UUID: &str = "uuid";
const ALGORITHM_RANGE_ID: &str = "range_id";
const DEFAULT_CHAR_SET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Creates a Request ID interceptor instance with the given configuration.
pub fn create_request_id_interceptor<Q: Queryer>(
    cfg: JsonValue,
) -> SqlResult<Arc<dyn Interceptor<Q>>> {
    let config: InterceptorConfig = serde_json::from_value(cfg)
        .map_err(|e| SqlError::serialization_error("Invalid request id interceptor config", e))?;

    config.validate()?;

    Ok(Arc::new(InterceptorRequestId { config }))
}

/// Configuration for the Request ID interceptor.
#[derive(Debug, Serialize, Deserialize, Validate)]
struct InterceptorConfig {
    /// Append `/* request_id=... */` to the statement so it shows up in
    /// database-side logs.
    #[serde(default)]
    include_in_query: bool,
    #[serde(default = "InterceptorConfig::default_algorithm")]
    #[validate(custom(function = "InterceptorConfig::validate_algorithm"))]
    algorithm: String,
    #[serde(default)]
    range_id: RangeId,
}

impl InterceptorConfig {
    fn default_algorithm() -> String {
        ALGORITHM_UUID.to_string()
    }

    fn validate_algorithm(algorithm: &String) -> Result<(), ValidationError> {
        if algorithm == ALGORITHM_UUID || algorithm == ALGORITHM_RANGE_ID {
            Ok(())
        } else {
            Err(ValidationError::new(
                "algorithm must be either 'uuid' or 'range_id'",
            ))
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RangeId {
    #[serde(default = "RangeId::default_char_set")]
    char_set: String,
    #[serde(default = "RangeId::default_length")]
    length: u32,
}

impl Default for RangeId {
    fn default() -> Self {
        Self {
            char_set: Self::default_char_set(),
            length: Self::default_length(),
        }
    }
}

impl RangeId {
    fn default_char_set() -> String {
        DEFAULT_CHAR_SET.to_string()
    }

    fn default_length() -> u32 {
        16
    }
}

pub struct InterceptorRequestId {
    config: InterceptorConfig,
}

impl InterceptorRequestId {
    fn generate(&self) -> String {
        match self.config.algorithm.as_str() {
            ALGORITHM_RANGE_ID => self.range_id(),
            _ => Uuid::new_v4().to_string(),
        }
    }

    fn range_id(&self) -> String {
        let char_set = if self.config.range_id.char_set.is_empty() {
            DEFAULT_CHAR_SET
        } else {
            &self.config.range_id.char_set
        };
        let chars: Vec<char> = char_set.chars().collect();
        let mut rng = rand::thread_rng();
        (0..self.config.range_id.length)
            .filter_map(|_| chars.choose(&mut rng))
            .collect()
    }
}

impl<Q: Queryer> Interceptor<Q> for InterceptorRequestId {
    fn name(&self) -> &str {
        INTERCEPTOR_NAME
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn intercept(&self, req: &mut Request<Q>, next: Next<'_, Q>) {
        let id = self.generate();

        if self.config.include_in_query {
            let comment = format!(" /* request_id={id} */");
            req.query_mut().push_str(&comment);
        }

        req.set_var(REQUEST_ID_VAR, id);
        next.run(req);
    }
}
