use std::{sync::Arc, time::Duration};

use log::warn;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::Validate;

use crate::core::{Interceptor, Next, Queryer, Request, SqlError, SqlResult};

pub const INTERCEPTOR_NAME: &str = "fault-injection";
const PRIORITY: i32 = 11000;

const DEFAULT_ABORT_MESSAGE: &str = "fault injected";

/// Creates a Fault Injection interceptor instance with the given configuration.
/// This interceptor delays or fails statements before they reach the database,
/// for exercising caller error paths.
pub fn create_fault_injection_interceptor<Q: Queryer>(
    cfg: JsonValue,
) -> SqlResult<Arc<dyn Interceptor<Q>>> {
    let config = InterceptorConfig::try_from(cfg)?;
    let delay = config
        .delay
        .as_ref()
        .map(|delay| delay.to_duration())
        .transpose()?;
    Ok(Arc::new(InterceptorFaultInjection { config, delay }))
}

/// Configuration for delaying statements
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct DelayConfig {
    /// Duration to delay the statement in seconds (supports decimals)
    #[validate(range(min = 0.0))]
    duration: f64,

    /// Percentage of statements to delay (0-100). If not set, delays all statements.
    #[serde(default)]
    #[validate(range(min = 0, max = 100))]
    percentage: Option<u32>,
}

impl DelayConfig {
    fn to_duration(&self) -> SqlResult<Duration> {
        Duration::try_from_secs_f64(self.duration).map_err(|e| {
            SqlError::Configuration(format!(
                "Invalid fault injection delay duration {}: {e}",
                self.duration
            ))
        })
    }
}

/// Configuration for failing statements without running them
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct AbortConfig {
    /// Message carried by the returned error
    #[serde(default)]
    message: Option<String>,

    /// Percentage of statements to abort (0-100). If not set, aborts all statements.
    #[serde(default)]
    #[validate(range(min = 0, max = 100))]
    percentage: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
struct InterceptorConfig {
    #[serde(default)]
    #[validate(nested)]
    delay: Option<DelayConfig>,

    #[serde(default)]
    #[validate(nested)]
    abort: Option<AbortConfig>,
}

impl TryFrom<JsonValue> for InterceptorConfig {
    type Error = SqlError;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        let config: InterceptorConfig = serde_json::from_value(value).map_err(|e| {
            SqlError::serialization_error("Invalid fault injection interceptor config", e)
        })?;

        config.validate()?;

        if let Some(delay) = &config.delay {
            delay.to_duration()?;
        }

        if config.delay.is_none() && config.abort.is_none() {
            return Err(SqlError::Configuration(
                "At least one of 'delay' or 'abort' must be configured".to_string(),
            ));
        }

        Ok(config)
    }
}

pub struct InterceptorFaultInjection {
    config: InterceptorConfig,
    delay: Option<Duration>,
}

impl InterceptorFaultInjection {
    /// Check if a fault should be applied based on the configured percentage
    fn sample_hit(percentage: Option<u32>) -> bool {
        match percentage {
            None => true,
            Some(pct) => rand::thread_rng().gen_range(1..=100) <= pct,
        }
    }

    /// The delay to apply, capped by the time the caller has left.
    fn delay<Q: Queryer>(&self, req: &Request<Q>) -> Option<Duration> {
        let delay = self.config.delay.as_ref()?;
        let duration = self.delay?;
        if !Self::sample_hit(delay.percentage) {
            return None;
        }
        Some(match req.context().remaining() {
            Some(remaining) => duration.min(remaining),
            None => duration,
        })
    }

    fn abort(&self) -> Option<SqlError> {
        let abort = self.config.abort.as_ref()?;
        Self::sample_hit(abort.percentage).then(|| {
            SqlError::Rejected(
                abort
                    .message
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ABORT_MESSAGE.to_string()),
            )
        })
    }
}

impl<Q: Queryer> Interceptor<Q> for InterceptorFaultInjection {
    fn name(&self) -> &str {
        INTERCEPTOR_NAME
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn intercept(&self, req: &mut Request<Q>, next: Next<'_, Q>) {
        if let Some(delay) = self.delay(req) {
            std::thread::sleep(delay);
        }

        if let Some(err) = self.abort() {
            warn!("Aborting {} statement: {err}", req.operation());
            req.set_error(err);
            return;
        }

        next.run(req);
    }
}
