use std::fs;

use log::{debug, trace, LevelFilter};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::{Validate, ValidationError};

use crate::core::{ErrorContext, SqlError, SqlResult};

#[derive(Default, Debug, Serialize, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    #[serde(default)]
    pub log: Option<Log>,

    /// Interceptors to build, in configuration order. Chains built from this
    /// list are re-ordered by interceptor priority.
    #[validate(nested)]
    #[serde(default)]
    pub interceptors: Vec<InterceptorEntry>,
}

// Config file load and validation
impl Config {
    pub fn load_from_yaml<P>(path: P) -> SqlResult<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path)
            .map_err(|e| SqlError::Configuration(format!("Unable to read conf file from {path}: {e}")))?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    pub fn from_yaml(conf_str: &str) -> SqlResult<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str)
            .map_err(|e| SqlError::Configuration(format!("Unable to parse yaml conf: {e}")))?;

        trace!("Loaded conf: {conf:?}");

        // use validator to validate conf file
        conf.validate()?;

        Ok(conf)
    }

    pub fn to_yaml(&self) -> SqlResult<String> {
        serde_yaml::to_string(self).with_context("Unable to serialize conf")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Log {
    /// Log file path; logs go to stderr when unset.
    pub path: Option<String>,
    #[serde(default = "Log::default_level")]
    #[validate(custom(function = "Log::validate_level"))]
    pub level: String,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            path: None,
            level: Self::default_level(),
        }
    }
}

impl Log {
    fn default_level() -> String {
        "info".to_string()
    }

    fn validate_level(level: &String) -> Result<(), ValidationError> {
        level
            .parse::<LevelFilter>()
            .map(|_| ())
            .map_err(|_| ValidationError::new("invalid_log_level"))
    }

    pub fn level_filter(&self) -> LevelFilter {
        self.level.parse().unwrap_or(LevelFilter::Info)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct InterceptorEntry {
    #[validate(length(min = 1))]
    pub name: String,
    /// Interceptor-specific settings, handed to its factory as JSON.
    #[serde(default)]
    pub config: JsonValue,
}
