use std::{
    fs::{create_dir_all, OpenOptions},
    path::Path,
};

use env_logger::{Builder, Target};

use crate::{
    config,
    core::{SqlError, SqlResult},
};

/// Installs the process-wide logger described by a [`config::Log`] section.
pub struct Logger {
    config: config::Log,
}

impl Logger {
    pub fn new(config: config::Log) -> Self {
        Self { config }
    }

    fn builder(&self) -> SqlResult<Builder> {
        let mut builder = Builder::from_env(env_logger::Env::default());
        builder.filter(None, self.config.level_filter());

        if let Some(log_file_path) = &self.config.path {
            if let Some(parent) = Path::new(log_file_path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    create_dir_all(parent).map_err(|e| {
                        SqlError::Configuration(format!("Failed to create log path: {e}"))
                    })?;
                }
            }

            let file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(log_file_path)
                .map_err(|e| {
                    SqlError::Configuration(format!(
                        "Failed to open or create log file {log_file_path}: {e}"
                    ))
                })?;
            builder.target(Target::Pipe(Box::new(file)));
        }

        Ok(builder)
    }

    /// Install the logger. Fails if a global logger is already set.
    pub fn init_env_logger(&self) -> SqlResult<()> {
        self.builder()?
            .try_init()
            .map_err(|e| SqlError::Configuration(format!("Failed to install logger: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creates_log_file() {
        let dir = std::env::temp_dir().join(format!("sqlchain-log-{}", std::process::id()));
        let path = dir.join("nested").join("sqlchain.log");
        let logger = Logger::new(config::Log {
            path: Some(path.to_string_lossy().into_owned()),
            level: "debug".to_string(),
        });

        assert!(logger.builder().is_ok());
        assert!(path.exists());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_builder_without_path() {
        let logger = Logger::new(config::Log::default());
        assert!(logger.builder().is_ok());
    }
}
