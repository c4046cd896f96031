//! Pool configuration.

use crate::error::{Error, Result};
use std::time::Duration;

/// Pool construction parameters.
///
/// All values have sensible defaults; use [`Config::builder`] to override
/// individual fields.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of worker threads. `None` means one per logical processor.
    pub num_threads: Option<usize>,

    /// Prefix for worker thread names; the worker index is appended.
    pub thread_name_prefix: String,

    /// Stack size for worker threads, if overridden.
    pub stack_size: Option<usize>,

    /// Upper bound on how long an idle worker stays parked before
    /// re-checking its queue and the shutdown flag.
    pub idle_park_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: None,
            thread_name_prefix: "conveyor-worker".to_string(),
            stack_size: None,
            idle_park_timeout: Duration::from_millis(1),
        }
    }
}

impl Config {
    /// Start building a config.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Validate field values.
    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_threads {
            if n == 0 {
                return Err(Error::config("num_threads must be > 0"));
            }
            if n > 1024 {
                return Err(Error::config("num_threads too large (max 1024)"));
            }
        }

        if self.idle_park_timeout.is_zero() {
            return Err(Error::config("idle_park_timeout must be > 0"));
        }

        Ok(())
    }

    /// Resolved worker count: the configured value, or the number of
    /// logical processors.
    pub fn worker_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }
}

/// Builder for [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a builder holding the default config.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Set the worker thread count.
    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    /// Set the worker thread name prefix.
    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Set the worker thread stack size.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Set the idle park timeout.
    pub fn idle_park_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_park_timeout = timeout;
        self
    }

    /// Validate and produce the config.
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_threads_rejected() {
        let result = Config::builder().num_threads(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn zero_park_timeout_rejected() {
        let result = Config::builder()
            .idle_park_timeout(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_overrides() {
        let config = Config::builder()
            .num_threads(3)
            .thread_name_prefix("test-worker")
            .stack_size(1024 * 1024)
            .build()
            .unwrap();

        assert_eq!(config.worker_threads(), 3);
        assert_eq!(config.thread_name_prefix, "test-worker");
        assert_eq!(config.stack_size, Some(1024 * 1024));
    }
}
