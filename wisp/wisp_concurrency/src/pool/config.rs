//! Thread pool configuration.
//!
//! Configuration comes from three layers, later ones winning: the built-in
//! defaults, an optional TOML document, and environment variables.
//!
//! ```toml
//! threads = 4
//! thread_name_prefix = "render-io"
//! collect_stats = false
//! ```

use serde::{Deserialize, Serialize};
use wisp_core::ConfigError;

/// Environment variable overriding the worker count.
pub const ENV_THREADS: &str = "WISP_POOL_THREADS";

/// Environment variable overriding the worker thread name prefix.
pub const ENV_THREAD_PREFIX: &str = "WISP_POOL_THREAD_PREFIX";

/// Configuration for the thread pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadPoolConfig {
    /// Number of worker threads
    pub threads: usize,

    /// Name prefix for worker threads
    pub thread_name_prefix: String,

    /// Whether to collect performance statistics
    pub collect_stats: bool,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            thread_name_prefix: "wisp-worker".to_string(),
            collect_stats: true,
        }
    }
}

/// Hardware concurrency minus one, leaving a core for the submitting thread.
pub fn default_threads() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

impl ThreadPoolConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Used by [`with_env_overrides`](Self::with_env_overrides); tests pass
    /// their own lookup instead of mutating the process environment.
    pub fn with_overrides_from<L>(mut self, lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_THREADS) {
            self.threads = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv {
                    key: ENV_THREADS.to_string(),
                    value: raw.clone(),
                })?;
        }

        if let Some(prefix) = lookup(ENV_THREAD_PREFIX) {
            self.thread_name_prefix = prefix;
        }

        self.validate()?;
        Ok(self)
    }

    /// Check that the configuration describes a usable pool.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::InvalidValue {
                field: "threads",
                reason: "a pool needs at least one worker".to_string(),
            });
        }
        Ok(())
    }
}
