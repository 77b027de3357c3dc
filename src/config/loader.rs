// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    default_max_parallel_steps, DEFAULT_EVENT_CAPACITY, DEFAULT_LOG_FILTER, DEFAULT_RUN_HISTORY,
    MAX_EVENT_CAPACITY,
};
use crate::engine::{QueueOptions, RunSettings};
use crate::errors::ConfigError;
use crate::observability::messages::config::ConfigLoaded;
use crate::observability::messages::StructuredLog;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Engine configuration, typically loaded from a YAML file.
///
/// Every section is optional and falls back to built-in defaults.
///
/// # Fields
/// * `executor_options` - Step parallelism
/// * `cache` - Whether runs read from and write to the memory cache
/// * `events` - Capacity of the broadcast event channels
/// * `queue` - How many finished runs the queue remembers
/// * `logging` - Default log filter for the binary
///
/// # Example
/// ```yaml
/// executor_options:
///   max_parallel_steps: 4
/// cache:
///   enabled: true
///   store_results: true
/// events:
///   capacity: 512
/// queue:
///   history_limit: 100
/// logging:
///   filter: "the_slotflow=debug"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub executor_options: ExecutorOptions,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub events: EventConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Executor-specific configuration options.
///
/// # Fields
/// * `max_parallel_steps` - Maximum number of concurrently running steps of one node (optional, defaults to host parallelism)
#[derive(Debug, Default, Deserialize)]
pub struct ExecutorOptions {
    pub max_parallel_steps: Option<usize>,
}

impl ExecutorOptions {
    pub fn get_max_parallel_steps(&self) -> usize {
        self.max_parallel_steps
            .unwrap_or_else(default_max_parallel_steps)
    }
}

/// Memory cache behavior of runs.
///
/// # Fields
/// * `enabled` - Skip nodes whose outputs are all cached (defaults to true)
/// * `store_results` - Store node outputs after execution (defaults to true)
#[derive(Debug, Default, Deserialize)]
pub struct CacheConfig {
    pub enabled: Option<bool>,
    pub store_results: Option<bool>,
}

impl CacheConfig {
    pub fn get_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn get_store_results(&self) -> bool {
        self.store_results.unwrap_or(true)
    }
}

/// Broadcast channel sizing.
///
/// Slow subscribers lag and skip events once a channel holds `capacity`
/// unread events.
#[derive(Debug, Default, Deserialize)]
pub struct EventConfig {
    pub capacity: Option<usize>,
}

impl EventConfig {
    pub fn get_capacity(&self) -> usize {
        self.capacity.unwrap_or(DEFAULT_EVENT_CAPACITY)
    }
}

/// Retention of terminal run states in the run queue.
#[derive(Debug, Default, Deserialize)]
pub struct QueueConfig {
    pub history_limit: Option<usize>,
}

impl QueueConfig {
    pub fn get_history_limit(&self) -> usize {
        self.history_limit.unwrap_or(DEFAULT_RUN_HISTORY)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    /// `tracing-subscriber` `EnvFilter` directive, overridden by `RUST_LOG`
    pub filter: Option<String>,
}

impl LoggingConfig {
    pub fn get_filter(&self) -> &str {
        self.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

impl EngineConfig {
    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            use_cache: self.cache.get_enabled(),
            store_to_cache: self.cache.get_store_results(),
            max_parallel_steps: self.executor_options.get_max_parallel_steps(),
        }
    }

    /// Logs the settings taken from `source`, or from the built-in defaults.
    pub fn log_loaded(&self, source: Option<&Path>) {
        ConfigLoaded {
            source,
            max_parallel_steps: self.executor_options.get_max_parallel_steps(),
            use_cache: self.cache.get_enabled(),
            history_limit: self.queue.get_history_limit(),
        }
        .log();
    }

    pub fn queue_options(&self) -> QueueOptions {
        QueueOptions {
            event_capacity: self.events.get_capacity(),
            history_limit: self.queue.get_history_limit(),
        }
    }

    /// Rejects values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executor_options.max_parallel_steps == Some(0) {
            return Err(ConfigError::Invalid(
                "executor_options.max_parallel_steps must be at least 1".to_string(),
            ));
        }
        if self.queue.history_limit == Some(0) {
            return Err(ConfigError::Invalid(
                "queue.history_limit must be at least 1".to_string(),
            ));
        }
        match self.events.capacity {
            Some(0) => Err(ConfigError::Invalid(
                "events.capacity must be at least 1".to_string(),
            )),
            Some(capacity) if capacity > MAX_EVENT_CAPACITY => Err(ConfigError::Invalid(format!(
                "events.capacity {} exceeds the maximum of {}",
                capacity, MAX_EVENT_CAPACITY
            ))),
            _ => Ok(()),
        }
    }
}

/// Load a config from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg: EngineConfig = serde_yaml::from_str(&content)?;
    Ok(cfg)
}

/// Load and validate a config from a YAML file
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let cfg = load_config(path)?;
    cfg.validate()?;
    cfg.log_loaded(Some(path));
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
executor_options:
  max_parallel_steps: 3
cache:
  enabled: false
  store_results: true
events:
  capacity: 64
queue:
  history_limit: 10
logging:
  filter: "the_slotflow=trace"
"#;

        let cfg: EngineConfig = serde_yaml::from_str(yaml).unwrap();
        let settings = cfg.run_settings();
        assert_eq!(settings.max_parallel_steps, 3);
        assert!(!settings.use_cache);
        assert!(settings.store_to_cache);
        assert_eq!(cfg.queue_options().event_capacity, 64);
        assert_eq!(cfg.queue_options().history_limit, 10);
        assert_eq!(cfg.logging.get_filter(), "the_slotflow=trace");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: EngineConfig = serde_yaml::from_str("{}").unwrap();
        assert!(cfg.cache.get_enabled());
        assert!(cfg.cache.get_store_results());
        assert_eq!(cfg.events.get_capacity(), DEFAULT_EVENT_CAPACITY);
        assert_eq!(cfg.queue.get_history_limit(), DEFAULT_RUN_HISTORY);
        assert_eq!(cfg.logging.get_filter(), DEFAULT_LOG_FILTER);
        assert_eq!(
            cfg.executor_options.get_max_parallel_steps(),
            default_max_parallel_steps()
        );
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_parallelism_is_rejected() {
        let cfg: EngineConfig =
            serde_yaml::from_str("executor_options:\n  max_parallel_steps: 0\n").unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_history_limit_is_rejected() {
        let cfg: EngineConfig = serde_yaml::from_str("queue:\n  history_limit: 0\n").unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_oversized_event_capacity_is_rejected() {
        let cfg: EngineConfig = serde_yaml::from_str("events:\n  capacity: 1000000\n").unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_and_validate_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cache:\n  enabled: false").unwrap();

        let cfg = load_and_validate_config(file.path()).unwrap();
        assert!(!cfg.run_settings().use_cache);
    }

    #[test]
    fn test_loaded_config_is_logged() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "executor_options:\n  max_parallel_steps: 2").unwrap();

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            load_and_validate_config(file.path()).unwrap();
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Loaded engine config from"));
        assert!(output.contains("max 2 parallel steps"));
    }

    #[test]
    fn test_missing_file_and_bad_yaml() {
        let err = load_config("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cache: [not, a, map]").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
