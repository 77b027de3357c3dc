// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for engine configuration.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::path::Path;
use tracing::Span;

/// Engine configuration was read and validated.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_slotflow::observability::messages::config::ConfigLoaded;
/// use std::path::Path;
///
/// let msg = ConfigLoaded {
///     source: Some(Path::new("configs/engine.yaml")),
///     max_parallel_steps: 4,
///     use_cache: true,
///     history_limit: 1024,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ConfigLoaded<'a> {
    /// `None` when built-in defaults are used
    pub source: Option<&'a Path>,
    pub max_parallel_steps: usize,
    pub use_cache: bool,
    pub history_limit: usize,
}

impl Display for ConfigLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.source {
            Some(path) => write!(f, "Loaded engine config from {}", path.display())?,
            None => write!(f, "Using built-in engine config")?,
        }
        write!(
            f,
            " (max {} parallel steps, cache {}, {} runs of history)",
            self.max_parallel_steps,
            if self.use_cache { "on" } else { "off" },
            self.history_limit
        )
    }
}

impl StructuredLog for ConfigLoaded<'_> {
    fn log(&self) {
        tracing::info!(
            source = ?self.source,
            max_parallel_steps = self.max_parallel_steps,
            use_cache = self.use_cache,
            history_limit = self.history_limit,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "config_load",
            span_name = name,
            source = ?self.source,
        )
    }
}
