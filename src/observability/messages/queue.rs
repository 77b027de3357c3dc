// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for run queue scheduling events.

use crate::engine::RunId;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A run was accepted by the queue.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_slotflow::engine::RunId;
/// use the_slotflow::observability::messages::queue::RunEnqueued;
///
/// let id = RunId::from(7);
/// let msg = RunEnqueued {
///     run_id: &id,
///     name: "pipeline",
///     queued: 2,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct RunEnqueued<'a> {
    pub run_id: &'a RunId,
    pub name: &'a str,
    /// Runs waiting after this one was added
    pub queued: usize,
}

impl Display for RunEnqueued<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Enqueued {} '{}' ({} waiting)",
            self.run_id, self.name, self.queued
        )
    }
}

impl StructuredLog for RunEnqueued<'_> {
    fn log(&self) {
        tracing::info!(
            run_id = %self.run_id,
            name = self.name,
            queued = self.queued,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "run_enqueued",
            span_name = name,
            run_id = %self.run_id,
            name = self.name,
        )
    }
}

/// The worker picked up a run.
///
/// # Log Level
/// `info!` - Important operational event
pub struct RunStarting<'a> {
    pub run_id: &'a RunId,
    pub name: &'a str,
}

impl Display for RunStarting<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Starting {} '{}'", self.run_id, self.name)
    }
}

impl StructuredLog for RunStarting<'_> {
    fn log(&self) {
        tracing::info!(run_id = %self.run_id, name = self.name, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "run",
            span_name = name,
            run_id = %self.run_id,
            name = self.name,
        )
    }
}

/// A run finished without error.
///
/// # Log Level
/// `info!` - Important operational event
pub struct RunFinished<'a> {
    pub run_id: &'a RunId,
    pub name: &'a str,
    pub duration: Duration,
}

impl Display for RunFinished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Finished {} '{}' in {:?}",
            self.run_id, self.name, self.duration
        )
    }
}

impl StructuredLog for RunFinished<'_> {
    fn log(&self) {
        tracing::info!(
            run_id = %self.run_id,
            name = self.name,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "run_finished",
            span_name = name,
            run_id = %self.run_id,
            duration = ?self.duration,
        )
    }
}

/// A run ended by cancellation or failure.
///
/// # Log Level
/// `warn!` - Run ended without results
pub struct RunInterrupted<'a> {
    pub run_id: &'a RunId,
    pub name: &'a str,
    pub reason: &'a str,
}

impl Display for RunInterrupted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Interrupted {} '{}': {}",
            self.run_id, self.name, self.reason
        )
    }
}

impl StructuredLog for RunInterrupted<'_> {
    fn log(&self) {
        tracing::warn!(
            run_id = %self.run_id,
            name = self.name,
            reason = self.reason,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "run_interrupted",
            span_name = name,
            run_id = %self.run_id,
            reason = self.reason,
        )
    }
}

/// Cancellation was requested for a run.
///
/// # Log Level
/// `info!` - Important operational event
pub struct CancelRequested<'a> {
    pub run_id: &'a RunId,
    /// `queued`, `running`, or `forced`
    pub target: &'a str,
}

impl Display for CancelRequested<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Cancel requested for {} run {}", self.target, self.run_id)
    }
}

impl StructuredLog for CancelRequested<'_> {
    fn log(&self) {
        tracing::info!(run_id = %self.run_id, target = self.target, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "cancel_requested",
            span_name = name,
            run_id = %self.run_id,
            target = self.target,
        )
    }
}

/// The queue worker stopped.
///
/// # Log Level
/// `info!` - Important operational event
pub struct QueueShutdown {
    /// Queued runs dropped without starting
    pub discarded: usize,
}

impl Display for QueueShutdown {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Run queue shut down, {} queued run(s) discarded",
            self.discarded
        )
    }
}

impl StructuredLog for QueueShutdown {
    fn log(&self) {
        tracing::info!(discarded = self.discarded, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("queue_shutdown", span_name = name, discarded = self.discarded)
    }
}
