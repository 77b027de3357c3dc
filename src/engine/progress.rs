// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Hierarchical progress reporting and cooperative cancellation.
//!
//! A [`ProgressInfo`] is handed to every run. Children created with
//! [`resolve`](ProgressInfo::resolve) share the parent's cancellation token,
//! counters, and event channel, and extend its label path. Observers receive
//! [`ProgressEvent`]s with the full path joined by [`STATUS_PATH_SEPARATOR`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::consts::DEFAULT_EVENT_CAPACITY;
use crate::engine::RunId;

pub const STATUS_PATH_SEPARATOR: &str = " | ";

/// One status line published by a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub run: Option<RunId>,
    pub path: String,
    pub message: String,
    pub progress: usize,
    pub max: usize,
}

#[derive(Debug, Default)]
struct Counters {
    progress: AtomicUsize,
    max: AtomicUsize,
}

#[derive(Debug, Clone)]
pub struct ProgressInfo {
    run: Option<RunId>,
    labels: Vec<String>,
    token: CancellationToken,
    counters: Arc<Counters>,
    events: broadcast::Sender<ProgressEvent>,
}

impl ProgressInfo {
    /// A root progress publishing on `events`.
    pub fn new(
        run: Option<RunId>,
        events: broadcast::Sender<ProgressEvent>,
        token: CancellationToken,
    ) -> Self {
        Self {
            run,
            labels: Vec::new(),
            token,
            counters: Arc::new(Counters::default()),
            events,
        }
    }

    /// A root progress with its own channel and token, for work outside a queue.
    pub fn detached() -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        Self::new(None, events, CancellationToken::new())
    }

    pub fn run(&self) -> Option<RunId> {
        self.run
    }

    /// A child whose path ends with `label`.
    pub fn resolve(&self, label: impl Into<String>) -> ProgressInfo {
        let mut child = self.clone();
        child.labels.push(label.into());
        child
    }

    /// A child labelled `"<label> <i+1>/<n>"`, announced immediately.
    pub fn resolve_and_log(&self, label: &str, index: usize, total: usize) -> ProgressInfo {
        let child = self.resolve(format!("{} {}/{}", label, index + 1, total));
        child.log("");
        child
    }

    pub fn status_path(&self) -> String {
        self.labels.join(STATUS_PATH_SEPARATOR)
    }

    /// Publishes `message` under this progress' path.
    pub fn log(&self, message: impl Into<String>) {
        let event = ProgressEvent {
            run: self.run,
            path: self.status_path(),
            message: message.into(),
            progress: self.counters.progress.load(Ordering::Relaxed),
            max: self.counters.max.load(Ordering::Relaxed),
        };
        tracing::debug!(path = %event.path, progress = event.progress, max = event.max, "{}", event.message);
        let _ = self.events.send(event);
    }

    pub fn set_max(&self, max: usize) {
        self.counters.max.store(max, Ordering::Relaxed);
    }

    pub fn set_progress(&self, progress: usize) {
        self.counters.progress.store(progress, Ordering::Relaxed);
    }

    pub fn increment_progress(&self) -> usize {
        self.counters.progress.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn progress(&self) -> (usize, usize) {
        (
            self.counters.progress.load(Ordering::Relaxed),
            self.counters.max.load(Ordering::Relaxed),
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Requests cooperative cancellation of the whole run.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Completes once cancellation has been requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_path_joins_labels() {
        let root = ProgressInfo::detached();
        let child = root.resolve("Pipeline").resolve("Node 'upper'");
        assert_eq!(child.status_path(), "Pipeline | Node 'upper'");
        assert_eq!(root.status_path(), "");
    }

    #[test]
    fn test_resolve_and_log_numbers_from_one() {
        let root = ProgressInfo::detached();
        let mut events = root.subscribe();
        let row = root.resolve("Export").resolve_and_log("Data row", 0, 4);

        assert_eq!(row.status_path(), "Export | Data row 1/4");
        let event = events.try_recv().unwrap();
        assert_eq!(event.path, "Export | Data row 1/4");
        assert_eq!(event.message, "");
    }

    #[test]
    fn test_cancellation_is_shared_with_children() {
        let root = ProgressInfo::detached();
        let child = root.resolve("a").resolve("b");
        assert!(!child.is_cancelled());
        root.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_counters_are_shared() {
        let root = ProgressInfo::detached();
        root.set_max(3);
        let child = root.resolve("step");
        child.increment_progress();
        assert_eq!(root.progress(), (1, 3));
    }
}
