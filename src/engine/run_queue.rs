// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Single-flight FIFO run queue.
//!
//! The queue is an actor: a [`RunQueue`] handle sends commands over an
//! unbounded channel to one worker task that owns all scheduling state. At
//! most one run executes at a time; the next queued run starts only after the
//! current one reached a terminal state.
//!
//! ```text
//!  submit ──► [ queued: r3 r4 ] ──► running: r2 ──► Finished | Interrupted
//!                  │                    │
//!  cancel(r4) ─────┘ removed            └──── cancel(r2): token.cancel()
//! ```
//!
//! Cancelling a queued run removes it before its body is ever invoked.
//! Cancelling the running run is cooperative: its [`ProgressInfo`] reports
//! `is_cancelled()` and the body is expected to return
//! [`RunError::Cancelled`]. [`RunQueue::force_cancel`] aborts the task instead.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::config::consts::{DEFAULT_EVENT_CAPACITY, DEFAULT_RUN_HISTORY};
use crate::engine::{ProgressEvent, ProgressInfo};
use crate::errors::{RunError, RunQueueError};
use crate::observability::messages::queue::{
    CancelRequested, QueueShutdown, RunEnqueued, RunFinished, RunInterrupted, RunStarting,
};
use crate::observability::messages::StructuredLog;
use crate::traits::Runnable;

/// Identifier assigned to a run on submission. Ids increase in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(u64);

impl RunId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for RunId {
    fn from(value: u64) -> Self {
        RunId(value)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Why a run ended without finishing.
#[derive(Debug, Clone)]
pub enum Interruption {
    Cancelled,
    Failed(Arc<RunError>),
}

impl fmt::Display for Interruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interruption::Cancelled => write!(f, "cancelled"),
            Interruption::Failed(error) => write!(f, "failed: {}", error),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RunState {
    Queued,
    Running,
    Finished,
    Interrupted(Interruption),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Finished | RunState::Interrupted(_))
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, RunState::Finished)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunState::Interrupted(Interruption::Cancelled))
    }

    /// The error of a failed run.
    pub fn failure(&self) -> Option<&RunError> {
        match self {
            RunState::Interrupted(Interruption::Failed(error)) => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Queued => write!(f, "queued"),
            RunState::Running => write!(f, "running"),
            RunState::Finished => write!(f, "finished"),
            RunState::Interrupted(reason) => write!(f, "interrupted ({})", reason),
        }
    }
}

/// Lifecycle notifications published by the queue.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Enqueued { id: RunId, name: String },
    Started { id: RunId, name: String },
    Finished { id: RunId, name: String },
    Interrupted { id: RunId, name: String, reason: Interruption },
}

impl RunEvent {
    pub fn id(&self) -> RunId {
        match self {
            RunEvent::Enqueued { id, .. }
            | RunEvent::Started { id, .. }
            | RunEvent::Finished { id, .. }
            | RunEvent::Interrupted { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueueOptions {
    /// Capacity of the run and progress broadcast channels
    pub event_capacity: usize,
    /// Number of finished or interrupted runs whose state is retained. Older
    /// ones are forgotten and report as unknown.
    pub history_limit: usize,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            history_limit: DEFAULT_RUN_HISTORY,
        }
    }
}

/// What the worker is doing right now.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueSnapshot {
    pub running: Option<RunId>,
    pub queued: Vec<RunId>,
}

enum Command {
    Submit {
        id: RunId,
        runnable: Box<dyn Runnable>,
    },
    Cancel {
        id: RunId,
        force: bool,
        reply: oneshot::Sender<bool>,
    },
    Status {
        id: RunId,
        reply: oneshot::Sender<Option<RunState>>,
    },
    Wait {
        id: RunId,
        reply: oneshot::Sender<Option<RunState>>,
    },
    Snapshot {
        reply: oneshot::Sender<QueueSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the queue worker. Dropping it has the same effect as
/// [`shutdown`](Self::shutdown).
pub struct RunQueue {
    commands: mpsc::UnboundedSender<Command>,
    run_events: broadcast::Sender<RunEvent>,
    progress_events: broadcast::Sender<ProgressEvent>,
    next_id: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RunQueue {
    /// Spawns the worker on the current tokio runtime.
    pub fn start(options: QueueOptions) -> Self {
        let capacity = options.event_capacity.max(1);
        let (commands, receiver) = mpsc::unbounded_channel();
        let (run_events, _) = broadcast::channel(capacity);
        let (progress_events, _) = broadcast::channel(capacity);

        let worker = Worker {
            commands: receiver,
            queue: VecDeque::new(),
            current: None,
            states: HashMap::new(),
            history: VecDeque::new(),
            history_limit: options.history_limit,
            waiters: HashMap::new(),
            run_events: run_events.clone(),
            progress_events: progress_events.clone(),
        };
        let handle = tokio::spawn(worker.run());

        Self {
            commands,
            run_events,
            progress_events,
            next_id: AtomicU64::new(1),
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Appends `runnable` to the queue and returns its id.
    pub fn submit(&self, runnable: Box<dyn Runnable>) -> Result<RunId, RunQueueError> {
        let id = RunId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.commands
            .send(Command::Submit { id, runnable })
            .map_err(|_| RunQueueError::Closed)?;
        Ok(id)
    }

    /// Requests cancellation. Returns `false` when the run is unknown or
    /// already terminal.
    pub async fn cancel(&self, id: RunId) -> Result<bool, RunQueueError> {
        self.request(|reply| Command::Cancel {
            id,
            force: false,
            reply,
        })
        .await
    }

    /// Like [`cancel`](Self::cancel), but aborts a running task at its next
    /// await point instead of waiting for it to notice.
    pub async fn force_cancel(&self, id: RunId) -> Result<bool, RunQueueError> {
        self.request(|reply| Command::Cancel {
            id,
            force: true,
            reply,
        })
        .await
    }

    pub async fn status(&self, id: RunId) -> Result<Option<RunState>, RunQueueError> {
        self.request(|reply| Command::Status { id, reply }).await
    }

    /// Completes once the run reached a terminal state.
    pub async fn wait(&self, id: RunId) -> Result<RunState, RunQueueError> {
        self.request(|reply| Command::Wait { id, reply })
            .await?
            .ok_or(RunQueueError::UnknownRun(id))
    }

    pub async fn snapshot(&self) -> Result<QueueSnapshot, RunQueueError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub fn subscribe_runs(&self) -> broadcast::Receiver<RunEvent> {
        self.run_events.subscribe()
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress_events.subscribe()
    }

    /// Cancels the running run, discards queued ones, and stops the worker.
    pub async fn shutdown(&self) -> Result<(), RunQueueError> {
        self.request(|reply| Command::Shutdown { reply }).await?;
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        Ok(())
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RunQueueError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| RunQueueError::Closed)?;
        response.await.map_err(|_| RunQueueError::Closed)
    }
}

struct Queued {
    id: RunId,
    runnable: Box<dyn Runnable>,
}

struct Current {
    id: RunId,
    name: String,
    token: CancellationToken,
    started: Instant,
    handle: JoinHandle<Result<(), RunError>>,
}

struct Worker {
    commands: mpsc::UnboundedReceiver<Command>,
    queue: VecDeque<Queued>,
    current: Option<Current>,
    states: HashMap<RunId, (String, RunState)>,
    /// Terminal runs, oldest first
    history: VecDeque<RunId>,
    history_limit: usize,
    waiters: HashMap<RunId, Vec<oneshot::Sender<Option<RunState>>>>,
    run_events: broadcast::Sender<RunEvent>,
    progress_events: broadcast::Sender<ProgressEvent>,
}

/// Resolves with the current run's result, or never when idle.
async fn join_current(
    current: &mut Option<Current>,
) -> Result<Result<(), RunError>, JoinError> {
    match current {
        Some(current) => (&mut current.handle).await,
        None => std::future::pending().await,
    }
}

impl Worker {
    async fn run(mut self) {
        loop {
            self.start_next();
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.shutdown().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle(command),
                    None => {
                        self.shutdown().await;
                        break;
                    }
                },
                result = join_current(&mut self.current) => self.finish_current(result),
            }
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Submit { id, runnable } => {
                let name = runnable.name();
                self.states.insert(id, (name.clone(), RunState::Queued));
                self.queue.push_back(Queued { id, runnable });
                RunEnqueued {
                    run_id: &id,
                    name: &name,
                    queued: self.queue.len(),
                }
                .log();
                let _ = self.run_events.send(RunEvent::Enqueued { id, name });
            }
            Command::Cancel { id, force, reply } => {
                let _ = reply.send(self.cancel(id, force));
            }
            Command::Status { id, reply } => {
                let _ = reply.send(self.states.get(&id).map(|(_, state)| state.clone()));
            }
            Command::Wait { id, reply } => match self.states.get(&id) {
                Some((_, state)) if state.is_terminal() => {
                    let _ = reply.send(Some(state.clone()));
                }
                Some(_) => self.waiters.entry(id).or_default().push(reply),
                None => {
                    let _ = reply.send(None);
                }
            },
            Command::Snapshot { reply } => {
                let _ = reply.send(QueueSnapshot {
                    running: self.current.as_ref().map(|current| current.id),
                    queued: self.queue.iter().map(|queued| queued.id).collect(),
                });
            }
            // Handled by the loop
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn cancel(&mut self, id: RunId, force: bool) -> bool {
        if let Some(position) = self.queue.iter().position(|queued| queued.id == id) {
            CancelRequested {
                run_id: &id,
                target: "queued",
            }
            .log();
            self.queue.remove(position);
            self.complete(id, RunState::Interrupted(Interruption::Cancelled), None);
            return true;
        }
        match &self.current {
            Some(current) if current.id == id => {
                CancelRequested {
                    run_id: &id,
                    target: if force { "forced" } else { "running" },
                }
                .log();
                current.token.cancel();
                if force {
                    current.handle.abort();
                }
                true
            }
            _ => false,
        }
    }

    fn start_next(&mut self) {
        if self.current.is_some() {
            return;
        }
        let Some(Queued { id, runnable }) = self.queue.pop_front() else {
            return;
        };
        let name = runnable.name();
        RunStarting {
            run_id: &id,
            name: &name,
        }
        .log();
        self.states.insert(id, (name.clone(), RunState::Running));
        let _ = self.run_events.send(RunEvent::Started {
            id,
            name: name.clone(),
        });

        let token = CancellationToken::new();
        let progress = ProgressInfo::new(Some(id), self.progress_events.clone(), token.clone());
        let handle = tokio::spawn(async move { runnable.run(progress).await });
        self.current = Some(Current {
            id,
            name,
            token,
            started: Instant::now(),
            handle,
        });
    }

    fn finish_current(&mut self, result: Result<Result<(), RunError>, JoinError>) {
        let Some(current) = self.current.take() else {
            return;
        };
        let state = match result {
            Ok(Ok(())) => RunState::Finished,
            Ok(Err(RunError::Cancelled)) => RunState::Interrupted(Interruption::Cancelled),
            Ok(Err(error)) => RunState::Interrupted(Interruption::Failed(Arc::new(error))),
            Err(error) if error.is_cancelled() => RunState::Interrupted(Interruption::Cancelled),
            Err(error) => RunState::Interrupted(Interruption::Failed(Arc::new(
                RunError::Panicked(error.to_string()),
            ))),
        };
        self.complete(current.id, state, Some(current.started.elapsed()));
    }

    /// Records a terminal state, publishes it, and wakes waiters.
    fn complete(&mut self, id: RunId, state: RunState, elapsed: Option<Duration>) {
        let name = self
            .states
            .get(&id)
            .map(|(name, _)| name.clone())
            .unwrap_or_default();
        match &state {
            RunState::Finished => {
                RunFinished {
                    run_id: &id,
                    name: &name,
                    duration: elapsed.unwrap_or_default(),
                }
                .log();
                let _ = self.run_events.send(RunEvent::Finished {
                    id,
                    name: name.clone(),
                });
            }
            RunState::Interrupted(reason) => {
                let text = reason.to_string();
                RunInterrupted {
                    run_id: &id,
                    name: &name,
                    reason: &text,
                }
                .log();
                let _ = self.run_events.send(RunEvent::Interrupted {
                    id,
                    name: name.clone(),
                    reason: reason.clone(),
                });
            }
            RunState::Queued | RunState::Running => {}
        }
        for waiter in self.waiters.remove(&id).unwrap_or_default() {
            let _ = waiter.send(Some(state.clone()));
        }
        self.states.insert(id, (name, state));
        self.history.push_back(id);
        self.prune();
    }

    /// Forgets the oldest terminal runs beyond the history limit.
    fn prune(&mut self) {
        while self.history.len() > self.history_limit {
            if let Some(id) = self.history.pop_front() {
                self.states.remove(&id);
            }
        }
    }

    async fn shutdown(&mut self) {
        let discarded: Vec<RunId> = self.queue.drain(..).map(|queued| queued.id).collect();
        QueueShutdown {
            discarded: discarded.len(),
        }
        .log();
        for id in discarded {
            self.complete(id, RunState::Interrupted(Interruption::Cancelled), None);
        }
        if let Some(current) = &self.current {
            current.token.cancel();
        }
        let result = join_current(&mut self.current).await;
        if self.current.is_some() {
            self.finish_current(result);
        }
    }
}
