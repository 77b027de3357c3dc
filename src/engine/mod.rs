// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Graph execution and the run queue that serializes it.

mod graph_run;
mod progress;
mod run_queue;

pub use graph_run::{GraphRun, RunOutputs, RunSettings};
pub use progress::{ProgressEvent, ProgressInfo, STATUS_PATH_SEPARATOR};
pub use run_queue::{
    Interruption, QueueOptions, QueueSnapshot, RunEvent, RunId, RunQueue, RunState,
};
