// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Default capacity of the run, progress, cache, and graph event channels
pub const DEFAULT_EVENT_CAPACITY: usize = 256;
/// Largest accepted event channel capacity
pub const MAX_EVENT_CAPACITY: usize = 65_536;
/// Terminal runs whose state a queue keeps answering `status` and `wait` for
pub const DEFAULT_RUN_HISTORY: usize = 1024;
/// Step parallelism used when the host parallelism cannot be queried
pub const DEFAULT_MAX_PARALLEL_STEPS: usize = 4;
/// Log filter used when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Host parallelism, or [`DEFAULT_MAX_PARALLEL_STEPS`] if unknown.
pub fn default_max_parallel_steps() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(DEFAULT_MAX_PARALLEL_STEPS)
}
