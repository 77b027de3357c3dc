// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Every diagnostic and operational log line of the engine is a message struct
//! implementing `Display` for the human-readable text and [`StructuredLog`]
//! for emission with structured fields.
//!
//! # Organization
//!
//! * `engine` - graph run lifecycle and node execution events
//! * `queue` - run queue scheduling and cancellation events
//! * `cache` - memory cache stores, invalidations, and releases
//! * `config` - engine configuration loading
//! * `storage` - slot import and export
//! * `validation` - graph validation outcomes
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_slotflow::observability::messages::engine::RunStarted;
//! use the_slotflow::observability::messages::StructuredLog;
//!
//! let msg = RunStarted {
//!     run: "pipeline",
//!     node_count: 3,
//! };
//!
//! msg.log();
//! ```

use tracing::Span;

pub mod cache;
pub mod config;
pub mod engine;
pub mod queue;
pub mod storage;
pub mod validation;

/// A message that knows its own log level and structured fields.
pub trait StructuredLog {
    /// Emits the message at its level with structured fields.
    fn log(&self);

    /// A span carrying the same fields, named `name`.
    fn span(&self, name: &str) -> Span;
}
