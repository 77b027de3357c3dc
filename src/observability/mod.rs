// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structured logging for the engine.
//!
//! Log lines are message structs with a `Display` implementation, so there are
//! no format strings scattered through the engine and every event carries the
//! same structured fields wherever it is emitted.
//!
//! # Architecture
//!
//! * `messages::engine` - graph run lifecycle and node execution events
//! * `messages::queue` - run queue scheduling and cancellation events
//! * `messages::cache` - memory cache events
//! * `messages::config` - engine configuration loading
//! * `messages::storage` - slot import and export
//! * `messages::validation` - graph validation outcomes
//!
//! Subscribers are installed by the binary with `tracing-subscriber`; the
//! library only emits events.

pub mod messages;
