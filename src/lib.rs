// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod algorithms;    // built-in text algorithms
pub mod cache;         // ref-counted result cache
pub mod config;        // engine configuration
pub mod data;          // typed rows, annotations, slots, storage
pub mod engine;        // graph runs and the run queue
pub mod errors;        // error handling
pub mod graph;         // nodes, edges, validation, ordering
pub mod iteration;     // iteration step generation
pub mod observability;
pub mod project;       // graph + cache with edit invalidation
pub mod traits;        // algorithm and runnable abstractions
