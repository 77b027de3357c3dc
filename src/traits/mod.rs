// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod algorithm;
pub mod runnable;

pub use algorithm::Algorithm;
pub use runnable::{Runnable, RunnableFn};
