// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Instrumented algorithms for engine tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::Notify;

use crate::algorithms::text_of;
use crate::data::{Annotations, DataType, ReadMode, SlotInfo, TextData};
use crate::engine::ProgressInfo;
use crate::iteration::{IterationContext, IterationStep};
use crate::traits::Algorithm;

fn text_ports() -> (Vec<SlotInfo>, Vec<SlotInfo>) {
    (
        vec![SlotInfo::input("Input", DataType::text())],
        vec![SlotInfo::output("Output", DataType::text())],
    )
}

fn copy_inputs(step: &IterationStep, ctx: &mut IterationContext) -> anyhow::Result<()> {
    for item in step.data("Input", ReadMode::Share)? {
        let text = text_of(&item)?.to_string();
        ctx.add_output("Output", TextData::item(text), Annotations::new())?;
    }
    Ok(())
}

/// Copies its input and counts invocations.
#[derive(Default)]
pub struct CountingAlgorithm {
    pub calls: Arc<AtomicUsize>,
}

impl CountingAlgorithm {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Algorithm for CountingAlgorithm {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn input_slots(&self) -> Vec<SlotInfo> {
        text_ports().0
    }

    fn output_slots(&self) -> Vec<SlotInfo> {
        text_ports().1
    }

    async fn run_iteration(
        &self,
        step: &IterationStep,
        ctx: &mut IterationContext,
        _progress: &ProgressInfo,
    ) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        copy_inputs(step, ctx)
    }
}

/// Copies its input, failing on rows whose text equals `fail_on`.
pub struct FailingAlgorithm {
    pub fail_on: String,
}

impl FailingAlgorithm {
    pub fn new(fail_on: impl Into<String>) -> Self {
        Self {
            fail_on: fail_on.into(),
        }
    }
}

#[async_trait]
impl Algorithm for FailingAlgorithm {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn input_slots(&self) -> Vec<SlotInfo> {
        text_ports().0
    }

    fn output_slots(&self) -> Vec<SlotInfo> {
        text_ports().1
    }

    async fn run_iteration(
        &self,
        step: &IterationStep,
        ctx: &mut IterationContext,
        _progress: &ProgressInfo,
    ) -> anyhow::Result<()> {
        for item in step.data("Input", ReadMode::Share)? {
            if text_of(&item)? == self.fail_on {
                return Err(anyhow!("refusing to process '{}'", self.fail_on));
            }
        }
        copy_inputs(step, ctx)
    }
}

/// Copies its input after a delay inversely proportional to the step index,
/// so later steps finish first. Tracks peak concurrency.
#[derive(Default)]
pub struct SlowAlgorithm {
    pub active: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
}

impl SlowAlgorithm {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Algorithm for SlowAlgorithm {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn input_slots(&self) -> Vec<SlotInfo> {
        text_ports().0
    }

    fn output_slots(&self) -> Vec<SlotInfo> {
        text_ports().1
    }

    async fn run_iteration(
        &self,
        step: &IterationStep,
        ctx: &mut IterationContext,
        _progress: &ProgressInfo,
    ) -> anyhow::Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let remaining = ctx.step_count().saturating_sub(step.index()) as u64;
        tokio::time::sleep(Duration::from_millis(5 * remaining)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        copy_inputs(step, ctx)
    }
}

/// Signals `started` on its first step, then finishes that step only once
/// the run was cancelled.
#[derive(Default)]
pub struct BlockingAlgorithm {
    pub started: Arc<Notify>,
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Algorithm for BlockingAlgorithm {
    fn name(&self) -> &'static str {
        "blocking"
    }

    fn input_slots(&self) -> Vec<SlotInfo> {
        text_ports().0
    }

    fn output_slots(&self) -> Vec<SlotInfo> {
        text_ports().1
    }

    fn supports_parallel_steps(&self) -> bool {
        false
    }

    async fn run_iteration(
        &self,
        step: &IterationStep,
        ctx: &mut IterationContext,
        progress: &ProgressInfo,
    ) -> anyhow::Result<()> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.started.notify_one();
            progress.cancelled().await;
        }
        copy_inputs(step, ctx)
    }
}

/// Signals `started` at the beginning of every step, then waits for one
/// `release` permit before copying its input.
#[derive(Default)]
pub struct GatedAlgorithm {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[async_trait]
impl Algorithm for GatedAlgorithm {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn input_slots(&self) -> Vec<SlotInfo> {
        text_ports().0
    }

    fn output_slots(&self) -> Vec<SlotInfo> {
        text_ports().1
    }

    async fn run_iteration(
        &self,
        step: &IterationStep,
        ctx: &mut IterationContext,
        _progress: &ProgressInfo,
    ) -> anyhow::Result<()> {
        self.started.notify_one();
        self.release.notified().await;
        copy_inputs(step, ctx)
    }
}

/// Sleeps for `delay` in every step without watching for cancellation and
/// counts the steps that ran to completion.
pub struct SleepingAlgorithm {
    pub delay: Duration,
    pub started: Arc<Notify>,
    pub completed: Arc<AtomicUsize>,
}

impl SleepingAlgorithm {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: Arc::default(),
            completed: Arc::default(),
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Algorithm for SleepingAlgorithm {
    fn name(&self) -> &'static str {
        "sleeping"
    }

    fn input_slots(&self) -> Vec<SlotInfo> {
        text_ports().0
    }

    fn output_slots(&self) -> Vec<SlotInfo> {
        text_ports().1
    }

    async fn run_iteration(
        &self,
        step: &IterationStep,
        ctx: &mut IterationContext,
        _progress: &ProgressInfo,
    ) -> anyhow::Result<()> {
        self.started.notify_one();
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        copy_inputs(step, ctx)
    }
}
