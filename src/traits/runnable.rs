// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::future::Future;

use async_trait::async_trait;

use crate::engine::ProgressInfo;
use crate::errors::RunError;

/// A unit of work accepted by the [`RunQueue`](crate::engine::RunQueue).
///
/// The body is consumed when it starts. It should check
/// [`ProgressInfo::is_cancelled`] at its own safe points and return
/// [`RunError::Cancelled`] when it stops early.
#[async_trait]
pub trait Runnable: Send + 'static {
    fn name(&self) -> String;

    async fn run(self: Box<Self>, progress: ProgressInfo) -> Result<(), RunError>;
}

/// Adapts an async closure into a [`Runnable`].
pub struct RunnableFn<F> {
    name: String,
    body: F,
}

impl<F, Fut> RunnableFn<F>
where
    F: FnOnce(ProgressInfo) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), RunError>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, body: F) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    pub fn boxed(name: impl Into<String>, body: F) -> Box<dyn Runnable> {
        Box::new(Self::new(name, body))
    }
}

#[async_trait]
impl<F, Fut> Runnable for RunnableFn<F>
where
    F: FnOnce(ProgressInfo) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), RunError>> + Send + 'static,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn run(self: Box<Self>, progress: ProgressInfo) -> Result<(), RunError> {
        let RunnableFn { body, .. } = *self;
        body(progress).await
    }
}
