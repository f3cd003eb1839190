// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Custom errors for the Cloud Pub/Sub subscriber.
//!
//! Remote calls fail with [Error][crate::Error]. The types in this module
//! describe how the subscriber itself terminates.

/// The terminal outcome of a subscriber.
///
/// A subscriber never returns normally. Whether the application requested the
/// shutdown, or one of the background workers exited unexpectedly, the
/// subscriber drains all its workers and then returns this error.
///
/// Failures in the background workers are logged, and are not returned to the
/// application. [Cancelled::trigger] reports what started the shutdown.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("the subscriber shut down ({trigger})")]
pub struct Cancelled {
    pub(crate) trigger: ShutdownTrigger,
}

impl Cancelled {
    pub(crate) fn new(trigger: ShutdownTrigger) -> Self {
        Self { trigger }
    }

    /// What started the shutdown.
    pub fn trigger(&self) -> ShutdownTrigger {
        self.trigger
    }
}

/// What started a subscriber shutdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ShutdownTrigger {
    /// The application cancelled the shutdown token.
    Requested,
    /// A background worker exited while the subscriber was running.
    WorkerExited,
}

impl std::fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownTrigger::Requested => write!(f, "shutdown requested"),
            ShutdownTrigger::WorkerExited => write!(f, "a worker exited unexpectedly"),
        }
    }
}

/// The terminal result of a background worker.
#[derive(thiserror::Error, Debug)]
pub(crate) enum WorkerError {
    /// The worker observed the shutdown signal. This is the expected outcome.
    #[error("the worker was cancelled")]
    Cancelled,

    /// A pull request failed with a non-retryable error.
    #[error("cannot pull messages from the subscription: {0}")]
    Pull(#[source] crate::Error),

    /// A queue connecting two stages of the pipeline was closed early.
    #[error("the {0} queue was closed")]
    QueueClosed(&'static str),

    /// The worker panicked.
    #[error("the worker panicked: {0}")]
    Panicked(String),
}

impl WorkerError {
    pub(crate) fn is_cancelled(&self) -> bool {
        matches!(self, WorkerError::Cancelled)
    }
}
