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

use super::ack_deadline_cache::AckDeadlineCache;
use super::leaser::MAX_LEASE_SECONDS;
use super::metrics::Metrics;
use super::retry_policy::SubscriberRetryPolicy;
use crate::error::WorkerError;
use crate::model::{PullRequest, PullResponse, ReceivedMessage};
use crate::stub::Stub;
use gax::backoff_policy::BackoffPolicy;
use gax::exponential_backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use gax::options::RequestOptions;
use gax::retry_result::RetryResult;
use gax::retry_state::RetryState;
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// The lease assumed when the service does not report one.
const DEFAULT_LEASE: Duration = Duration::from_secs(10);

/// The backoff between pull attempts that failed with a transient error.
pub(super) fn pull_backoff() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_delay(Duration::from_secs(1))
        .with_maximum_delay(Duration::from_secs(60))
        .with_scaling(2.0)
        .clamp()
}

/// A message waiting for a consumer.
#[derive(Debug)]
pub(super) struct WorkItem {
    pub(super) message: ReceivedMessage,
    pub(super) pulled_at: Instant,
    /// Counts the message against its producer's outstanding messages, until
    /// the consumer is done with it.
    pub(super) permit: OwnedSemaphorePermit,
}

/// Pulls messages from the subscription, and queues them for the consumers.
pub(super) struct Producer {
    pub(super) inner: Arc<dyn Stub>,
    pub(super) subscription: String,
    pub(super) cache: Arc<AckDeadlineCache>,
    /// One permit for each message this producer may have outstanding.
    pub(super) flow: Arc<Semaphore>,
    pub(super) work: Sender<WorkItem>,
    pub(super) pull_timeout: Duration,
    pub(super) backoff: ExponentialBackoff,
    pub(super) metrics: Metrics,
    pub(super) shutdown: CancellationToken,
}

impl Producer {
    /// Runs the pull loop until it is cancelled, or a pull fails with a
    /// permanent error.
    ///
    /// Cancellation interrupts a pull in progress. Any messages already
    /// pulled but not queued remain under lease management, they are rejected
    /// once the ackers stop.
    pub(super) async fn run(self) -> Result<(), WorkerError> {
        let mut failures = 0_u32;
        loop {
            let capacity = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Err(WorkerError::Cancelled),
                c = self.capacity() => c?,
            };
            let response = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Err(WorkerError::Cancelled),
                r = self.pull(capacity) => r,
            };
            let messages = match response {
                Ok(r) => {
                    failures = 0;
                    r.received_messages
                }
                Err(e) => match SubscriberRetryPolicy::on_error(e) {
                    RetryResult::Continue(e) => {
                        failures = failures.saturating_add(1);
                        let delay = self
                            .backoff
                            .on_failure(&RetryState::new(true).set_attempt_count(failures));
                        tracing::warn!(
                            "transient error pulling from {}, retrying in {delay:?}: {e}",
                            self.subscription
                        );
                        tokio::select! {
                            biased;
                            _ = self.shutdown.cancelled() => return Err(WorkerError::Cancelled),
                            _ = tokio::time::sleep(delay) => {},
                        }
                        continue;
                    }
                    RetryResult::Permanent(e) | RetryResult::Exhausted(e) => {
                        return Err(WorkerError::Pull(e));
                    }
                },
            };
            self.enqueue(messages).await?;
        }
    }

    /// Waits until at least one more message can be outstanding, and returns
    /// how many.
    async fn capacity(&self) -> Result<usize, WorkerError> {
        loop {
            let available = self.flow.available_permits();
            if available > 0 {
                return Ok(available);
            }
            // Wait for a consumer to release a permit, without holding it.
            let _permit = self
                .flow
                .acquire()
                .await
                .map_err(|_| WorkerError::QueueClosed("flow control"))?;
        }
    }

    async fn pull(&self, max_messages: usize) -> crate::Result<PullResponse> {
        let req = PullRequest::new()
            .set_subscription(self.subscription.clone())
            .set_max_messages(i32::try_from(max_messages).unwrap_or(i32::MAX));
        let mut options = RequestOptions::default();
        options.set_attempt_timeout(self.pull_timeout);
        match tokio::time::timeout(self.pull_timeout, self.inner.pull(req, options)).await {
            Ok(r) => r,
            Err(_) => {
                // Same as an empty response, the service had nothing for us.
                tracing::debug!("pull request for {} timed out", self.subscription);
                Ok(PullResponse::default())
            }
        }
    }

    async fn enqueue(&self, messages: Vec<ReceivedMessage>) -> Result<(), WorkerError> {
        if messages.is_empty() {
            return Ok(());
        }
        self.metrics.record_batch(messages.len());
        let pulled_at = Instant::now();
        // Register all the leases before any message is visible to the
        // consumers.
        for m in &messages {
            let lease = if m.ack_deadline.is_zero() {
                DEFAULT_LEASE
            } else {
                m.ack_deadline.min(Duration::from_secs(MAX_LEASE_SECONDS))
            };
            self.cache.set(m.ack_id.clone(), lease);
        }

        for message in messages {
            let send = async {
                let permit = self
                    .flow
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| WorkerError::QueueClosed("flow control"))?;
                let item = WorkItem {
                    message,
                    pulled_at,
                    permit,
                };
                self.work
                    .send(item)
                    .await
                    .map_err(|_| WorkerError::QueueClosed("work"))
            };
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Err(WorkerError::Cancelled),
                r = send => r?,
            }
        }
        Ok(())
    }
}
