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
use super::handler::{AckResult, Callback, invoke};
use super::metrics::{ConsumeOutcome, Metrics, Phase};
use super::producer::WorkItem;
use super::queue::SharedReceiver;
use crate::error::WorkerError;
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Runs the application callback for the messages pulled by one producer.
pub(super) struct Consumer {
    pub(super) work: SharedReceiver<WorkItem>,
    pub(super) results: Sender<AckResult>,
    pub(super) callback: Arc<dyn Callback>,
    pub(super) cache: Arc<AckDeadlineCache>,
    pub(super) metrics: Metrics,
    pub(super) shutdown: CancellationToken,
}

impl Consumer {
    /// Runs the consumer until it is cancelled, or its producer is gone and
    /// the queue is empty.
    ///
    /// Cancellation is only observed between messages. A callback in
    /// progress runs to completion, and its result is sent to the ackers.
    pub(super) async fn run(self) -> Result<(), WorkerError> {
        loop {
            let item = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Err(WorkerError::Cancelled),
                item = self.work.recv() => item,
            };
            let Some(item) = item else {
                return Ok(());
            };
            let WorkItem {
                message,
                pulled_at,
                permit,
            } = item;

            let now = Instant::now();
            if !self.cache.is_live(&message.ack_id, now) {
                // The lease lapsed while the message was queued. The service
                // redelivers it.
                tracing::debug!("skipping message {}, its lease expired", message.ack_id);
                self.metrics.record_consume(ConsumeOutcome::Expired);
                continue;
            }
            self.metrics
                .record_latency(Phase::Queueing, now.saturating_duration_since(pulled_at));

            let result = invoke(self.callback.as_ref(), message).await;
            self.metrics.record_latency(Phase::Runtime, now.elapsed());
            self.metrics.record_consume(match result {
                AckResult::Ack(_) => ConsumeOutcome::Succeeded,
                AckResult::Nack(_) => ConsumeOutcome::Failed,
            });

            if let Err(e) = self.results.send(result).await {
                tracing::debug!("dropping the result for {}, the ackers are gone", e.0.ack_id());
                return Err(WorkerError::QueueClosed("results"));
            }
            // The message is no longer outstanding for its producer.
            drop(permit);
        }
    }
}
