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
use super::acker::Acker;
use super::consumer::Consumer;
use super::handler::{Callback, panic_message};
use super::lease_state::{LeaseOptions, LeaseState};
use super::leaser::DefaultLeaser;
use super::metrics::Metrics;
use super::options::SubscriberOptions;
use super::producer::{Producer, pull_backoff};
use super::queue::SharedReceiver;
use crate::error::{Cancelled, ShutdownTrigger, WorkerError};
use crate::stub::Stub;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::channel;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

type WorkerResult = Result<(), WorkerError>;

/// A pool of identical workers, cancelled together.
#[derive(Debug)]
struct Stage {
    name: &'static str,
    tasks: JoinSet<WorkerResult>,
    shutdown: CancellationToken,
    results: Vec<WorkerResult>,
}

impl Stage {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            tasks: JoinSet::new(),
            shutdown: CancellationToken::new(),
            results: Vec::new(),
        }
    }

    fn spawn<F>(&mut self, worker: F)
    where
        F: Future<Output = WorkerResult> + Send + 'static,
    {
        self.tasks.spawn(worker);
    }

    fn record(&mut self, result: Result<WorkerResult, JoinError>) {
        let result = match result {
            Ok(r) => r,
            Err(e) if e.is_panic() => Err(WorkerError::Panicked(
                panic_message(e.into_panic().as_ref()).to_string(),
            )),
            // Aborted after the drain timeout.
            Err(_) => Err(WorkerError::Cancelled),
        };
        self.results.push(result);
    }

    /// Cancels the workers and waits for them to exit.
    ///
    /// If `timeout` elapses first, the remaining workers are aborted.
    async fn drain(&mut self, timeout: Option<Duration>) {
        self.shutdown.cancel();
        let mut deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let next = match deadline {
                None => self.tasks.join_next().await,
                Some(d) => match tokio::time::timeout_at(d, self.tasks.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        tracing::warn!(
                            "aborting {} {} workers that did not stop in time",
                            self.tasks.len(),
                            self.name
                        );
                        self.tasks.abort_all();
                        deadline = None;
                        continue;
                    }
                },
            };
            match next {
                None => break,
                Some(r) => self.record(r),
            }
        }
    }
}

/// Represents a running subscriber.
///
/// The session owns three pools of workers:
/// - the producers pull messages, and queue them for their consumers,
/// - the consumers run the application callback, and send the results to the
///   ackers,
/// - the ackers send acks and nacks, and extend the leases of outstanding
///   messages.
///
/// Each producer has a private queue, shared by its consumers. The ackers
/// share a single results queue.
#[derive(Debug)]
pub(super) struct Session {
    subscription: String,
    cache: Arc<AckDeadlineCache>,
    shutdown_timeout: Duration,
    /// Releases the messages that were never processed, once the ackers stop.
    leftovers: LeaseState<DefaultLeaser>,
    producers: Stage,
    consumers: Stage,
    ackers: Stage,
}

impl Session {
    /// Starts all the workers.
    pub(super) fn start(
        inner: Arc<dyn Stub>,
        subscription: String,
        callback: Arc<dyn Callback>,
        options: SubscriberOptions,
        metrics: Metrics,
    ) -> Self {
        let num_producers = options.num_producers.max(1);
        let budget = options
            .max_messages_per_producer
            .clamp(1, Semaphore::MAX_PERMITS);
        let num_consumers = options.num_consumers_per_producer.max(1);
        let num_ackers = options.num_ackers.max(1);

        let cache = Arc::new(AckDeadlineCache::new(options.ack_deadline_cache_timeout));
        let (results_tx, results_rx) =
            channel(budget.saturating_mul(num_producers).min(Semaphore::MAX_PERMITS));
        let results_rx = SharedReceiver::new(results_rx);

        let leaser = DefaultLeaser::new(inner.clone(), subscription.clone());
        let lease_options = LeaseOptions::new(&options);
        let mut ackers = Stage::new("acker");
        for _ in 0..num_ackers {
            let state = LeaseState::new(
                leaser.clone(),
                cache.clone(),
                lease_options.clone(),
                metrics.clone(),
            );
            let acker = Acker::new(state, results_rx.clone(), ackers.shutdown.clone());
            ackers.spawn(acker.run());
        }

        let mut producers = Stage::new("producer");
        let mut consumers = Stage::new("consumer");
        for _ in 0..num_producers {
            let (work_tx, work_rx) = channel(budget);
            let work_rx = SharedReceiver::new(work_rx);
            for _ in 0..num_consumers {
                let consumer = Consumer {
                    work: work_rx.clone(),
                    results: results_tx.clone(),
                    callback: callback.clone(),
                    cache: cache.clone(),
                    metrics: metrics.clone(),
                    shutdown: consumers.shutdown.clone(),
                };
                consumers.spawn(consumer.run());
            }
            let producer = Producer {
                inner: inner.clone(),
                subscription: subscription.clone(),
                cache: cache.clone(),
                flow: Arc::new(Semaphore::new(budget)),
                work: work_tx,
                pull_timeout: options.pull_timeout,
                backoff: pull_backoff(),
                metrics: metrics.clone(),
                shutdown: producers.shutdown.clone(),
            };
            producers.spawn(producer.run());
        }
        tracing::debug!(
            "started subscriber for {subscription} with {num_producers} producers, \
             {num_consumers} consumers per producer and {num_ackers} ackers"
        );

        Self {
            subscription,
            leftovers: LeaseState::new(leaser, cache.clone(), lease_options, metrics),
            cache,
            shutdown_timeout: options.shutdown_timeout,
            producers,
            consumers,
            ackers,
        }
    }

    /// Runs until the application requests a shutdown, or any worker exits.
    ///
    /// Then drains the workers in pipeline order: producers, consumers and
    /// finally the ackers, so the ackers see every result. The messages left
    /// in the cache after that were never processed, and are nacked.
    pub(super) async fn run(mut self, shutdown: CancellationToken) -> Cancelled {
        let trigger = tokio::select! {
            _ = shutdown.cancelled() => ShutdownTrigger::Requested,
            Some(r) = self.producers.tasks.join_next() => {
                self.producers.record(r);
                ShutdownTrigger::WorkerExited
            },
            Some(r) = self.consumers.tasks.join_next() => {
                self.consumers.record(r);
                ShutdownTrigger::WorkerExited
            },
            Some(r) = self.ackers.tasks.join_next() => {
                self.ackers.record(r);
                ShutdownTrigger::WorkerExited
            },
        };
        tracing::info!(
            "shutting down the subscriber for {} with {} messages outstanding: {trigger}",
            self.subscription,
            self.cache.len()
        );

        self.producers.drain(None).await;
        self.consumers.drain(Some(self.shutdown_timeout)).await;
        // Reading the results queue and the final flush are each bounded by
        // the shutdown timeout. Leave the same again for any request in
        // progress.
        self.ackers
            .drain(Some(self.shutdown_timeout.saturating_mul(3)))
            .await;
        self.leftovers.release_leftovers().await;

        for stage in [&self.producers, &self.consumers, &self.ackers] {
            for result in &stage.results {
                match result {
                    Ok(()) => tracing::debug!(
                        "{} worker for {} completed",
                        stage.name,
                        self.subscription
                    ),
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => tracing::info!(
                        "{} worker for {} exited: {e}",
                        stage.name,
                        self.subscription
                    ),
                }
            }
        }
        Cancelled::new(trigger)
    }
}
