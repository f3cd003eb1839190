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

use super::handler::AckResult;
use super::lease_state::LeaseState;
use super::leaser::Leaser;
use super::queue::SharedReceiver;
use crate::error::WorkerError;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tokio_util::sync::CancellationToken;

/// Sends the acks and nacks from the consumers, and keeps the leases of the
/// outstanding messages alive.
#[derive(Debug)]
pub(super) struct Acker<L>
where
    L: Leaser,
{
    state: LeaseState<L>,
    results: SharedReceiver<AckResult>,
    shutdown: CancellationToken,
}

impl<L> Acker<L>
where
    L: Leaser + Send + Sync + 'static,
{
    pub(super) fn new(
        state: LeaseState<L>,
        results: SharedReceiver<AckResult>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            state,
            results,
            shutdown,
        }
    }

    /// Runs the acker until it is cancelled, or all the consumers are gone.
    ///
    /// In both cases it reads the remaining results until the queue closes,
    /// then makes a final attempt to send the pending acks and nacks. Neither
    /// step is interrupted by the cancellation, each is bounded by the
    /// shutdown timeout instead. Messages that were never processed stay in
    /// the cache, see [LeaseState::release_leftovers].
    pub(super) async fn run(mut self) -> Result<(), WorkerError> {
        let period = self.state.options().extend_period();
        let mut extend = interval_at(Instant::now() + period, period);
        extend.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = loop {
            let next_flush = self.state.next_flush();
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break Err(WorkerError::Cancelled),
                _ = sleep_until(next_flush.unwrap_or_else(Instant::now)), if next_flush.is_some() => {
                    self.state.flush_due(Instant::now()).await;
                },
                result = self.results.recv() => {
                    match result {
                        None => break Ok(()),
                        Some(r) => {
                            let now = Instant::now();
                            self.state.record(r, now);
                            while let Some(r) = self.results.try_recv() {
                                self.state.record(r, now);
                            }
                            self.state.flush_due(now).await;
                        }
                    }
                },
                _ = extend.tick() => self.state.extend(Instant::now()).await,
            }
        };

        // The queue closes once the consumers are drained. Record everything
        // before the final flush, other ackers may be reading it too.
        let timeout = self.state.options().shutdown_timeout;
        let state = &mut self.state;
        let results = &self.results;
        let drain = async {
            while let Some(r) = results.recv().await {
                state.record(r, Instant::now());
            }
        };
        if tokio::time::timeout(timeout, drain).await.is_err() {
            tracing::warn!("timed out waiting for the consumers to finish");
        }
        self.state.shutdown().await;
        result
    }
}
