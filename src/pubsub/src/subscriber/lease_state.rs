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
use super::handler::AckResult;
use super::leaser::{Leaser, MAX_LEASE_SECONDS};
use super::metrics::{Component, Metrics};
use super::options::SubscriberOptions;
use super::retry_policy::SubscriberRetryPolicy;
use crate::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::{Duration, Instant};

/// The maximum number of ack IDs in a single request.
pub(super) const MAX_IDS_PER_REQUEST: usize = 2500;

const MIN_PERIOD: Duration = Duration::from_millis(100);

#[derive(Clone, Debug, PartialEq)]
pub(super) struct LeaseOptions {
    pub(super) ack_window: Duration,
    pub(super) nack_window: Duration,
    pub(super) enable_nack: bool,
    pub(super) extension_margin: Duration,
    pub(super) shutdown_timeout: Duration,
}

impl LeaseOptions {
    pub(super) fn new(options: &SubscriberOptions) -> Self {
        Self {
            ack_window: options.ack_window,
            nack_window: options.nack_window,
            enable_nack: options.enable_nack,
            extension_margin: options.extension_margin,
            shutdown_timeout: options.shutdown_timeout,
        }
    }

    /// How often the leases are checked for extension.
    pub(super) fn extend_period(&self) -> Duration {
        self.ack_window.max(MIN_PERIOD)
    }
}

impl Default for LeaseOptions {
    fn default() -> Self {
        Self::new(&SubscriberOptions::default())
    }
}

/// An ack ID waiting to be sent.
#[derive(Clone, Debug, PartialEq)]
struct Pending {
    ack_id: String,
    /// Transient failures are retried until this time. `None` if the message
    /// was no longer under lease: those are sent once.
    retry_until: Option<Instant>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Disposition {
    Ack,
    Nack,
}

impl Disposition {
    fn component(self) -> Component {
        match self {
            Disposition::Ack => Component::Ack,
            Disposition::Nack => Component::Nack,
        }
    }
}

/// The state of one acker.
///
/// Recording an outcome takes the message out of the [AckDeadlineCache], so
/// its lease is no longer extended. The ack IDs are then batched, and sent
/// when their window closes.
#[derive(Debug)]
pub(super) struct LeaseState<L>
where
    L: Leaser,
{
    cache: Arc<AckDeadlineCache>,
    to_ack: Vec<Pending>,
    to_nack: Vec<Pending>,
    ack_flush: Option<Instant>,
    nack_flush: Option<Instant>,
    leaser: L,
    options: LeaseOptions,
    metrics: Metrics,
}

impl<L> LeaseState<L>
where
    L: Leaser + Send + Sync,
{
    pub(super) fn new(
        leaser: L,
        cache: Arc<AckDeadlineCache>,
        options: LeaseOptions,
        metrics: Metrics,
    ) -> Self {
        Self {
            cache,
            to_ack: Vec::new(),
            to_nack: Vec::new(),
            ack_flush: None,
            nack_flush: None,
            leaser,
            options,
            metrics,
        }
    }

    pub(super) fn options(&self) -> &LeaseOptions {
        &self.options
    }

    /// Process an outcome from a consumer.
    pub(super) fn record(&mut self, result: AckResult, now: Instant) {
        match result {
            AckResult::Ack(ack_id) => self.ack(ack_id, now),
            AckResult::Nack(ack_id) => self.nack(ack_id, now),
        }
    }

    fn ack(&mut self, ack_id: String, now: Instant) {
        // Unconditionally add the ack ID to the next ack batch. It doesn't hurt
        // to optimistically add it, even if its lease has expired.
        let retry_until = self.cache.take(&ack_id);
        self.to_ack.push(Pending {
            ack_id,
            retry_until,
        });
        self.ack_flush.get_or_insert(now + self.options.ack_window);
    }

    fn nack(&mut self, ack_id: String, now: Instant) {
        if !self.options.enable_nack {
            // The service redelivers the message when its lease lapses.
            self.cache.remove(&ack_id);
            return;
        }
        // Only add the ack ID to the nack batch if the message is under our
        // lease. If the message's lease has already expired, we do not need
        // to take any additional action.
        if let Some(expires_at) = self.cache.take(&ack_id) {
            self.to_nack.push(Pending {
                ack_id,
                retry_until: Some(expires_at),
            });
            self.nack_flush.get_or_insert(now + self.options.nack_window);
        }
    }

    /// When the next batch is due, if any.
    pub(super) fn next_flush(&self) -> Option<Instant> {
        match (self.ack_flush, self.nack_flush) {
            (Some(a), Some(n)) => Some(a.min(n)),
            (a, n) => a.or(n),
        }
    }

    /// Sends the batches whose window closed.
    pub(super) async fn flush_due(&mut self, now: Instant) {
        if self.ack_flush.is_some_and(|t| t <= now) {
            self.flush_acks(now).await;
        }
        if self.nack_flush.is_some_and(|t| t <= now) {
            self.flush_nacks(now).await;
        }
    }

    async fn flush_acks(&mut self, now: Instant) {
        let to_ack = std::mem::take(&mut self.to_ack);
        self.to_ack = self.send(Disposition::Ack, to_ack, now).await;
        self.ack_flush = (!self.to_ack.is_empty())
            .then(|| now + self.options.ack_window.max(MIN_PERIOD));
    }

    async fn flush_nacks(&mut self, now: Instant) {
        let to_nack = std::mem::take(&mut self.to_nack);
        self.to_nack = self.send(Disposition::Nack, to_nack, now).await;
        self.nack_flush = (!self.to_nack.is_empty())
            .then(|| now + self.options.nack_window.max(MIN_PERIOD));
    }

    /// Sends a batch, returning the ack IDs to retry.
    async fn send(
        &self,
        disposition: Disposition,
        pending: Vec<Pending>,
        now: Instant,
    ) -> Vec<Pending> {
        let component = disposition.component();
        let mut retry = Vec::new();
        for chunk in pending.chunks(MAX_IDS_PER_REQUEST) {
            let ack_ids: Vec<String> = chunk.iter().map(|p| p.ack_id.clone()).collect();
            match self.dispose(disposition, ack_ids).await {
                Ok(()) => {
                    self.metrics.record_batch_status(component, true);
                    self.metrics.record_processed(component, chunk.len());
                }
                Err(e) if SubscriberRetryPolicy::is_transient(&e) => {
                    self.metrics.record_batch_status(component, false);
                    tracing::warn!(
                        "transient error sending {component:?} for {} messages, will retry: {e}",
                        chunk.len()
                    );
                    retry.extend(
                        chunk
                            .iter()
                            .filter(|p| p.retry_until.is_some_and(|t| t > now))
                            .cloned(),
                    );
                }
                Err(e) => {
                    self.metrics.record_batch_status(component, false);
                    tracing::warn!(
                        "error sending {component:?} for {} messages, sending them one at a time: {e}",
                        chunk.len()
                    );
                    self.send_individually(disposition, chunk).await;
                }
            }
        }
        retry
    }

    /// A single bad ack ID fails the whole batch. Try them one at a time, and
    /// give up on the ones that still fail.
    async fn send_individually(&self, disposition: Disposition, chunk: &[Pending]) {
        let component = disposition.component();
        for p in chunk {
            match self.dispose(disposition, vec![p.ack_id.clone()]).await {
                Ok(()) => self.metrics.record_processed(component, 1),
                Err(e) => tracing::debug!(
                    "dropping {component:?} for message {}: {e}",
                    p.ack_id
                ),
            }
        }
    }

    async fn dispose(&self, disposition: Disposition, ack_ids: Vec<String>) -> Result<()> {
        match disposition {
            Disposition::Ack => self.leaser.ack(ack_ids).await,
            Disposition::Nack => self.leaser.nack(ack_ids).await,
        }
    }

    /// Extends leases for messages under lease management
    ///
    /// Drops messages whose lease deadline cannot be extended any further.
    pub(super) async fn extend(&mut self, now: Instant) {
        let expired = self.cache.drop_expired(now);
        if !expired.is_empty() {
            tracing::debug!(
                "dropping {} messages whose lease cannot be extended",
                expired.len()
            );
        }

        let margin = self.options.extension_margin + self.options.extend_period();
        let mut by_lease: BTreeMap<u64, Vec<String>> = BTreeMap::new();
        for (ack_id, lease) in self.cache.due_for_extension(now, margin) {
            let seconds = lease.as_secs().clamp(1, MAX_LEASE_SECONDS);
            by_lease.entry(seconds).or_default().push(ack_id);
        }

        for (seconds, ack_ids) in by_lease {
            let lease = Duration::from_secs(seconds);
            for chunk in ack_ids.chunks(MAX_IDS_PER_REQUEST) {
                match self.leaser.extend(chunk.to_vec(), lease).await {
                    Ok(()) => {
                        for ack_id in chunk {
                            self.cache.refresh(ack_id, lease, now);
                        }
                        self.metrics.record_batch_status(Component::Extend, true);
                        self.metrics.record_processed(Component::Extend, chunk.len());
                    }
                    Err(e) => {
                        // The messages are still due, the next tick retries.
                        for ack_id in chunk {
                            self.cache.release(ack_id);
                        }
                        self.metrics.record_batch_status(Component::Extend, false);
                        tracing::warn!(
                            "error extending the lease for {} messages: {e}",
                            chunk.len()
                        );
                    }
                }
            }
        }
    }

    /// Nacks the messages that were pulled but never processed.
    ///
    /// Run this once, after every acker recorded its outcomes. The leftovers
    /// are then flushed like [shutdown][Self::shutdown] does.
    pub(super) async fn release_leftovers(mut self) {
        let leftovers = self.cache.drain();
        if self.options.enable_nack && !leftovers.is_empty() {
            tracing::debug!("nacking {} unprocessed messages", leftovers.len());
            self.to_nack
                .extend(leftovers.into_iter().map(|(ack_id, expires_at)| Pending {
                    ack_id,
                    retry_until: Some(expires_at),
                }));
        }
        self.shutdown().await;
    }

    /// Shutdown the leaser
    ///
    /// This flushes all pending acks and nacks. Transient failures are
    /// retried until the shutdown timeout.
    pub(super) async fn shutdown(mut self) {
        let timeout = self.options.shutdown_timeout;
        let period = self.options.extend_period();
        let flush = async {
            loop {
                let now = Instant::now();
                self.flush_acks(now).await;
                self.flush_nacks(now).await;
                if self.to_ack.is_empty() && self.to_nack.is_empty() {
                    break;
                }
                tokio::time::sleep(period).await;
            }
        };
        if tokio::time::timeout(timeout, flush).await.is_err() {
            tracing::warn!(
                "timed out flushing acks and nacks during shutdown, the service redelivers \
                 {} acked and {} nacked messages",
                self.to_ack.len(),
                self.to_nack.len()
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::super::leaser::tests::MockLeaser;
    use super::*;
    use gax::error::rpc::{Code, Status};

    const LEASE: Duration = Duration::from_secs(10);

    pub(crate) fn test_id(v: i32) -> String {
        format!("{v:03}")
    }

    pub(crate) fn test_ids(range: std::ops::Range<i32>) -> Vec<String> {
        range.map(test_id).collect()
    }

    fn sorted(v: &[String]) -> Vec<String> {
        let mut s = v.to_owned();
        s.sort();
        s
    }

    fn pending(ack_ids: Vec<String>, retry_until: Option<Instant>) -> Vec<Pending> {
        ack_ids
            .into_iter()
            .map(|ack_id| Pending {
                ack_id,
                retry_until,
            })
            .collect()
    }

    fn make_state(
        mock: MockLeaser,
        options: LeaseOptions,
    ) -> (LeaseState<MockLeaser>, Arc<AckDeadlineCache>) {
        let cache = Arc::new(AckDeadlineCache::new(None));
        let state = LeaseState::new(mock, cache.clone(), options, Metrics::global());
        (state, cache)
    }

    fn add(cache: &AckDeadlineCache, range: std::ops::Range<i32>, now: Instant) {
        for id in test_ids(range) {
            cache.set_at(id, LEASE, now);
        }
    }

    fn transient() -> crate::Error {
        crate::Error::service(
            Status::default()
                .set_code(Code::Unavailable)
                .set_message("try again"),
        )
    }

    fn permanent() -> crate::Error {
        crate::Error::service(
            Status::default()
                .set_code(Code::InvalidArgument)
                .set_message("fail"),
        )
    }

    #[test]
    fn basic_ack_nack() {
        let (mut state, cache) = make_state(MockLeaser::new(), LeaseOptions::default());
        let now = Instant::now();
        add(&cache, 0..4, now);
        let expires_at = Some(now + LEASE);

        state.record(AckResult::Ack(test_id(0)), now);
        assert_eq!(state.to_ack, pending(test_ids(0..1), expires_at));
        assert_eq!(state.next_flush(), Some(now + Duration::from_millis(300)));

        let later = now + Duration::from_millis(100);
        state.record(AckResult::Nack(test_id(1)), later);
        state.record(AckResult::Ack(test_id(2)), later);
        assert_eq!(state.to_ack, pending(vec![test_id(0), test_id(2)], expires_at));
        assert_eq!(state.to_nack, pending(test_ids(1..2), expires_at));
        // The windows open with the first outcome.
        assert_eq!(state.ack_flush, Some(now + Duration::from_millis(300)));
        assert_eq!(state.nack_flush, Some(later + Duration::from_millis(300)));
        assert_eq!(state.next_flush(), Some(now + Duration::from_millis(300)));

        // The messages are no longer under lease management.
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&test_id(3)));
    }

    #[test]
    fn ack_out_of_lease_included() {
        let (mut state, _cache) = make_state(MockLeaser::new(), LeaseOptions::default());
        let now = Instant::now();
        state.record(AckResult::Ack("1".to_string()), now);
        assert_eq!(state.to_ack, pending(vec!["1".to_string()], None));
    }

    #[test]
    fn nack_out_of_lease_ignored() {
        let (mut state, _cache) = make_state(MockLeaser::new(), LeaseOptions::default());
        let now = Instant::now();
        state.record(AckResult::Nack("1".to_string()), now);
        assert!(state.to_nack.is_empty());
        assert_eq!(state.next_flush(), None);
    }

    #[test]
    fn nack_disabled() {
        let options = LeaseOptions {
            enable_nack: false,
            ..LeaseOptions::default()
        };
        let (mut state, cache) = make_state(MockLeaser::new(), options);
        let now = Instant::now();
        add(&cache, 0..2, now);
        state.record(AckResult::Nack(test_id(0)), now);
        assert!(state.to_nack.is_empty());
        assert_eq!(state.next_flush(), None);
        assert!(!cache.contains(&test_id(0)));
        assert!(cache.contains(&test_id(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn flush() {
        let mut mock = MockLeaser::new();
        mock.expect_ack()
            .times(1)
            .withf(|v| sorted(v) == test_ids(0..10))
            .returning(|_| Ok(()));
        mock.expect_nack()
            .times(1)
            .withf(|v| sorted(v) == test_ids(10..20))
            .returning(|_| Ok(()));

        let (mut state, cache) = make_state(mock, LeaseOptions::default());
        let now = Instant::now();
        add(&cache, 0..100, now);
        for i in 0..10 {
            state.record(AckResult::Ack(test_id(i)), now);
        }
        for i in 10..20 {
            state.record(AckResult::Nack(test_id(i)), now);
        }
        assert_eq!(cache.len(), 80);

        // Nothing is due yet.
        state.flush_due(now).await;
        assert_eq!(state.to_ack.len(), 10);
        assert_eq!(state.to_nack.len(), 10);

        state.flush_due(now + Duration::from_millis(300)).await;
        assert!(state.to_ack.is_empty());
        assert!(state.to_nack.is_empty());
        assert_eq!(state.next_flush(), None);
        assert_eq!(cache.len(), 80);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_windows() {
        let options = LeaseOptions {
            ack_window: Duration::from_millis(100),
            nack_window: Duration::from_millis(500),
            ..LeaseOptions::default()
        };
        let mut mock = MockLeaser::new();
        mock.expect_ack().times(1).returning(|_| Ok(()));
        let (mut state, cache) = make_state(mock, options);
        let now = Instant::now();
        add(&cache, 0..2, now);
        state.record(AckResult::Ack(test_id(0)), now);
        state.record(AckResult::Nack(test_id(1)), now);

        state.flush_due(now + Duration::from_millis(100)).await;
        assert!(state.to_ack.is_empty());
        assert_eq!(state.to_nack, pending(test_ids(1..2), Some(now + LEASE)));
        assert_eq!(state.next_flush(), Some(now + Duration::from_millis(500)));
    }

    #[tokio::test(start_paused = true)]
    async fn flush_chunks() {
        let mut seq = mockall::Sequence::new();
        let mut mock = MockLeaser::new();
        mock.expect_ack()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|v| v.len() == MAX_IDS_PER_REQUEST)
            .returning(|_| Ok(()));
        mock.expect_ack()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|v| v.len() == 500)
            .returning(|_| Ok(()));

        let (mut state, _cache) = make_state(mock, LeaseOptions::default());
        let now = Instant::now();
        for i in 0..3000 {
            state.record(AckResult::Ack(format!("{i:05}")), now);
        }
        state.flush_due(now + Duration::from_secs(1)).await;
        assert!(state.to_ack.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_transient_error_retries() {
        let mut seq = mockall::Sequence::new();
        let mut mock = MockLeaser::new();
        mock.expect_ack()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|v| sorted(v) == test_ids(0..3))
            .returning(|_| Err(transient()));
        mock.expect_ack()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|v| sorted(v) == test_ids(1..3))
            .returning(|_| Ok(()));

        let (mut state, cache) = make_state(mock, LeaseOptions::default());
        let now = Instant::now();
        add(&cache, 1..3, now);
        // 000 is not under lease, it is not retried.
        for i in 0..3 {
            state.record(AckResult::Ack(test_id(i)), now);
        }

        let t1 = now + Duration::from_millis(300);
        state.flush_due(t1).await;
        assert_eq!(state.to_ack, pending(test_ids(1..3), Some(now + LEASE)));
        assert_eq!(state.next_flush(), Some(t1 + Duration::from_millis(300)));

        state.flush_due(t1 + Duration::from_millis(300)).await;
        assert!(state.to_ack.is_empty());
        assert_eq!(state.next_flush(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_transient_error_gives_up_after_lease() {
        let mut mock = MockLeaser::new();
        mock.expect_nack()
            .times(1)
            .returning(|_| Err(transient()));

        let (mut state, cache) = make_state(mock, LeaseOptions::default());
        let now = Instant::now();
        add(&cache, 0..1, now);
        state.record(AckResult::Nack(test_id(0)), now);

        state.flush_due(now + LEASE).await;
        assert!(state.to_nack.is_empty());
        assert_eq!(state.next_flush(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_permanent_error_one_at_a_time() {
        let mut mock = MockLeaser::new();
        mock.expect_ack()
            .times(1)
            .withf(|v| v.len() == 3)
            .returning(|_| Err(permanent()));
        mock.expect_ack()
            .times(3)
            .withf(|v| v.len() == 1)
            .returning(|v| {
                if v[0] == test_id(1) {
                    Err(permanent())
                } else {
                    Ok(())
                }
            });

        let (mut state, cache) = make_state(mock, LeaseOptions::default());
        let now = Instant::now();
        add(&cache, 0..3, now);
        for i in 0..3 {
            state.record(AckResult::Ack(test_id(i)), now);
        }
        state.flush_due(now + Duration::from_secs(1)).await;
        assert!(state.to_ack.is_empty());
        assert_eq!(state.next_flush(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn extend() {
        let mut seq = mockall::Sequence::new();
        let mut mock = MockLeaser::new();
        mock.expect_extend()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|v, l| sorted(v) == test_ids(0..10) && *l == LEASE)
            .returning(|_, _| Ok(()));
        mock.expect_extend()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|v, l| sorted(v) == test_ids(5..10) && *l == LEASE)
            .returning(|_, _| Ok(()));

        let (mut state, cache) = make_state(mock, LeaseOptions::default());
        let start = Instant::now();
        add(&cache, 0..10, start);

        // Not due yet.
        state.extend(start).await;

        // Due: 10s lease, 2s margin and 300ms period.
        let t1 = start + Duration::from_millis(7_800);
        state.extend(t1).await;
        assert!(cache.due_for_extension(t1, Duration::from_secs(3)).is_empty());

        // Ack the first 5 messages. We should not extend these leases.
        for i in 0..5 {
            state.record(AckResult::Ack(test_id(i)), t1);
        }
        state.extend(t1 + Duration::from_millis(7_800)).await;
        assert_eq!(cache.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn extend_skips_claimed() {
        let mut mock = MockLeaser::new();
        mock.expect_extend()
            .times(1)
            .withf(|v, _| sorted(v) == test_ids(5..10))
            .returning(|_, _| Ok(()));

        let (mut state, cache) = make_state(mock, LeaseOptions::default());
        let start = Instant::now();
        add(&cache, 0..10, start);
        let now = start + Duration::from_millis(7_800);
        // Another acker claims all ten, then gives five of them back.
        assert_eq!(cache.due_for_extension(now, Duration::from_secs(3)).len(), 10);
        for id in test_ids(5..10) {
            cache.release(&id);
        }
        state.extend(now).await;
    }

    #[tokio::test(start_paused = true)]
    async fn extend_groups_by_lease() {
        let mut mock = MockLeaser::new();
        mock.expect_extend()
            .times(1)
            .withf(|v, l| sorted(v) == test_ids(0..5) && *l == Duration::from_secs(10))
            .returning(|_, _| Ok(()));
        mock.expect_extend()
            .times(1)
            .withf(|v, l| sorted(v) == test_ids(5..10) && *l == Duration::from_secs(20))
            .returning(|_, _| Ok(()));

        let (mut state, cache) = make_state(mock, LeaseOptions::default());
        let start = Instant::now();
        // All the leases expire at the same time.
        for id in test_ids(0..5) {
            cache.set_at(id, Duration::from_secs(10), start + Duration::from_millis(10_400));
        }
        for id in test_ids(5..10) {
            cache.set_at(id, Duration::from_millis(20_400), start);
        }
        state.extend(start + Duration::from_millis(18_500)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn extend_drops_expired() {
        let mut mock = MockLeaser::new();
        mock.expect_extend()
            .times(1)
            .withf(|v, _| sorted(v) == test_ids(5..10))
            .returning(|_, _| Ok(()));

        let (mut state, cache) = make_state(mock, LeaseOptions::default());
        let start = Instant::now();
        for id in test_ids(0..5) {
            cache.set_at(id, Duration::from_secs(1), start);
        }
        add(&cache, 5..10, start);

        state.extend(start + Duration::from_secs(8)).await;
        let remaining: Vec<String> = cache.drain().into_iter().map(|(k, _)| k).collect();
        assert_eq!(sorted(&remaining), test_ids(5..10));
    }

    #[tokio::test(start_paused = true)]
    async fn extend_error_retried_next_tick() {
        let mut seq = mockall::Sequence::new();
        let mut mock = MockLeaser::new();
        mock.expect_extend()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(transient()));
        mock.expect_extend()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|v, _| sorted(v) == test_ids(0..2))
            .returning(|_, _| Ok(()));

        let (mut state, cache) = make_state(mock, LeaseOptions::default());
        let start = Instant::now();
        add(&cache, 0..2, start);
        state.extend(start + Duration::from_millis(7_800)).await;
        state.extend(start + Duration::from_millis(8_100)).await;
        // Refreshed, nothing else is due.
        state.extend(start + Duration::from_millis(8_400)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown() {
        let mut mock = MockLeaser::new();
        mock.expect_ack()
            .times(1)
            .withf(|v| sorted(v) == test_ids(0..10))
            .returning(|_| Ok(()));
        mock.expect_nack()
            .times(1)
            .withf(|v| sorted(v) == test_ids(10..20))
            .returning(|_| Ok(()));

        let (mut state, cache) = make_state(mock, LeaseOptions::default());
        let now = Instant::now();
        add(&cache, 0..30, now);
        for i in 0..10 {
            state.record(AckResult::Ack(test_id(i)), now);
        }
        for i in 10..20 {
            state.record(AckResult::Nack(test_id(i)), now);
        }
        state.shutdown().await;
        // Another acker may still hold the outcomes for these.
        let remaining: Vec<String> = cache.drain().into_iter().map(|(k, _)| k).collect();
        assert_eq!(sorted(&remaining), test_ids(20..30));
    }

    #[tokio::test(start_paused = true)]
    async fn release_leftovers() {
        let mut mock = MockLeaser::new();
        mock.expect_ack().never();
        mock.expect_nack()
            .times(1)
            .withf(|v| sorted(v) == test_ids(20..30))
            .returning(|_| Ok(()));

        let (state, cache) = make_state(mock, LeaseOptions::default());
        add(&cache, 20..30, Instant::now());
        state.release_leftovers().await;
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn release_leftovers_empty() {
        let mut mock = MockLeaser::new();
        mock.expect_ack().never();
        mock.expect_nack().never();

        let (state, cache) = make_state(mock, LeaseOptions::default());
        state.release_leftovers().await;
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn release_leftovers_nack_disabled() {
        let mut mock = MockLeaser::new();
        mock.expect_ack().never();
        mock.expect_nack().never();

        let options = LeaseOptions {
            enable_nack: false,
            ..LeaseOptions::default()
        };
        let (state, cache) = make_state(mock, options);
        add(&cache, 0..30, Instant::now());
        state.release_leftovers().await;
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_is_bounded() {
        let mut mock = MockLeaser::new();
        mock.expect_ack().returning(|_| Err(transient()));

        let options = LeaseOptions {
            shutdown_timeout: Duration::from_secs(1),
            ..LeaseOptions::default()
        };
        let (mut state, cache) = make_state(mock, options);
        let now = Instant::now();
        add(&cache, 0..10, now);
        for i in 0..10 {
            state.record(AckResult::Ack(test_id(i)), now);
        }
        let start = Instant::now();
        state.shutdown().await;
        assert!(start.elapsed() <= Duration::from_secs(1), "{:?}", start.elapsed());
    }

    #[test]
    fn options() {
        let options = LeaseOptions::new(
            &SubscriberOptions::new()
                .set_ack_window(Duration::ZERO)
                .set_nack_window(Duration::from_secs(1))
                .set_enable_nack(false),
        );
        assert_eq!(options.ack_window, Duration::ZERO);
        assert_eq!(options.nack_window, Duration::from_secs(1));
        assert!(!options.enable_nack);
        assert_eq!(options.extend_period(), MIN_PERIOD);

        let options = LeaseOptions::default();
        assert_eq!(options.extend_period(), Duration::from_millis(300));
    }
}
