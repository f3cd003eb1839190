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

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use std::time::Duration;

const METER_NAME: &str = "google-cloud-pubsub-subscriber";

const BATCH_BOUNDARIES: [f64; 14] = [
    0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 150.0, 250.0, 500.0, 1000.0, 1500.0, 2000.0, 5000.0,
];
const LATENCY_BOUNDARIES: [f64; 13] = [
    0.01, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 7.5, 10.0, 20.0, 30.0, 60.0, 120.0,
];

/// How a consume attempt ended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) enum ConsumeOutcome {
    Succeeded,
    Failed,
    /// The message lease lapsed before the callback ran.
    Expired,
}

impl ConsumeOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            ConsumeOutcome::Succeeded => "succeeded",
            ConsumeOutcome::Failed => "failed",
            ConsumeOutcome::Expired => "expired",
        }
    }
}

/// The phases of a consume attempt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) enum Phase {
    /// From the pull response until a consumer picks up the message.
    Queueing,
    /// The callback execution.
    Runtime,
}

/// The remote operations issued by the ackers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) enum Component {
    Ack,
    Nack,
    Extend,
}

impl Component {
    fn as_str(&self) -> &'static str {
        match self {
            Component::Ack => "ack",
            Component::Nack => "nack",
            Component::Extend => "extend",
        }
    }
}

/// The subscriber instruments.
///
/// Without a meter provider installed, the global meter is a no-op.
#[derive(Clone)]
pub(super) struct Metrics {
    batch_size: Histogram<u64>,
    consume: Counter<u64>,
    consume_latency: Histogram<f64>,
    batch_status: Counter<u64>,
    messages_processed: Counter<u64>,
    messages_received: Counter<u64>,
}

impl Metrics {
    pub(super) fn new(meter: &Meter) -> Self {
        Self {
            batch_size: meter
                .u64_histogram("pubsub.subscriber.batch")
                .with_description("Histogram of number of messages pulled in a single batch")
                .with_boundaries(BATCH_BOUNDARIES.to_vec())
                .build(),
            consume: meter
                .u64_counter("pubsub.subscriber.consume")
                .with_description("Counter of the outcomes of message consume attempts")
                .build(),
            consume_latency: meter
                .f64_histogram("pubsub.subscriber.consume_latency")
                .with_description("Histogram of message consume latencies")
                .with_unit("s")
                .with_boundaries(LATENCY_BOUNDARIES.to_vec())
                .build(),
            batch_status: meter
                .u64_counter("pubsub.subscriber.batch_status")
                .with_description("Counter for success/failure to process message batches")
                .build(),
            messages_processed: meter
                .u64_counter("pubsub.subscriber.messages_processed")
                .with_description("Counter of successfully acked/nacked messages")
                .build(),
            messages_received: meter
                .u64_counter("pubsub.subscriber.messages_received")
                .with_description("Counter of messages pulled from subscription")
                .build(),
        }
    }

    pub(super) fn global() -> Self {
        Self::new(&opentelemetry::global::meter(METER_NAME))
    }

    pub(super) fn record_batch(&self, size: usize) {
        self.batch_size.record(size as u64, &[]);
        self.messages_received.add(size as u64, &[]);
    }

    pub(super) fn record_consume(&self, outcome: ConsumeOutcome) {
        self.consume
            .add(1, &[KeyValue::new("outcome", outcome.as_str())]);
    }

    pub(super) fn record_latency(&self, phase: Phase, latency: Duration) {
        let phase = match phase {
            Phase::Queueing => "queueing",
            Phase::Runtime => "runtime",
        };
        self.consume_latency
            .record(latency.as_secs_f64(), &[KeyValue::new("phase", phase)]);
    }

    pub(super) fn record_batch_status(&self, component: Component, succeeded: bool) {
        let outcome = if succeeded { "succeeded" } else { "failed" };
        self.batch_status.add(
            1,
            &[
                KeyValue::new("component", component.as_str()),
                KeyValue::new("outcome", outcome),
            ],
        );
    }

    pub(super) fn record_processed(&self, component: Component, count: usize) {
        self.messages_processed.add(
            count as u64,
            &[KeyValue::new("component", component.as_str())],
        );
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(ConsumeOutcome::Succeeded.as_str(), "succeeded");
        assert_eq!(ConsumeOutcome::Failed.as_str(), "failed");
        assert_eq!(ConsumeOutcome::Expired.as_str(), "expired");
        assert_eq!(Component::Ack.as_str(), "ack");
        assert_eq!(Component::Nack.as_str(), "nack");
        assert_eq!(Component::Extend.as_str(), "extend");
    }

    #[test]
    fn record_without_provider() {
        // No provider is installed, all the instruments are no-ops.
        let metrics = Metrics::global();
        metrics.record_batch(10);
        metrics.record_consume(ConsumeOutcome::Expired);
        metrics.record_latency(Phase::Queueing, Duration::from_millis(5));
        metrics.record_latency(Phase::Runtime, Duration::from_secs(2));
        metrics.record_batch_status(Component::Extend, false);
        metrics.record_processed(Component::Ack, 3);

        let fmt = format!("{:?}", metrics.clone());
        assert!(fmt.contains("Metrics"), "{fmt}");
    }
}
