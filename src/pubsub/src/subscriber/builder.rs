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

use super::handler::Callback;
use super::metrics::Metrics;
use super::options::SubscriberOptions;
use super::session::Session;
use crate::error::Cancelled;
use crate::stub::Stub;
use opentelemetry::metrics::Meter;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Builder for a pull subscriber.
///
/// # Example
/// ```
/// # use google_cloud_pubsub_subscriber::subscriber::Subscribe;
/// # use google_cloud_pubsub_subscriber::stub::Stub;
/// # use google_cloud_pubsub_subscriber::model::ReceivedMessage;
/// # use tokio_util::sync::CancellationToken;
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # async fn sample(stub: Arc<dyn Stub>) {
/// let shutdown = CancellationToken::new();
/// let cancelled = Subscribe::new(stub, "projects/my-project/subscriptions/my-subscription")
///     .set_max_messages_per_producer(500)
///     .set_ack_window(Duration::from_millis(100))
///     .start(
///         |m: ReceivedMessage| async move {
///             println!("received {}", m.ack_id);
///             Ok::<(), std::io::Error>(())
///         },
///         shutdown.clone(),
///     )
///     .await;
/// # let _ = cancelled;
/// # }
/// ```
#[derive(Debug)]
pub struct Subscribe {
    inner: Arc<dyn Stub>,
    subscription: String,
    options: SubscriberOptions,
    metrics: Metrics,
}

impl Subscribe {
    /// Creates a builder for `subscription`, using the default options.
    ///
    /// The subscription name has the form
    /// `projects/{project}/subscriptions/{subscription}`.
    pub fn new<T: Into<String>>(inner: Arc<dyn Stub>, subscription: T) -> Self {
        Self {
            inner,
            subscription: subscription.into(),
            options: SubscriberOptions::default(),
            metrics: Metrics::global(),
        }
    }

    /// Replaces all the options.
    pub fn with_options(mut self, v: SubscriberOptions) -> Self {
        self.options = v;
        self
    }

    /// Records the subscriber metrics with `meter`.
    ///
    /// By default the subscriber uses a meter from the global
    /// [MeterProvider][opentelemetry::metrics::MeterProvider].
    pub fn with_meter(mut self, meter: &Meter) -> Self {
        self.metrics = Metrics::new(meter);
        self
    }

    /// Sets the number of concurrent pull loops.
    ///
    /// The default is 1.
    pub fn set_num_producers(mut self, v: usize) -> Self {
        self.options = self.options.set_num_producers(v);
        self
    }

    /// Sets the maximum number of outstanding messages for each pull loop.
    ///
    /// A pull loop only requests as many messages as it has room for, and
    /// stops pulling while this many of its messages are unresolved.
    ///
    /// The default is 100.
    pub fn set_max_messages_per_producer(mut self, v: usize) -> Self {
        self.options = self.options.set_max_messages_per_producer(v);
        self
    }

    /// Sets the number of callback workers for each pull loop.
    ///
    /// The default is 1.
    pub fn set_num_consumers_per_producer(mut self, v: usize) -> Self {
        self.options = self.options.set_num_consumers_per_producer(v);
        self
    }

    /// Sets the number of workers sending acks, nacks and lease extensions.
    ///
    /// The default is 1.
    pub fn set_num_ackers(mut self, v: usize) -> Self {
        self.options = self.options.set_num_ackers(v);
        self
    }

    /// Sets how long acks are batched before they are sent.
    ///
    /// The default is 300ms.
    pub fn set_ack_window<V: Into<Duration>>(mut self, v: V) -> Self {
        self.options = self.options.set_ack_window(v);
        self
    }

    /// Sets how long nacks are batched before they are sent.
    ///
    /// The default is 300ms.
    pub fn set_nack_window<V: Into<Duration>>(mut self, v: V) -> Self {
        self.options = self.options.set_nack_window(v);
        self
    }

    /// Enables or disables sending nacks to the service.
    pub fn set_enable_nack(mut self, v: bool) -> Self {
        self.options = self.options.set_enable_nack(v);
        self
    }

    /// Sets the maximum time a message may remain unresolved.
    pub fn set_ack_deadline_cache_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.options = self.options.set_ack_deadline_cache_timeout(v);
        self
    }

    /// Sets the attempt timeout for each pull request.
    ///
    /// The default is 30 seconds.
    pub fn set_pull_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.options = self.options.set_pull_timeout(v);
        self
    }

    /// Sets the time allowed for callbacks, and for the final flush, during
    /// shutdown.
    ///
    /// The default is 10 seconds.
    pub fn set_shutdown_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.options = self.options.set_shutdown_timeout(v);
        self
    }

    /// Starts the subscriber and runs it until `shutdown` is cancelled.
    ///
    /// The subscriber also shuts down if any of its background workers exits,
    /// for example because the subscription does not exist. In either case
    /// the workers are drained before this function returns: pending acks and
    /// nacks are sent, and unprocessed messages are rejected.
    ///
    /// The subscriber never returns successfully. Use
    /// [Cancelled::trigger] to find out what started the shutdown.
    pub async fn start<C: Callback>(
        self,
        callback: C,
        shutdown: CancellationToken,
    ) -> Result<Infallible, Cancelled> {
        let session = Session::start(
            self.inner,
            self.subscription,
            Arc::new(callback),
            self.options,
            self.metrics,
        );
        Err(session.run(shutdown).await)
    }
}
