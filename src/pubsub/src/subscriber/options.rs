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

use std::time::Duration;

/// Options for configuring the subscriber pipeline.
///
/// Counts of zero are treated as one.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct SubscriberOptions {
    /// The number of concurrent pull loops.
    pub num_producers: usize,
    /// The maximum number of outstanding messages per pull loop. This bounds
    /// both the pull request size and the messages waiting for a consumer.
    pub max_messages_per_producer: usize,
    /// The number of callback workers for each pull loop.
    pub num_consumers_per_producer: usize,
    /// The number of workers sending acks, nacks and lease extensions.
    pub num_ackers: usize,
    /// How long acks are batched before they are sent. This is also the
    /// period of the lease extension checks (with a floor of 100ms).
    pub ack_window: Duration,
    /// How long nacks are batched before they are sent.
    pub nack_window: Duration,
    /// If false, rejected messages are released from lease management but
    /// the service is not told. The service redelivers them once their lease
    /// lapses.
    pub enable_nack: bool,
    /// The maximum time a message may remain unresolved. After this time its
    /// lease is no longer extended. `None` means no limit.
    pub ack_deadline_cache_timeout: Option<Duration>,
    /// The attempt timeout for each pull request.
    pub pull_timeout: Duration,
    /// Leases are extended when they expire within this margin.
    pub extension_margin: Duration,
    /// The time allowed for the callbacks to finish, and for the final
    /// ack/nack flush, during shutdown.
    pub shutdown_timeout: Duration,
}

impl SubscriberOptions {
    /// Create a new instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the [SubscriberOptions][Self::num_producers] field.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_pubsub_subscriber::options::SubscriberOptions;
    /// let options = SubscriberOptions::new().set_num_producers(4);
    /// ```
    pub fn set_num_producers(mut self, v: usize) -> Self {
        self.num_producers = v;
        self
    }

    /// Set the [SubscriberOptions][Self::max_messages_per_producer] field.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_pubsub_subscriber::options::SubscriberOptions;
    /// let options = SubscriberOptions::new().set_max_messages_per_producer(500);
    /// ```
    pub fn set_max_messages_per_producer(mut self, v: usize) -> Self {
        self.max_messages_per_producer = v;
        self
    }

    /// Set the [SubscriberOptions][Self::num_consumers_per_producer] field.
    pub fn set_num_consumers_per_producer(mut self, v: usize) -> Self {
        self.num_consumers_per_producer = v;
        self
    }

    /// Set the [SubscriberOptions][Self::num_ackers] field.
    pub fn set_num_ackers(mut self, v: usize) -> Self {
        self.num_ackers = v;
        self
    }

    /// Set the [SubscriberOptions][Self::ack_window] field.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_pubsub_subscriber::options::SubscriberOptions;
    /// # use std::time::Duration;
    /// let options = SubscriberOptions::new().set_ack_window(Duration::from_millis(100));
    /// ```
    pub fn set_ack_window<V: Into<Duration>>(mut self, v: V) -> Self {
        self.ack_window = v.into();
        self
    }

    /// Set the [SubscriberOptions][Self::nack_window] field.
    pub fn set_nack_window<V: Into<Duration>>(mut self, v: V) -> Self {
        self.nack_window = v.into();
        self
    }

    /// Set the [SubscriberOptions][Self::enable_nack] field.
    pub fn set_enable_nack(mut self, v: bool) -> Self {
        self.enable_nack = v;
        self
    }

    /// Set the [SubscriberOptions][Self::ack_deadline_cache_timeout] field.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_pubsub_subscriber::options::SubscriberOptions;
    /// # use std::time::Duration;
    /// let options = SubscriberOptions::new()
    ///     .set_ack_deadline_cache_timeout(Duration::from_secs(600));
    /// ```
    pub fn set_ack_deadline_cache_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.ack_deadline_cache_timeout = Some(v.into());
        self
    }

    /// Set or clear the [SubscriberOptions][Self::ack_deadline_cache_timeout]
    /// field.
    pub fn set_or_clear_ack_deadline_cache_timeout<V: Into<Duration>>(
        mut self,
        v: Option<V>,
    ) -> Self {
        self.ack_deadline_cache_timeout = v.map(Into::into);
        self
    }

    /// Set the [SubscriberOptions][Self::pull_timeout] field.
    pub fn set_pull_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.pull_timeout = v.into();
        self
    }

    /// Set the [SubscriberOptions][Self::extension_margin] field.
    pub fn set_extension_margin<V: Into<Duration>>(mut self, v: V) -> Self {
        self.extension_margin = v.into();
        self
    }

    /// Set the [SubscriberOptions][Self::shutdown_timeout] field.
    pub fn set_shutdown_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.shutdown_timeout = v.into();
        self
    }
}

impl std::default::Default for SubscriberOptions {
    fn default() -> Self {
        Self {
            num_producers: 1,
            max_messages_per_producer: 100,
            num_consumers_per_producer: 1,
            num_ackers: 1,
            ack_window: Duration::from_millis(300),
            nack_window: Duration::from_millis(300),
            enable_nack: true,
            ack_deadline_cache_timeout: None,
            pull_timeout: Duration::from_secs(30),
            extension_margin: Duration::from_secs(2),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}
