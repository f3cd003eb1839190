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

//! A pull subscriber.
//!
//! The subscriber runs three pools of background workers. Producers pull
//! batches of messages, consumers run the application callback on each
//! message, and ackers acknowledge or reject the messages in batches. The
//! ackers also extend the leases of messages that are still in progress.

/// The application callback, and how its result maps to an ack or nack.
pub mod handler;

/// Options for the subscriber.
pub mod options;

mod ack_deadline_cache;
mod acker;
mod builder;
mod consumer;
mod lease_state;
mod leaser;
mod metrics;
mod producer;
mod queue;
mod retry_policy;
mod session;

pub use builder::Subscribe;
pub use handler::Callback;

use crate::error::Cancelled;
use crate::stub::Stub;
use options::SubscriberOptions;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a subscriber on `subscription` until `shutdown` is cancelled.
///
/// This is a shorthand for [Subscribe]:
///
/// ```
/// # use google_cloud_pubsub_subscriber::subscriber::subscribe;
/// # use google_cloud_pubsub_subscriber::options::SubscriberOptions;
/// # use google_cloud_pubsub_subscriber::stub::Stub;
/// # use google_cloud_pubsub_subscriber::model::ReceivedMessage;
/// # use tokio_util::sync::CancellationToken;
/// # use std::sync::Arc;
/// # async fn sample(stub: Arc<dyn Stub>) {
/// let shutdown = CancellationToken::new();
/// let cancelled = subscribe(
///     stub,
///     "projects/my-project/subscriptions/my-subscription",
///     |m: ReceivedMessage| async move {
///         println!("received {}", m.ack_id);
///         Ok::<(), std::io::Error>(())
///     },
///     SubscriberOptions::new().set_num_consumers_per_producer(8),
///     shutdown,
/// )
/// .await;
/// # let _ = cancelled;
/// # }
/// ```
pub async fn subscribe<T, C>(
    inner: Arc<dyn Stub>,
    subscription: T,
    callback: C,
    options: SubscriberOptions,
    shutdown: CancellationToken,
) -> Result<Infallible, Cancelled>
where
    T: Into<String>,
    C: Callback,
{
    Subscribe::new(inner, subscription)
        .with_options(options)
        .start(callback, shutdown)
        .await
}
