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

//! Google Cloud Client Libraries for Rust - Pub/Sub pull subscriber
//!
//! **WARNING:** this crate is under active development. We expect multiple
//! breaking changes in the upcoming releases. Testing is also incomplete, we do
//! **not** recommend that you use this crate in production. We welcome feedback
//! about the APIs, documentation, missing features, bugs, etc.
//!
//! This crate contains a pull-based subscriber for [Pub/Sub]. It repeatedly
//! pulls batches of messages from a subscription, hands each message to an
//! application callback, and acknowledges (or rejects) the messages in
//! batches. While a message is being processed, its lease is extended so the
//! service does not redeliver it.
//!
//! The crate does not implement the wire protocol. Applications provide an
//! implementation of [Stub][stub::Stub], typically a thin wrapper around a
//! generated Pub/Sub client.
//!
//! # Example
//! ```
//! # use google_cloud_pubsub_subscriber::subscriber::Subscribe;
//! # use google_cloud_pubsub_subscriber::stub::Stub;
//! # use google_cloud_pubsub_subscriber::model::ReceivedMessage;
//! # use tokio_util::sync::CancellationToken;
//! # use std::sync::Arc;
//! # async fn sample(stub: Arc<dyn Stub>) {
//! let shutdown = CancellationToken::new();
//! let cancelled = Subscribe::new(stub, "projects/my-project/subscriptions/my-subscription")
//!     .set_num_producers(2)
//!     .start(
//!         |m: ReceivedMessage| async move {
//!             println!("received {:?}", m.message.data);
//!             Ok::<(), std::io::Error>(())
//!         },
//!         shutdown,
//!     )
//!     .await;
//! # let _ = cancelled;
//! # }
//! ```
//!
//! [pub/sub]: https://cloud.google.com/pubsub

pub use gax::Result;
pub use gax::error::Error;

/// Custom errors for the subscriber.
pub mod error;

/// The data types exchanged with the service.
pub mod model;

/// The transport interface used by the subscriber.
pub mod stub;

/// The subscriber pipeline.
pub mod subscriber;

pub mod options {
    pub use crate::subscriber::options::SubscriberOptions;
}

/// The type returned by the subscriber callback on failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
