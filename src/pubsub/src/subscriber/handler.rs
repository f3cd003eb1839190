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

use crate::BoxError;
use crate::model::ReceivedMessage;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// The application callback, invoked once for each received message.
///
/// The subscriber acknowledges the message if the callback returns `Ok(())`.
/// If the callback returns an error, or panics, the subscriber rejects the
/// message and the service redelivers it, possibly to another client.
///
/// This trait is implemented for any async function, or closure, that
/// consumes a [ReceivedMessage] and returns a `Result<(), E>`:
///
/// ```
/// # use google_cloud_pubsub_subscriber::model::ReceivedMessage;
/// # use google_cloud_pubsub_subscriber::subscriber::handler::Callback;
/// async fn handle(m: ReceivedMessage) -> Result<(), std::io::Error> {
///     println!("received {:?}", m.message.data);
///     Ok(())
/// }
/// fn is_callback<C: Callback>(_: C) {}
/// is_callback(handle);
/// ```
pub trait Callback: Send + Sync + 'static {
    /// Processes a message.
    fn call(&self, message: ReceivedMessage) -> BoxFuture<'static, Result<(), BoxError>>;
}

impl<F, Fut, E> Callback for F
where
    F: Fn(ReceivedMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<BoxError>,
{
    fn call(&self, message: ReceivedMessage) -> BoxFuture<'static, Result<(), BoxError>> {
        let fut = (self)(message);
        async move { fut.await.map_err(Into::into) }.boxed()
    }
}

/// The action the subscriber takes for a message after the callback runs.
#[derive(Debug, PartialEq)]
pub(super) enum AckResult {
    Ack(String),
    Nack(String),
}

impl AckResult {
    pub(super) fn ack_id(&self) -> &str {
        match self {
            AckResult::Ack(id) | AckResult::Nack(id) => id,
        }
    }
}

/// Runs the callback for one message, converting errors and panics into a
/// [AckResult::Nack].
pub(super) async fn invoke(callback: &dyn Callback, message: ReceivedMessage) -> AckResult {
    let ack_id = message.ack_id.clone();
    // Deferring the call into the future catches panics before the first
    // `.await` too.
    let result = AssertUnwindSafe(async { callback.call(message).await })
        .catch_unwind()
        .await;
    match result {
        Ok(Ok(())) => AckResult::Ack(ack_id),
        Ok(Err(e)) => {
            tracing::warn!("the callback failed for message {ack_id}: {e}");
            AckResult::Nack(ack_id)
        }
        Err(panic) => {
            tracing::warn!(
                "the callback panicked for message {ack_id}: {}",
                panic_message(panic.as_ref())
            );
            AckResult::Nack(ack_id)
        }
    }
}

pub(super) fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
