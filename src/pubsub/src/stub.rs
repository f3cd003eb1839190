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

//! The transport interface used by the subscriber.
//!
//! The subscriber does not send RPCs itself. Applications implement [Stub]
//! over their transport of choice. All the methods may fail, and the
//! subscriber treats them as unreliable network calls.

use crate::Result;
use crate::model::{AcknowledgeRequest, ModifyAckDeadlineRequest, PullRequest, PullResponse};
use gax::options::RequestOptions;

/// Defines the remote operations used by the subscriber.
///
/// The subscriber holds the stub as an `Arc<dyn Stub>`, and calls it from
/// many tasks concurrently.
#[async_trait::async_trait]
pub trait Stub: std::fmt::Debug + Send + Sync {
    /// Pulls a batch of messages from a subscription.
    ///
    /// `options` carries the attempt timeout for the request.
    async fn pull(&self, req: PullRequest, options: RequestOptions) -> Result<PullResponse>;

    /// Acknowledges a batch of messages.
    async fn acknowledge(&self, req: AcknowledgeRequest, options: RequestOptions) -> Result<()>;

    /// Modifies the ack deadline for a batch of messages.
    async fn modify_ack_deadline(
        &self,
        req: ModifyAckDeadlineRequest,
        options: RequestOptions,
    ) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

    mockall::mock! {
        #[derive(Debug)]
        pub(crate) Stub {}
        #[async_trait::async_trait]
        impl Stub for Stub {
            async fn pull(&self, req: PullRequest, options: RequestOptions) -> Result<PullResponse>;
            async fn acknowledge(&self, req: AcknowledgeRequest, options: RequestOptions) -> Result<()>;
            async fn modify_ack_deadline(
                &self,
                req: ModifyAckDeadlineRequest,
                options: RequestOptions,
            ) -> Result<()>;
        }
    }

    /// A stub that records every request, and returns scripted pull
    /// responses.
    ///
    /// Pull requests wait until a response is scripted. Acks and lease
    /// modifications always succeed.
    #[derive(Debug)]
    pub(crate) struct FakeStub {
        responses: Mutex<UnboundedReceiver<Result<PullResponse>>>,
        pulls: UnboundedSender<PullRequest>,
        acks: UnboundedSender<AcknowledgeRequest>,
        modacks: UnboundedSender<ModifyAckDeadlineRequest>,
    }

    /// The test side of a [FakeStub].
    pub(crate) struct FakeStubHandles {
        pub(crate) responses: UnboundedSender<Result<PullResponse>>,
        pub(crate) pulls: UnboundedReceiver<PullRequest>,
        pub(crate) acks: UnboundedReceiver<AcknowledgeRequest>,
        pub(crate) modacks: UnboundedReceiver<ModifyAckDeadlineRequest>,
    }

    impl FakeStub {
        pub(crate) fn new() -> (Arc<Self>, FakeStubHandles) {
            let (responses_tx, responses_rx) = unbounded_channel();
            let (pulls_tx, pulls_rx) = unbounded_channel();
            let (acks_tx, acks_rx) = unbounded_channel();
            let (modacks_tx, modacks_rx) = unbounded_channel();
            let stub = Self {
                responses: Mutex::new(responses_rx),
                pulls: pulls_tx,
                acks: acks_tx,
                modacks: modacks_tx,
            };
            let handles = FakeStubHandles {
                responses: responses_tx,
                pulls: pulls_rx,
                acks: acks_rx,
                modacks: modacks_rx,
            };
            (Arc::new(stub), handles)
        }
    }

    #[async_trait::async_trait]
    impl Stub for FakeStub {
        async fn pull(&self, req: PullRequest, _options: RequestOptions) -> Result<PullResponse> {
            let _ = self.pulls.send(req);
            let mut responses = self.responses.lock().await;
            match responses.recv().await {
                Some(r) => r,
                None => std::future::pending().await,
            }
        }

        async fn acknowledge(&self, req: AcknowledgeRequest, _options: RequestOptions) -> Result<()> {
            let _ = self.acks.send(req);
            Ok(())
        }

        async fn modify_ack_deadline(
            &self,
            req: ModifyAckDeadlineRequest,
            _options: RequestOptions,
        ) -> Result<()> {
            let _ = self.modacks.send(req);
            Ok(())
        }
    }
}
