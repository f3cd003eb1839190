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

use crate::Result;
use crate::model::{AcknowledgeRequest, ModifyAckDeadlineRequest};
use crate::stub::Stub;
use gax::options::RequestOptions;
use std::sync::Arc;
use std::time::Duration;

/// The largest lease extension accepted by the service.
pub(super) const MAX_LEASE_SECONDS: u64 = 600;

/// A trait representing leaser actions
///
/// We stub out the interface, in order to test the lease management.
#[async_trait::async_trait]
pub(super) trait Leaser {
    /// Acknowledge a batch of messages.
    async fn ack(&self, ack_ids: Vec<String>) -> Result<()>;
    /// Negatively acknowledge a batch of messages.
    async fn nack(&self, ack_ids: Vec<String>) -> Result<()>;
    /// Extend lease deadlines for a batch of messages.
    async fn extend(&self, ack_ids: Vec<String>, lease: Duration) -> Result<()>;
}

/// The [Leaser] that sends the requests over a [Stub].
#[derive(Clone, Debug)]
pub(super) struct DefaultLeaser {
    inner: Arc<dyn Stub>,
    subscription: String,
}

impl DefaultLeaser {
    pub(super) fn new(inner: Arc<dyn Stub>, subscription: String) -> Self {
        Self {
            inner,
            subscription,
        }
    }

    async fn modify_ack_deadline(&self, ack_ids: Vec<String>, seconds: i32) -> Result<()> {
        let req = ModifyAckDeadlineRequest::new()
            .set_subscription(self.subscription.clone())
            .set_ack_ids(ack_ids)
            .set_ack_deadline_seconds(seconds);
        self.inner
            .modify_ack_deadline(req, RequestOptions::default())
            .await
    }
}

#[async_trait::async_trait]
impl Leaser for DefaultLeaser {
    async fn ack(&self, ack_ids: Vec<String>) -> Result<()> {
        let req = AcknowledgeRequest::new()
            .set_subscription(self.subscription.clone())
            .set_ack_ids(ack_ids);
        self.inner.acknowledge(req, RequestOptions::default()).await
    }

    async fn nack(&self, ack_ids: Vec<String>) -> Result<()> {
        self.modify_ack_deadline(ack_ids, 0).await
    }

    async fn extend(&self, ack_ids: Vec<String>, lease: Duration) -> Result<()> {
        let seconds = lease.as_secs().min(MAX_LEASE_SECONDS) as i32;
        self.modify_ack_deadline(ack_ids, seconds).await
    }
}
