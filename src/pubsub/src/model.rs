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

use std::collections::HashMap;
use std::time::Duration;

/// A message published to a topic.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct Message {
    /// The message data field.
    pub data: bytes::Bytes,

    /// Attributes for this message.
    pub attributes: HashMap<String, String>,

    /// ID of this message, assigned by the server when the message is
    /// published.
    pub message_id: String,

    /// If non-empty, identifies related messages for which publish order
    /// should be respected.
    pub ordering_key: String,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [data][Message::data].
    pub fn set_data<T: Into<bytes::Bytes>>(mut self, v: T) -> Self {
        self.data = v.into();
        self
    }

    /// Sets the value of [attributes][Message::attributes].
    pub fn set_attributes<T, K, V>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.attributes = v.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    /// Sets the value of [message_id][Message::message_id].
    pub fn set_message_id<T: Into<String>>(mut self, v: T) -> Self {
        self.message_id = v.into();
        self
    }

    /// Sets the value of [ordering_key][Message::ordering_key].
    pub fn set_ordering_key<T: Into<String>>(mut self, v: T) -> Self {
        self.ordering_key = v.into();
        self
    }
}

/// A message and its ack ID, as returned by a pull request.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct ReceivedMessage {
    /// This ID can be used to acknowledge the received message.
    pub ack_id: String,

    /// The message.
    pub message: Message,

    /// The lease granted by the service when the message was pulled.
    ///
    /// The service redelivers the message if it is not acknowledged, and its
    /// lease is not extended, within this time.
    pub ack_deadline: Duration,

    /// The approximate number of times the service has attempted to deliver
    /// the message. Zero if the subscription has no dead letter policy.
    pub delivery_attempt: i32,
}

impl ReceivedMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [ack_id][ReceivedMessage::ack_id].
    pub fn set_ack_id<T: Into<String>>(mut self, v: T) -> Self {
        self.ack_id = v.into();
        self
    }

    /// Sets the value of [message][ReceivedMessage::message].
    pub fn set_message<T: Into<Message>>(mut self, v: T) -> Self {
        self.message = v.into();
        self
    }

    /// Sets the value of [ack_deadline][ReceivedMessage::ack_deadline].
    pub fn set_ack_deadline<T: Into<Duration>>(mut self, v: T) -> Self {
        self.ack_deadline = v.into();
        self
    }

    /// Sets the value of [delivery_attempt][ReceivedMessage::delivery_attempt].
    pub fn set_delivery_attempt<T: Into<i32>>(mut self, v: T) -> Self {
        self.delivery_attempt = v.into();
        self
    }
}

/// Request for the `Pull` method.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct PullRequest {
    /// The subscription from which messages should be pulled.
    ///
    /// Format is `projects/{project}/subscriptions/{sub}`.
    pub subscription: String,

    /// The maximum number of messages to return for this request. Must be a
    /// positive integer.
    pub max_messages: i32,
}

impl PullRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [subscription][PullRequest::subscription].
    pub fn set_subscription<T: Into<String>>(mut self, v: T) -> Self {
        self.subscription = v.into();
        self
    }

    /// Sets the value of [max_messages][PullRequest::max_messages].
    pub fn set_max_messages<T: Into<i32>>(mut self, v: T) -> Self {
        self.max_messages = v.into();
        self
    }
}

/// Response for the `Pull` method.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct PullResponse {
    /// Received Pub/Sub messages. This will not be empty, unless the request
    /// timed out on the service side.
    pub received_messages: Vec<ReceivedMessage>,
}

impl PullResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [received_messages][PullResponse::received_messages].
    pub fn set_received_messages<T, V>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = V>,
        V: Into<ReceivedMessage>,
    {
        self.received_messages = v.into_iter().map(|i| i.into()).collect();
        self
    }
}

/// Request for the `Acknowledge` method.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct AcknowledgeRequest {
    /// The subscription whose messages are being acknowledged.
    pub subscription: String,

    /// The acknowledgment IDs for the messages being acknowledged.
    pub ack_ids: Vec<String>,
}

impl AcknowledgeRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [subscription][AcknowledgeRequest::subscription].
    pub fn set_subscription<T: Into<String>>(mut self, v: T) -> Self {
        self.subscription = v.into();
        self
    }

    /// Sets the value of [ack_ids][AcknowledgeRequest::ack_ids].
    pub fn set_ack_ids<T, V>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.ack_ids = v.into_iter().map(|i| i.into()).collect();
        self
    }
}

/// Request for the `ModifyAckDeadline` method.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct ModifyAckDeadlineRequest {
    /// The name of the subscription.
    pub subscription: String,

    /// List of acknowledgment IDs.
    pub ack_ids: Vec<String>,

    /// The new ack deadline, relative to the time the service receives the
    /// request.
    ///
    /// A value of zero makes the messages immediately available for
    /// redelivery.
    pub ack_deadline_seconds: i32,
}

impl ModifyAckDeadlineRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [subscription][ModifyAckDeadlineRequest::subscription].
    pub fn set_subscription<T: Into<String>>(mut self, v: T) -> Self {
        self.subscription = v.into();
        self
    }

    /// Sets the value of [ack_ids][ModifyAckDeadlineRequest::ack_ids].
    pub fn set_ack_ids<T, V>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.ack_ids = v.into_iter().map(|i| i.into()).collect();
        self
    }

    /// Sets the value of [ack_deadline_seconds][ModifyAckDeadlineRequest::ack_deadline_seconds].
    pub fn set_ack_deadline_seconds<T: Into<i32>>(mut self, v: T) -> Self {
        self.ack_deadline_seconds = v.into();
        self
    }
}
