// Copyright 2026 Google LLC
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

use crate::Error;
use gax::error::rpc::Code;
use gax::retry_result::RetryResult;

/// The subscriber's retry policy, for the pull and ack RPCs.
///
/// The subscriber retries forever, so there is no attempt or time limit. The
/// policy only decides which errors are worth retrying.
#[derive(Debug)]
pub(super) struct SubscriberRetryPolicy;

impl SubscriberRetryPolicy {
    /// Whether an error is transient (retry-able).
    pub(super) fn on_error(error: Error) -> RetryResult {
        if Self::is_transient(&error) {
            return RetryResult::Continue(error);
        }
        RetryResult::Permanent(error)
    }

    pub(super) fn is_transient(error: &Error) -> bool {
        if error.is_io() || error.is_timeout() || error.is_transport() {
            return true;
        }
        match error.status() {
            Some(status) => matches!(
                status.code,
                Code::ResourceExhausted
                    | Code::Aborted
                    | Code::Internal
                    | Code::Unavailable
                    | Code::DeadlineExceeded
            ),
            None => false,
        }
    }
}
