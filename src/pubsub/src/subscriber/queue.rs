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

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::mpsc::Receiver;

/// The receiving side of a bounded queue, shared by a pool of workers.
///
/// Each item is delivered to exactly one worker.
#[derive(Debug)]
pub(super) struct SharedReceiver<T> {
    inner: Arc<Mutex<Receiver<T>>>,
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> SharedReceiver<T> {
    pub(super) fn new(rx: Receiver<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(rx)),
        }
    }

    /// Waits for the next item. Returns `None` once the queue is closed and
    /// empty.
    ///
    /// This is cancel safe: if the future is dropped, no item is lost.
    pub(super) async fn recv(&self) -> Option<T> {
        self.inner.lock().await.recv().await
    }

    /// Returns an item if one is ready, without waiting.
    ///
    /// Returns `None` if another worker is waiting on the queue.
    pub(super) fn try_recv(&self) -> Option<T> {
        self.inner.try_lock().ok()?.try_recv().ok()
    }
}
