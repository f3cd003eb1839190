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
use std::sync::{Mutex, MutexGuard};
use tokio::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq)]
struct Entry {
    /// When the current lease expires.
    expires_at: Instant,
    /// When the message was first registered. Refreshing a lease does not
    /// change this value.
    registered_at: Instant,
    /// The lease duration granted for this message.
    lease: Duration,
    /// An acker is extending this lease.
    claimed: bool,
}

/// Tracks the lease deadline of every message under lease management.
///
/// The producers insert messages, the ackers refresh and remove them, and the
/// consumers query them. Each operation holds the lock for its full
/// read-modify-write, and iterations work on a snapshot taken under the lock.
#[derive(Debug)]
pub(super) struct AckDeadlineCache {
    entries: Mutex<HashMap<String, Entry>>,
    /// The maximum time a message may remain unresolved. `None` means no
    /// limit.
    timeout: Option<Duration>,
}

impl AckDeadlineCache {
    pub(super) fn new(timeout: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // A panic while holding the lock cannot leave an entry half-written.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        if now >= entry.expires_at {
            return true;
        }
        self.timeout
            .is_some_and(|t| now.saturating_duration_since(entry.registered_at) >= t)
    }

    /// Creates or refreshes the lease for `ack_id`, expiring `lease` from now.
    pub(super) fn set(&self, ack_id: String, lease: Duration) {
        self.set_at(ack_id, lease, Instant::now());
    }

    pub(super) fn set_at(&self, ack_id: String, lease: Duration, now: Instant) {
        let expires_at = now + lease;
        self.lock()
            .entry(ack_id)
            .and_modify(|e| {
                e.expires_at = expires_at;
                e.lease = lease;
            })
            .or_insert(Entry {
                expires_at,
                registered_at: now,
                lease,
                claimed: false,
            });
    }

    /// Refreshes the lease for `ack_id`, only if it is still under lease.
    ///
    /// This also releases the extension claim. Returns `false` if the message
    /// was removed in the meantime.
    pub(super) fn refresh(&self, ack_id: &str, lease: Duration, now: Instant) -> bool {
        match self.lock().get_mut(ack_id) {
            Some(e) => {
                e.expires_at = now + lease;
                e.lease = lease;
                e.claimed = false;
                true
            }
            None => false,
        }
    }

    /// Releases the extension claim on `ack_id` without changing its lease.
    pub(super) fn release(&self, ack_id: &str) {
        if let Some(e) = self.lock().get_mut(ack_id) {
            e.claimed = false;
        }
    }

    /// Removes `ack_id` from lease management. Removing an absent key is a
    /// no-op.
    pub(super) fn remove(&self, ack_id: &str) -> bool {
        self.take(ack_id).is_some()
    }

    /// Removes `ack_id` from lease management, returning when its lease
    /// expires.
    pub(super) fn take(&self, ack_id: &str) -> Option<Instant> {
        self.lock().remove(ack_id).map(|e| e.expires_at)
    }

    #[cfg(test)]
    pub(super) fn contains(&self, ack_id: &str) -> bool {
        self.lock().contains_key(ack_id)
    }

    /// Returns true if `ack_id` is under lease and its lease has not lapsed.
    pub(super) fn is_live(&self, ack_id: &str, now: Instant) -> bool {
        self.lock()
            .get(ack_id)
            .is_some_and(|e| !self.is_expired(e, now))
    }

    /// Returns the ack IDs that cannot be extended any further.
    ///
    /// These are the messages whose lease already expired, or that remained
    /// unresolved for longer than the cache timeout.
    #[cfg(test)]
    pub(super) fn get_expired(&self, now: Instant) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(_, e)| self.is_expired(e, now))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Removes and returns the ack IDs that cannot be extended any further.
    pub(super) fn drop_expired(&self, now: Instant) -> Vec<String> {
        let mut entries = self.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| self.is_expired(e, now))
            .map(|(k, _)| k.clone())
            .collect();
        for ack_id in &expired {
            entries.remove(ack_id);
        }
        expired
    }

    /// Claims and returns the messages whose lease expires within `margin`,
    /// along with their lease duration.
    ///
    /// A claimed message is not returned again until [refresh][Self::refresh]
    /// or [release][Self::release]. Messages that cannot be extended any
    /// further are never returned.
    pub(super) fn due_for_extension(&self, now: Instant, margin: Duration) -> Vec<(String, Duration)> {
        let mut entries = self.lock();
        let mut due = Vec::new();
        for (k, e) in entries.iter_mut() {
            if e.claimed || self.is_expired(e, now) {
                continue;
            }
            if e.expires_at.saturating_duration_since(now) <= margin {
                e.claimed = true;
                due.push((k.clone(), e.lease));
            }
        }
        due
    }

    /// Removes and returns all the ack IDs under lease management, along with
    /// the expiration of their lease.
    pub(super) fn drain(&self) -> Vec<(String, Instant)> {
        self.lock().drain().map(|(k, e)| (k, e.expires_at)).collect()
    }

    pub(super) fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub(super) fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
