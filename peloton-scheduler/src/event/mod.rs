// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Append-only pod event log. Two contracts govern it: offsets are
//! strictly increasing per stream, and consumers dedup redelivery by
//! `eventID`. Acknowledgement is by offset high-water mark, and the log may
//! be truncated below the minimum ack across consumers.
//!
//! Expressed as a concrete in-memory log with an explicit offset/ack/truncate
//! surface rather than a bare `Stream`, since nothing in this workspace yet
//! owns a transport to drive a `Stream` consumer over.

use peloton_core::error::{PelotonError, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;

pub type Offset = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct PodEvent {
    pub event_id: String,
    pub pod_id: String,
    pub kind: String,
    pub offset: Offset,
}

struct Inner {
    /// Strictly increasing by offset; the front may have been truncated away.
    log: Vec<PodEvent>,
    next_offset: Offset,
    /// Seen `eventID`s within the retained log window, for dedup on append.
    seen_ids: HashMap<String, Offset>,
    /// High-water mark per consumer.
    acks: HashMap<String, Offset>,
}

/// An in-memory, single-process event stream. Appends are idempotent on
/// `eventID`: re-appending an id already present in the retained window is
/// a no-op that returns the original offset, matching the "producers
/// guarantee eventID stability across retries" contract.
pub struct EventStream {
    inner: RwLock<Inner>,
}

impl EventStream {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                log: Vec::new(),
                next_offset: 0,
                seen_ids: HashMap::new(),
                acks: HashMap::new(),
            }),
        }
    }

    pub async fn append(&self, event_id: impl Into<String>, pod_id: impl Into<String>, kind: impl Into<String>) -> Offset {
        let event_id = event_id.into();
        let mut inner = self.inner.write().await;
        if let Some(&existing) = inner.seen_ids.get(&event_id) {
            return existing;
        }
        let offset = inner.next_offset;
        inner.next_offset += 1;
        inner.seen_ids.insert(event_id.clone(), offset);
        inner.log.push(PodEvent {
            event_id,
            pod_id: pod_id.into(),
            kind: kind.into(),
            offset,
        });
        offset
    }

    /// Events strictly after `after_offset`, in offset order. Pass the
    /// consumer's last-seen offset (or `None` to read from the retained
    /// start of the log).
    pub async fn read_after(&self, after_offset: Option<Offset>) -> Vec<PodEvent> {
        let inner = self.inner.read().await;
        match after_offset {
            Some(after) => inner.log.iter().filter(|e| e.offset > after).cloned().collect(),
            None => inner.log.clone(),
        }
    }

    /// Records a consumer's high-water mark. Acks only ever move forward;
    /// an older ack for a consumer that already acked further is ignored.
    pub async fn ack(&self, consumer: impl Into<String>, offset: Offset) {
        let mut inner = self.inner.write().await;
        let entry = inner.acks.entry(consumer.into()).or_insert(0);
        if offset > *entry {
            *entry = offset;
        }
    }

    /// Drops log entries at or below the minimum ack across all known
    /// consumers. A consumer that has never acked blocks truncation
    /// entirely (treated as ack at offset 0), so registering a consumer
    /// that never reads would starve the log; callers are expected to
    /// `ack` periodically or deregister via `forget_consumer`.
    pub async fn truncate_acked(&self) -> usize {
        let mut inner = self.inner.write().await;
        let min_ack = inner.acks.values().copied().min();
        let Some(min_ack) = min_ack else {
            return 0;
        };
        let before = inner.log.len();
        inner.log.retain(|e| e.offset > min_ack);
        inner.seen_ids.retain(|_, &mut offset| offset > min_ack);
        before - inner.log.len()
    }

    pub async fn forget_consumer(&self, consumer: &str) {
        self.inner.write().await.acks.remove(consumer);
    }

    pub async fn tail_offset(&self) -> Offset {
        self.inner.read().await.next_offset
    }

    /// Looks up a single event by id, for tests and debugging; `NotFound`
    /// if it was never appended or has since been truncated away.
    pub async fn get(&self, event_id: &str) -> Result<PodEvent> {
        let inner = self.inner.read().await;
        let offset = inner
            .seen_ids
            .get(event_id)
            .ok_or_else(|| PelotonError::NotFound(format!("event {event_id} not found")))?;
        inner
            .log
            .iter()
            .find(|e| e.offset == *offset)
            .cloned()
            .ok_or_else(|| PelotonError::NotFound(format!("event {event_id} has been truncated")))
    }
}

impl Default for EventStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offsets_strictly_increase_per_stream() {
        let stream = EventStream::new();
        let o1 = stream.append("e1", "pod-1", "Launched").await;
        let o2 = stream.append("e2", "pod-1", "Running").await;
        let o3 = stream.append("e3", "pod-2", "Launched").await;
        assert_eq!((o1, o2, o3), (0, 1, 2));
    }

    #[tokio::test]
    async fn redelivery_with_same_event_id_is_deduped() {
        let stream = EventStream::new();
        let first = stream.append("e1", "pod-1", "Launched").await;
        let retried = stream.append("e1", "pod-1", "Launched").await;
        assert_eq!(first, retried);
        assert_eq!(stream.read_after(None).await.len(), 1);
    }

    #[tokio::test]
    async fn consumers_observe_events_in_offset_order() {
        let stream = EventStream::new();
        stream.append("e1", "pod-1", "Launched").await;
        stream.append("e2", "pod-1", "Running").await;
        stream.append("e3", "pod-1", "Succeeded").await;

        let events = stream.read_after(None).await;
        let offsets: Vec<Offset> = events.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![0, 1, 2]);

        let remainder = stream.read_after(Some(0)).await;
        assert_eq!(remainder.len(), 2);
        assert_eq!(remainder[0].offset, 1);
    }

    #[tokio::test]
    async fn truncates_below_minimum_ack_across_consumers() {
        let stream = EventStream::new();
        for i in 0..5 {
            stream.append(format!("e{i}"), "pod-1", "tick").await;
        }
        stream.ack("consumer-a", 4).await;
        stream.ack("consumer-b", 1).await;

        let dropped = stream.truncate_acked().await;
        assert_eq!(dropped, 2); // offsets 0 and 1 are <= min(4, 1) = 1

        let remaining = stream.read_after(None).await;
        assert_eq!(remaining.len(), 3);
        assert!(remaining.iter().all(|e| e.offset > 1));
    }

    #[tokio::test]
    async fn no_consumer_acks_blocks_truncation() {
        let stream = EventStream::new();
        stream.append("e1", "pod-1", "tick").await;
        assert_eq!(stream.truncate_acked().await, 0);
    }

    #[tokio::test]
    async fn acks_never_move_backward() {
        let stream = EventStream::new();
        stream.ack("c", 5).await;
        stream.ack("c", 2).await;
        for i in 0..7 {
            stream.append(format!("e{i}"), "pod-1", "tick").await;
        }
        let dropped = stream.truncate_acked().await;
        assert_eq!(dropped, 6); // still gated by the high-water mark of 5, not the later lower ack
    }
}
