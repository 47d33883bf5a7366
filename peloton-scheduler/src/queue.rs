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

//! Gang queues: a multi-level FIFO-per-priority list, and the plain
//! priority queue built on top of it. Gangs are always moved as whole
//! units; nothing here ever exposes a partial gang.

use crate::gang::Gang;
use peloton_core::error::{PelotonError, Result};
use std::collections::{BTreeMap, VecDeque};

/// Per-priority FIFO lanes, iterable in descending priority order. Higher
/// integer priority is drained first; within a priority, insertion order is
/// preserved.
#[derive(Debug, Default)]
pub struct MultiLevelList {
    lanes: BTreeMap<u32, VecDeque<Gang>>,
}

impl MultiLevelList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, gang: Gang) {
        self.lanes.entry(gang.priority).or_default().push_back(gang);
    }

    /// The gang that would be dequeued next: the front of the
    /// highest-priority non-empty lane.
    pub fn peek_front(&self) -> Option<&Gang> {
        self.lanes
            .iter()
            .rev()
            .find_map(|(_, lane)| lane.front())
    }

    /// Removes and returns the gang `peek_front` would have returned.
    pub fn pop_front(&mut self) -> Option<Gang> {
        let priority = self.lanes.iter().rev().find_map(|(p, lane)| {
            if lane.is_empty() {
                None
            } else {
                Some(*p)
            }
        })?;
        let lane = self.lanes.get_mut(&priority)?;
        let gang = lane.pop_front();
        if lane.is_empty() {
            self.lanes.remove(&priority);
        }
        gang
    }

    pub fn len(&self, priority: u32) -> usize {
        self.lanes.get(&priority).map_or(0, VecDeque::len)
    }

    pub fn total_len(&self) -> usize {
        self.lanes.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.values().all(VecDeque::is_empty)
    }

    /// Priorities with at least one queued gang, descending.
    pub fn priorities(&self) -> Vec<u32> {
        self.lanes.keys().rev().copied().collect()
    }
}

/// Point-in-time view of queue depth, used for logging/introspection since
/// there is no metrics backend in scope.
#[derive(Debug, Clone, Default)]
pub struct QueueMetrics {
    pub len_by_priority: Vec<(u32, usize)>,
    pub total_len: usize,
}

/// The priority-FIFO gang queue a resource-pool leaf holds as its pending
/// queue. Thin wrapper over `MultiLevelList` that enforces the queue-level
/// invariants (non-empty gang, non-zero dequeue limit).
#[derive(Debug, Default)]
pub struct GangQueue {
    list: MultiLevelList,
}

impl GangQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, gang: Gang) -> Result<()> {
        if gang.is_empty() {
            return Err(PelotonError::InvalidArgument(
                "cannot enqueue an empty gang".to_string(),
            ));
        }
        self.list.push_back(gang);
        Ok(())
    }

    pub fn peek_front(&self) -> Option<&Gang> {
        self.list.peek_front()
    }

    pub fn pop_front(&mut self) -> Option<Gang> {
        self.list.pop_front()
    }

    /// Plain FIFO dequeue of up to `limit` gangs, honoring priority order,
    /// with no admission/entitlement check (that check belongs to the
    /// resource-pool tree, which owns head-of-line blocking). A limit
    /// of zero is invalid.
    pub fn dequeue_gang_list(&mut self, limit: usize) -> Result<Vec<Gang>> {
        if limit == 0 {
            return Err(PelotonError::InvalidArgument(
                "DequeueGangList(0) is invalid".to_string(),
            ));
        }
        let mut out = Vec::with_capacity(limit);
        for _ in 0..limit {
            match self.list.pop_front() {
                Some(g) => out.push(g),
                None => break,
            }
        }
        Ok(out)
    }

    pub fn len(&self, priority: u32) -> usize {
        self.list.len(priority)
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn metrics(&self) -> QueueMetrics {
        QueueMetrics {
            len_by_priority: self
                .list
                .priorities()
                .into_iter()
                .map(|p| (p, self.list.len(p)))
                .collect(),
            total_len: self.list.total_len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gang::Task;
    use peloton_core::Resources;
    use std::collections::HashMap;

    fn gang(id: &str, priority: u32) -> Gang {
        Gang {
            id: id.to_string(),
            priority,
            tasks: vec![Task {
                id: id.to_string(),
                job_id: "job".to_string(),
                priority,
                resources: Resources::new(1.0, 1.0, 1.0, 0.0),
                placement_constraints: HashMap::new(),
                config_version: 1,
            }],
        }
    }

    #[test]
    fn dequeue_zero_is_an_error() {
        let mut q = GangQueue::new();
        assert!(q.dequeue_gang_list(0).is_err());
    }

    #[test]
    fn enqueue_rejects_empty_gang() {
        let mut q = GangQueue::new();
        let empty = Gang {
            id: "g".to_string(),
            priority: 0,
            tasks: vec![],
        };
        assert!(q.enqueue(empty).is_err());
    }

    #[test]
    fn priority_fifo_dequeue_order() {
        // Enqueue p=0,1,2,2 then dequeue one at a time; expect p=2, p=2,
        // p=1, p=0.
        let mut q = GangQueue::new();
        q.enqueue(gang("a", 0)).unwrap();
        q.enqueue(gang("b", 1)).unwrap();
        q.enqueue(gang("c", 2)).unwrap();
        q.enqueue(gang("d", 2)).unwrap();

        let order: Vec<String> = (0..4)
            .map(|_| q.dequeue_gang_list(1).unwrap().remove(0).id)
            .collect();
        assert_eq!(order, vec!["c", "d", "b", "a"]);
    }

    #[test]
    fn gang_is_never_partially_dequeued() {
        let mut q = GangQueue::new();
        let mut g = gang("multi", 1);
        g.tasks.push(Task {
            id: "multi-2".to_string(),
            job_id: "job".to_string(),
            priority: 1,
            resources: Resources::new(1.0, 1.0, 1.0, 0.0),
            placement_constraints: HashMap::new(),
            config_version: 1,
        });
        q.enqueue(g).unwrap();
        let out = q.dequeue_gang_list(1).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].tasks.len(), 2);
    }
}
