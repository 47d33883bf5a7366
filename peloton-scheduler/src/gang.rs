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

//! Tasks and gangs. A gang is the atomic unit the queues and
//! the resource-pool tree operate on; a lone task is a degenerate gang of
//! size one.

use peloton_core::Resources;
use std::collections::HashMap;

pub type TaskId = String;
pub type JobId = String;
pub type GangId = String;

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub job_id: JobId,
    pub priority: u32,
    pub resources: Resources,
    pub placement_constraints: HashMap<String, String>,
    pub config_version: u64,
}

/// A set of tasks that must be scheduled together, all-or-nothing. `id` is
/// used purely for bookkeeping/logging; equality and FIFO order are
/// determined by queue position, not by this field.
#[derive(Debug, Clone, PartialEq)]
pub struct Gang {
    pub id: GangId,
    pub priority: u32,
    pub tasks: Vec<Task>,
}

impl Gang {
    /// Wraps a single task as a degenerate gang.
    pub fn single(task: Task) -> Self {
        let id = task.id.clone();
        let priority = task.priority;
        Self {
            id,
            priority,
            tasks: vec![task],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Sum of every member task's resource demand; what the gang must fit
    /// within a pool's entitlement to be dequeue-eligible.
    pub fn total_resources(&self) -> Resources {
        self.tasks
            .iter()
            .fold(Resources::ZERO, |acc, t| acc.add(&t.resources))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, priority: u32, cpu: f64) -> Task {
        Task {
            id: id.to_string(),
            job_id: "job-1".to_string(),
            priority,
            resources: Resources::new(cpu, 0.0, 0.0, 0.0),
            placement_constraints: HashMap::new(),
            config_version: 1,
        }
    }

    #[test]
    fn single_wraps_one_task() {
        let gang = Gang::single(task("t1", 2, 1.0));
        assert_eq!(gang.tasks.len(), 1);
        assert_eq!(gang.priority, 2);
    }

    #[test]
    fn total_resources_sums_members() {
        let gang = Gang {
            id: "g1".to_string(),
            priority: 1,
            tasks: vec![task("t1", 1, 1.0), task("t2", 1, 2.0)],
        };
        assert!(gang.total_resources().approx_equal(&Resources::new(3.0, 0.0, 0.0, 0.0)));
    }
}
