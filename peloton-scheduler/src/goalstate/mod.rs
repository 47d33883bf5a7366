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

//! The generic goal-state engine: a reconciler over entities that
//! converges current state toward a declared goal via idempotent actions,
//! with per-entity backoff and a bounded concurrent worker pool.

pub mod backoff;
pub mod entities;
pub mod tables;

use async_trait::async_trait;
use backoff::BackoffState;
use futures::future::join_all;
use peloton_core::config::GoalStateConfig;
use peloton_core::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tables::EntityState;
use tokio::sync::{RwLock, Semaphore};
use tracing::{error, info, warn};

/// One idempotent unit of work prescribed by an action table entry.
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self) -> Result<()>;
    /// `None` means "use the engine's default action timeout".
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

/// What `GoalStateEntity::get_actions` hands back: either nothing to do
/// (don't reschedule), a directive to stop tracking the entity entirely
/// (also don't reschedule), or a batch of actions to run serially.
pub enum ActionPlan {
    NoAction,
    Untrack,
    Run(Vec<Arc<dyn Action>>),
}

/// An entity the engine can converge towards a goal state. Job, Update and
/// Task all implement this.
#[async_trait]
pub trait GoalStateEntity: Send + Sync {
    fn id(&self) -> String;
    async fn get_state(&self) -> EntityState;
    async fn get_goal_state(&self) -> EntityState;
    async fn get_actions(&self, state: EntityState, goal: EntityState) -> ActionPlan;
}

struct EntityRecord {
    entity: Arc<dyn GoalStateEntity>,
    deadline: Instant,
    backoff: BackoffState,
    in_flight: bool,
}

/// Outcome of reconciling one entity once, used by tests and by the
/// scheduling loop to decide the next deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No action was due; nothing rescheduled.
    NotRescheduled,
    /// An action ran (name, whether every action in the batch succeeded)
    /// and the entity was rescheduled.
    Ran { action: String, ok: bool },
}

pub struct GoalStateEngine {
    config: GoalStateConfig,
    entities: RwLock<HashMap<String, EntityRecord>>,
    worker_permits: Semaphore,
}

impl GoalStateEngine {
    pub fn new(config: GoalStateConfig) -> Self {
        let worker_permits = Semaphore::new(config.worker_pool_size.max(1));
        Self {
            config,
            entities: RwLock::new(HashMap::new()),
            worker_permits,
        }
    }

    /// Registers (or re-registers) an entity, due immediately.
    pub async fn track(&self, entity: Arc<dyn GoalStateEntity>) {
        let id = entity.id();
        self.entities.write().await.insert(
            id,
            EntityRecord {
                entity,
                deadline: Instant::now(),
                backoff: BackoffState::default(),
                in_flight: false,
            },
        );
    }

    pub async fn untrack(&self, id: &str) {
        self.entities.write().await.remove(id);
    }

    pub async fn tracked_ids(&self) -> Vec<String> {
        self.entities.read().await.keys().cloned().collect()
    }

    /// Runs one reconcile pass: every entity due at or before `now` and not
    /// already in flight is dispatched, bounded by the worker pool. Returns
    /// each dispatched entity's outcome, keyed by entity id. Per entity,
    /// actions are serialized (the "running" flag below); across entities
    /// they run concurrently, up to `worker_pool_size` at a time, since every
    /// due entity's future is polled together rather than one at a time.
    pub async fn reconcile_due(&self, now: Instant) -> HashMap<String, ReconcileOutcome> {
        let due_ids: Vec<String> = {
            let mut entities = self.entities.write().await;
            let mut ids = Vec::new();
            for (id, record) in entities.iter_mut() {
                if !record.in_flight && record.deadline <= now {
                    record.in_flight = true;
                    ids.push(id.clone());
                }
            }
            ids
        };

        let tasks = due_ids.into_iter().map(|id| async move {
            let permit = self.worker_permits.acquire().await.expect("worker semaphore is never closed");
            let outcome = self.reconcile_one(&id, now).await;
            drop(permit);
            (id, outcome)
        });
        join_all(tasks).await.into_iter().collect()
    }

    async fn reconcile_one(&self, id: &str, now: Instant) -> ReconcileOutcome {
        let entity = match self.entities.read().await.get(id) {
            Some(r) => r.entity.clone(),
            None => return ReconcileOutcome::NotRescheduled,
        };

        let state = entity.get_state().await;
        let goal = entity.get_goal_state().await;

        if state == EntityState::Unknown || goal == EntityState::Unknown {
            warn!(entity = %id, "state or goal state unknown; scheduling short retry");
            self.reschedule(id, now, self.config.failure_delay(), None).await;
            return ReconcileOutcome::NotRescheduled;
        }

        let plan = entity.get_actions(state, goal).await;
        match plan {
            ActionPlan::NoAction => {
                self.clear_in_flight(id).await;
                ReconcileOutcome::NotRescheduled
            }
            ActionPlan::Untrack => {
                self.untrack(id).await;
                ReconcileOutcome::NotRescheduled
            }
            ActionPlan::Run(actions) => {
                let mut all_ok = true;
                let mut last_name = "NoAction";
                for action in &actions {
                    last_name = action.name();
                    let timeout = action.timeout().unwrap_or_else(|| self.config.default_action_timeout());
                    let result = tokio::time::timeout(timeout, action.execute()).await;
                    let ok = matches!(result, Ok(Ok(()))) ;
                    if !ok {
                        all_ok = false;
                        match result {
                            Ok(Err(e)) => error!(entity = %id, action = action.name(), error = %e, "action failed"),
                            Err(_) => error!(entity = %id, action = action.name(), "action timed out; cancelling I/O but recording as attempted"),
                            _ => unreachable!(),
                        }
                    }
                }

                let delay = {
                    let entities = self.entities.read().await;
                    let backoff = entities.get(id).map(|r| r.backoff.clone()).unwrap_or_default();
                    backoff::next_delay(&self.config, &backoff, last_name, all_ok, now)
                };
                self.reschedule(id, now, delay, Some(last_name.to_string())).await;
                ReconcileOutcome::Ran { action: last_name.to_string(), ok: all_ok }
            }
        }
    }

    async fn clear_in_flight(&self, id: &str) {
        if let Some(record) = self.entities.write().await.get_mut(id) {
            record.in_flight = false;
        }
    }

    async fn reschedule(&self, id: &str, now: Instant, delay: Duration, action_name: Option<String>) {
        let mut entities = self.entities.write().await;
        if let Some(record) = entities.get_mut(id) {
            record.deadline = now + delay;
            record.in_flight = false;
            if let Some(name) = action_name {
                record.backoff = BackoffState {
                    last_action: Some(name),
                    last_action_time: Some(now),
                };
            }
            info!(entity = %id, next_deadline_secs = delay.as_secs(), "rescheduled entity");
        }
    }
}
