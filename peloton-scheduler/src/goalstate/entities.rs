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

//! Concrete `GoalStateEntity` implementations realizing the job/task action
//! tables, so the engine is exercised end-to-end rather than left purely
//! generic: task/job/update entities all share the engine.

use super::tables::{job_action, task_action, ActionKind, EntityState};
use super::{Action, ActionPlan, GoalStateEntity};
use async_trait::async_trait;
use peloton_core::error::Result;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Runs the side effect behind one `ActionKind` (creating tasks, starting a
/// task's container, killing it, ...). Implementations come from outside
/// this crate in a real deployment (task launcher, agent RPC); tests supply
/// stubs.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn run(&self, action: ActionKind) -> Result<()>;
}

struct EntityCore {
    state: RwLock<EntityState>,
    goal: RwLock<EntityState>,
    config_version: RwLock<u64>,
    goal_config_version: RwLock<u64>,
}

impl EntityCore {
    fn new(state: EntityState, goal: EntityState) -> Self {
        Self {
            state: RwLock::new(state),
            goal: RwLock::new(goal),
            config_version: RwLock::new(1),
            goal_config_version: RwLock::new(1),
        }
    }
}

/// The state mutation an action performs on success, expressed as a table
/// rather than scattered `match` arms at each call site.
fn success_transition(action: ActionKind) -> Option<EntityState> {
    match action {
        ActionKind::CreateTasks | ActionKind::Recover => Some(EntityState::Pending),
        ActionKind::Start => Some(EntityState::Running),
        ActionKind::Stop | ActionKind::Kill => Some(EntityState::Killed),
        ActionKind::SwitchToGoalVersion => None, // caller bumps config_version separately
        ActionKind::TerminalCleanup | ActionKind::StateInvalid | ActionKind::NoAction | ActionKind::Untrack => None,
    }
}

struct TableAction {
    kind: ActionKind,
    handler: Arc<dyn ActionHandler>,
    core: Arc<EntityCore>,
}

#[async_trait]
impl Action for TableAction {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    async fn execute(&self) -> Result<()> {
        self.handler.run(self.kind).await?;
        if let Some(next) = success_transition(self.kind) {
            *self.core.state.write().await = next;
        }
        if self.kind == ActionKind::SwitchToGoalVersion {
            let goal_version = *self.core.goal_config_version.read().await;
            *self.core.config_version.write().await = goal_version;
        }
        Ok(())
    }
}

fn plan_from_kind(kind: ActionKind, handler: Arc<dyn ActionHandler>, core: Arc<EntityCore>) -> ActionPlan {
    match kind {
        ActionKind::NoAction => ActionPlan::NoAction,
        ActionKind::Untrack => ActionPlan::Untrack,
        other => ActionPlan::Run(vec![Arc::new(TableAction { kind: other, handler, core })]),
    }
}

pub struct TaskEntity {
    id: String,
    core: Arc<EntityCore>,
    handler: Arc<dyn ActionHandler>,
}

impl TaskEntity {
    pub fn new(id: impl Into<String>, state: EntityState, goal: EntityState, handler: Arc<dyn ActionHandler>) -> Self {
        Self {
            id: id.into(),
            core: Arc::new(EntityCore::new(state, goal)),
            handler,
        }
    }

    pub async fn state(&self) -> EntityState {
        *self.core.state.read().await
    }

    pub async fn set_goal(&self, goal: EntityState) {
        *self.core.goal.write().await = goal;
    }

    pub async fn bump_goal_config_version(&self) {
        *self.core.goal_config_version.write().await += 1;
    }
}

#[async_trait]
impl GoalStateEntity for TaskEntity {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn get_state(&self) -> EntityState {
        *self.core.state.read().await
    }

    async fn get_goal_state(&self) -> EntityState {
        *self.core.goal.read().await
    }

    async fn get_actions(&self, state: EntityState, goal: EntityState) -> ActionPlan {
        let version_matches = *self.core.config_version.read().await == *self.core.goal_config_version.read().await;
        let kind = task_action(state, goal, version_matches);
        plan_from_kind(kind, self.handler.clone(), self.core.clone())
    }
}

pub struct JobEntity {
    id: String,
    core: Arc<EntityCore>,
    handler: Arc<dyn ActionHandler>,
}

impl JobEntity {
    pub fn new(id: impl Into<String>, state: EntityState, goal: EntityState, handler: Arc<dyn ActionHandler>) -> Self {
        Self {
            id: id.into(),
            core: Arc::new(EntityCore::new(state, goal)),
            handler,
        }
    }

    pub async fn state(&self) -> EntityState {
        *self.core.state.read().await
    }
}

#[async_trait]
impl GoalStateEntity for JobEntity {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn get_state(&self) -> EntityState {
        *self.core.state.read().await
    }

    async fn get_goal_state(&self) -> EntityState {
        *self.core.goal.read().await
    }

    async fn get_actions(&self, state: EntityState, goal: EntityState) -> ActionPlan {
        let version_matches = *self.core.config_version.read().await == *self.core.goal_config_version.read().await;
        let kind = job_action(state, goal, version_matches);
        plan_from_kind(kind, self.handler.clone(), self.core.clone())
    }
}
