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

//! The closed state enumeration entities are drawn from, and the
//! state-vs-goal action tables, expressed as pure decision functions. Each
//! returns an `ActionKind`; the engine (or a per-entity `suggest_action`)
//! turns that into an executable `Action`.

use serde::{Deserialize, Serialize};

/// Shared by jobs, updates and tasks; not every variant is reachable by
/// every entity kind, but a single closed enum (with `Unknown` standing in
/// for loader failure) is simpler than three overlapping ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    Uninitialized,
    Initialized,
    Pending,
    Launching,
    Launched,
    Running,
    Killing,
    Killed,
    Succeeded,
    Failed,
    Unknown,
}

impl EntityState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EntityState::Succeeded | EntityState::Failed | EntityState::Killed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    NoAction,
    Untrack,
    CreateTasks,
    Recover,
    StateInvalid,
    Kill,
    Start,
    Stop,
    TerminalCleanup,
    SwitchToGoalVersion,
}

impl ActionKind {
    /// Backoff rule: no action or untrack means do not reschedule.
    pub fn reschedules(self) -> bool {
        !matches!(self, ActionKind::NoAction | ActionKind::Untrack)
    }

    pub fn name(self) -> &'static str {
        match self {
            ActionKind::NoAction => "NoAction",
            ActionKind::Untrack => "Untrack",
            ActionKind::CreateTasks => "CreateTasks",
            ActionKind::Recover => "Recover",
            ActionKind::StateInvalid => "StateInvalid",
            ActionKind::Kill => "Kill",
            ActionKind::Start => "Start",
            ActionKind::Stop => "Stop",
            ActionKind::TerminalCleanup => "TerminalCleanup",
            ActionKind::SwitchToGoalVersion => "SwitchToGoalVersion",
        }
    }
}

/// Job goal-state table. `config_version_matches` is
/// `false` when `current.configVersion != goal.configVersion`, which forces
/// a stop-and-redeploy ahead of the ordinary table ("version
/// mismatch").
pub fn job_action(state: EntityState, goal: EntityState, config_version_matches: bool) -> ActionKind {
    use EntityState::*;

    if !config_version_matches {
        return if state.is_terminal() {
            ActionKind::SwitchToGoalVersion
        } else {
            ActionKind::Stop
        };
    }

    match goal {
        Running => match state {
            Initialized => ActionKind::CreateTasks,
            Uninitialized => ActionKind::Recover,
            Succeeded | Failed | Killing => ActionKind::StateInvalid,
            _ => ActionKind::NoAction,
        },
        Killed => match state {
            Initialized | Pending | Running => ActionKind::Kill,
            s if s.is_terminal() => ActionKind::Untrack,
            _ => ActionKind::NoAction,
        },
        _ => ActionKind::NoAction,
    }
}

/// Task goal-state table.
pub fn task_action(state: EntityState, goal: EntityState, config_version_matches: bool) -> ActionKind {
    use EntityState::*;

    if !config_version_matches {
        return if state.is_terminal() {
            ActionKind::SwitchToGoalVersion
        } else {
            ActionKind::Stop
        };
    }

    match goal {
        Running => match state {
            Initialized => ActionKind::Start,
            _ => ActionKind::NoAction,
        },
        Killed => match state {
            Initialized | Launching | Launched | Running => ActionKind::Stop,
            Killed | Succeeded | Failed => ActionKind::Untrack,
            _ => ActionKind::NoAction,
        },
        Succeeded | Failed => match state {
            s if s.is_terminal() => ActionKind::TerminalCleanup,
            _ => ActionKind::NoAction,
        },
        _ => ActionKind::NoAction,
    }
}
