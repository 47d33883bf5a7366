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

//! The backoff schedule: pure function from
//! "what happened last time" to "how long until the next tick".

use peloton_core::config::GoalStateConfig;
use std::time::{Duration, Instant};

/// Per-entity memory of the last action taken, used to detect whether the
/// same action is repeating (in which case delay accumulates) or a new
/// action just started (in which case delay resets to the base delay).
#[derive(Debug, Clone, Default)]
pub struct BackoffState {
    pub last_action: Option<String>,
    pub last_action_time: Option<Instant>,
}

/// Computes the delay until the next reconcile tick for an entity whose
/// most recent action was `action_name`, which succeeded iff `ok`.
///
/// - First observation of an action: `successDelay` if ok, else
///   `failureDelay`.
/// - Same action repeats: `(now - lastActionTime) + successDelay|failureDelay`,
///   capped at `maxDelay`.
pub fn next_delay(
    cfg: &GoalStateConfig,
    state: &BackoffState,
    action_name: &str,
    ok: bool,
    now: Instant,
) -> Duration {
    let base = if ok { cfg.success_delay() } else { cfg.failure_delay() };
    let repeats = state
        .last_action
        .as_deref()
        .map(|prev| prev == action_name)
        .unwrap_or(false);

    let delay = if repeats {
        let elapsed = state
            .last_action_time
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or(Duration::ZERO);
        elapsed + base
    } else {
        base
    };

    delay.min(cfg.max_delay())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> GoalStateConfig {
        GoalStateConfig {
            success_delay_secs: 10,
            failure_delay_secs: 5,
            max_delay_secs: 60,
            default_action_timeout_secs: 5,
            worker_pool_size: 4,
        }
    }

    #[test]
    fn first_observation_uses_base_delay() {
        let state = BackoffState::default();
        let now = Instant::now();
        assert_eq!(next_delay(&cfg(), &state, "Start", true, now), Duration::from_secs(10));
        assert_eq!(next_delay(&cfg(), &state, "Start", false, now), Duration::from_secs(5));
    }

    #[test]
    fn repeated_action_accumulates_and_caps_at_max() {
        let now = Instant::now();
        let state = BackoffState {
            last_action: Some("Start".to_string()),
            last_action_time: Some(now - Duration::from_secs(100)),
        };
        let delay = next_delay(&cfg(), &state, "Start", false, now);
        assert_eq!(delay, Duration::from_secs(60)); // 100 + 5 capped at 60
    }

    #[test]
    fn new_action_resets_to_base_delay() {
        let now = Instant::now();
        let state = BackoffState {
            last_action: Some("Stop".to_string()),
            last_action_time: Some(now - Duration::from_secs(100)),
        };
        let delay = next_delay(&cfg(), &state, "Start", true, now);
        assert_eq!(delay, Duration::from_secs(10));
    }
}
