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

//! Scheduler-wide configuration, loaded from YAML. Structured as
//! per-component config structs rather than one flat struct, without the
//! `configure_me` build-time codegen (see `DESIGN.md` for the rationale).

use crate::error::{PelotonError, Result};
use crate::resources::Resources;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalStateConfig {
    pub success_delay_secs: u64,
    pub failure_delay_secs: u64,
    pub max_delay_secs: u64,
    pub default_action_timeout_secs: u64,
    pub worker_pool_size: usize,
}

impl Default for GoalStateConfig {
    fn default() -> Self {
        Self {
            success_delay_secs: 10,
            failure_delay_secs: 10,
            max_delay_secs: 300,
            default_action_timeout_secs: 5,
            worker_pool_size: 20,
        }
    }
}

impl GoalStateConfig {
    pub fn success_delay(&self) -> Duration {
        Duration::from_secs(self.success_delay_secs)
    }

    pub fn failure_delay(&self) -> Duration {
        Duration::from_secs(self.failure_delay_secs)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }

    pub fn default_action_timeout(&self) -> Duration {
        Duration::from_secs(self.default_action_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostCacheConfig {
    pub held_ttl_secs: u64,
}

impl Default for HostCacheConfig {
    fn default() -> Self {
        Self { held_ttl_secs: 180 }
    }
}

impl HostCacheConfig {
    pub fn held_ttl(&self) -> Duration {
        Duration::from_secs(self.held_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PelotonConfig {
    pub scheduler_name: String,
    pub goal_state: GoalStateConfig,
    pub host_cache: HostCacheConfig,
    pub max_batch_size: usize,
    /// Total capacity the root resource pool is entitled to; every other
    /// pool's entitlement is bounded transitively by this.
    pub cluster_capacity: Resources,
}

impl Default for PelotonConfig {
    fn default() -> Self {
        Self {
            scheduler_name: "peloton-scheduler-0".to_string(),
            goal_state: GoalStateConfig::default(),
            host_cache: HostCacheConfig::default(),
            max_batch_size: 1000,
            cluster_capacity: Resources::new(1000.0, 1_000_000.0, 10_000_000.0, 16.0),
        }
    }
}

impl PelotonConfig {
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| PelotonError::InvalidArgument(format!("invalid config: {e}")))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PelotonError::InvalidArgument(format!(
                "could not read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_yaml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = PelotonConfig::default();
        assert_eq!(cfg.max_batch_size, 1000);
        assert_eq!(cfg.goal_state.max_delay_secs, 300);
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let cfg = PelotonConfig::from_yaml_str("scheduler_name: my-scheduler\n").unwrap();
        assert_eq!(cfg.scheduler_name, "my-scheduler");
        assert_eq!(cfg.host_cache.held_ttl_secs, 180);
    }

    #[test]
    fn invalid_yaml_is_rejected() {
        let err = PelotonConfig::from_yaml_str("not: [valid: yaml").unwrap_err();
        assert!(matches!(err, PelotonError::InvalidArgument(_)));
    }
}
