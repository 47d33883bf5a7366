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

//! Per-kind resource configuration and scheduling policy for a resource-pool
//! node.

use peloton_core::error::{PelotonError, Result};
use peloton_core::resources::Resources;
use serde::{Deserialize, Serialize};

/// The only scheduling policy currently supported; kept as an enum (rather
/// than a string) so an unknown policy is a compile-time impossibility and
/// a parse-time error, never a silent runtime default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingPolicy {
    PriorityFifo,
}

impl std::str::FromStr for SchedulingPolicy {
    type Err = PelotonError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PriorityFIFO" | "PriorityFifo" | "priority_fifo" => Ok(SchedulingPolicy::PriorityFifo),
            other => Err(PelotonError::InvalidArgument(format!(
                "unknown scheduling policy: {other}"
            ))),
        }
    }
}

/// `reservation`/`limit`/`share` for a single resource kind, with the
/// invariant `0 <= reservation <= limit` and `share >= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KindConfig {
    pub reservation: f64,
    pub limit: f64,
    pub share: f64,
}

impl KindConfig {
    pub fn validate(&self, kind: &str) -> Result<()> {
        if self.reservation < 0.0 {
            return Err(PelotonError::InvalidArgument(format!(
                "{kind} reservation must be non-negative, got {}",
                self.reservation
            )));
        }
        if self.reservation > self.limit {
            return Err(PelotonError::InvalidArgument(format!(
                "{kind} reservation ({}) exceeds limit ({})",
                self.reservation, self.limit
            )));
        }
        if self.share < 0.0 {
            return Err(PelotonError::InvalidArgument(format!(
                "{kind} share must be non-negative, got {}",
                self.share
            )));
        }
        Ok(())
    }
}

/// Resource configuration across all four kinds. All four must be present
/// for a pool to be valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub cpu: KindConfig,
    pub mem: KindConfig,
    pub disk: KindConfig,
    pub gpu: KindConfig,
}

impl ResourceConfig {
    pub fn validate(&self) -> Result<()> {
        self.cpu.validate("cpu")?;
        self.mem.validate("mem")?;
        self.disk.validate("disk")?;
        self.gpu.validate("gpu")?;
        Ok(())
    }

    pub fn reservation_vector(&self) -> Resources {
        Resources::new(
            self.cpu.reservation,
            self.mem.reservation,
            self.disk.reservation,
            self.gpu.reservation,
        )
    }

    pub fn limit_vector(&self) -> Resources {
        Resources::new(self.cpu.limit, self.mem.limit, self.disk.limit, self.gpu.limit)
    }

    pub fn share_vector(&self) -> [f64; 4] {
        [self.cpu.share, self.mem.share, self.disk.share, self.gpu.share]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespoolConfig {
    pub name: String,
    pub policy: SchedulingPolicy,
    pub resources: ResourceConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kc(reservation: f64, limit: f64, share: f64) -> KindConfig {
        KindConfig { reservation, limit, share }
    }

    #[test]
    fn rejects_reservation_above_limit() {
        let cfg = ResourceConfig {
            cpu: kc(10.0, 5.0, 1.0),
            mem: kc(0.0, 1.0, 1.0),
            disk: kc(0.0, 1.0, 1.0),
            gpu: kc(0.0, 1.0, 1.0),
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn accepts_well_formed_config() {
        let cfg = ResourceConfig {
            cpu: kc(1.0, 2.0, 1.0),
            mem: kc(1.0, 2.0, 1.0),
            disk: kc(1.0, 2.0, 1.0),
            gpu: kc(0.0, 0.0, 0.0),
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn unknown_policy_string_is_rejected() {
        assert!("BestFit".parse::<SchedulingPolicy>().is_err());
    }
}
