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

//! Scalar resource vectors and the arithmetic the rest of the scheduler is
//! built on. Every operation here is pure and total; there is no shared
//! state and no fallible allocation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Absorbs accumulated floating point rounding when comparing resource
/// vectors for equality or containment.
pub const EPSILON: f64 = 1e-6;

/// A 4-tuple of non-negative floats: CPU cores, memory (MB), disk (MB), GPU
/// count. All components are expected to be `>= 0.0`; callers that produce
/// negative components (e.g. an unclamped subtraction) are responsible for
/// clamping, `TrySubtract` below refuses to produce them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    pub cpu: f64,
    pub mem: f64,
    pub disk: f64,
    pub gpu: f64,
}

impl Resources {
    pub const ZERO: Resources = Resources {
        cpu: 0.0,
        mem: 0.0,
        disk: 0.0,
        gpu: 0.0,
    };

    pub fn new(cpu: f64, mem: f64, disk: f64, gpu: f64) -> Self {
        Self { cpu, mem, disk, gpu }
    }

    /// Componentwise sum. Total: always succeeds.
    pub fn add(&self, other: &Resources) -> Resources {
        Resources {
            cpu: self.cpu + other.cpu,
            mem: self.mem + other.mem,
            disk: self.disk + other.disk,
            gpu: self.gpu + other.gpu,
        }
    }

    /// Componentwise subtraction, succeeding only if every component of
    /// `self` dominates the corresponding component of `other`.
    pub fn try_subtract(&self, other: &Resources) -> Option<Resources> {
        if !self.contains(other) {
            return None;
        }
        Some(Resources {
            cpu: self.cpu - other.cpu,
            mem: self.mem - other.mem,
            disk: self.disk - other.disk,
            gpu: self.gpu - other.gpu,
        })
    }

    /// `true` iff every component of `self` is greater than or equal to the
    /// matching component of `other`, within `EPSILON`.
    pub fn contains(&self, other: &Resources) -> bool {
        self.cpu + EPSILON >= other.cpu
            && self.mem + EPSILON >= other.mem
            && self.disk + EPSILON >= other.disk
            && self.gpu + EPSILON >= other.gpu
    }

    /// Componentwise minimum. Total: always succeeds.
    pub fn minimum(&self, other: &Resources) -> Resources {
        Resources {
            cpu: self.cpu.min(other.cpu),
            mem: self.mem.min(other.mem),
            disk: self.disk.min(other.disk),
            gpu: self.gpu.min(other.gpu),
        }
    }

    pub fn has_gpu(&self) -> bool {
        self.gpu > EPSILON
    }

    /// Names of the kinds with a non-zero value, in declaration order.
    pub fn non_empty_fields(&self) -> Vec<&'static str> {
        let mut out = Vec::with_capacity(4);
        if self.cpu > EPSILON {
            out.push("cpu");
        }
        if self.mem > EPSILON {
            out.push("mem");
        }
        if self.disk > EPSILON {
            out.push("disk");
        }
        if self.gpu > EPSILON {
            out.push("gpu");
        }
        out
    }

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() <= EPSILON
    }

    /// Componentwise equality within `EPSILON`, used in tests and by
    /// invariant checks instead of derived `PartialEq` (which is exact).
    pub fn approx_equal(&self, other: &Resources) -> bool {
        Self::approx_eq(self.cpu, other.cpu)
            && Self::approx_eq(self.mem, other.mem)
            && Self::approx_eq(self.disk, other.disk)
            && Self::approx_eq(self.gpu, other.gpu)
    }
}

impl fmt::Display for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{cpu: {}, mem: {}, disk: {}, gpu: {}}}",
            self.cpu, self.mem, self.disk, self.gpu
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_total() {
        let a = Resources::new(1.0, 2.0, 3.0, 0.0);
        let b = Resources::new(0.5, 0.5, 0.5, 1.0);
        let c = a.add(&b);
        assert!(c.approx_equal(&Resources::new(1.5, 2.5, 3.5, 1.0)));
    }

    #[test]
    fn try_subtract_round_trips() {
        let a = Resources::new(4.0, 8192.0, 1000.0, 1.0);
        let b = Resources::new(1.0, 1024.0, 0.0, 0.0);
        let sum = a.add(&b);
        let back = sum.try_subtract(&b).expect("subtract should succeed");
        assert!(back.approx_equal(&a));
    }

    #[test]
    fn try_subtract_rejects_when_not_dominated() {
        let a = Resources::new(1.0, 1.0, 1.0, 0.0);
        let b = Resources::new(2.0, 0.0, 0.0, 0.0);
        assert!(a.try_subtract(&b).is_none());
    }

    #[test]
    fn contains_is_reflexive() {
        let a = Resources::new(1.0, 1.0, 1.0, 1.0);
        assert!(a.contains(&a));
    }

    #[test]
    fn minimum_picks_smaller_component() {
        let a = Resources::new(1.0, 5.0, 3.0, 0.0);
        let b = Resources::new(2.0, 2.0, 3.0, 1.0);
        let m = a.minimum(&b);
        assert!(m.approx_equal(&Resources::new(1.0, 2.0, 3.0, 0.0)));
    }

    #[test]
    fn non_empty_fields_lists_nonzero_kinds() {
        let r = Resources::new(1.0, 0.0, 0.0, 2.0);
        assert_eq!(r.non_empty_fields(), vec!["cpu", "gpu"]);
    }

    #[test]
    fn has_gpu_respects_epsilon() {
        let r = Resources::new(0.0, 0.0, 0.0, 1e-9);
        assert!(!r.has_gpu());
    }
}
