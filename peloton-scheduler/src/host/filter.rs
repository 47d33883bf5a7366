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

//! A placement engine's request against the host cache.

use peloton_core::resources::Resources;
use std::collections::HashMap;

/// Minimum resource requirement plus optional placement constraints a
/// candidate host must satisfy, and an optional hint naming a specific
/// host (used to match `Held` hosts, which otherwise refuse all filters).
#[derive(Debug, Clone)]
pub struct HostFilter {
    pub min_resources: Resources,
    pub constraints: HashMap<String, String>,
    pub host_hint: Option<String>,
}

impl HostFilter {
    pub fn new(min_resources: Resources) -> Self {
        Self {
            min_resources,
            constraints: HashMap::new(),
            host_hint: None,
        }
    }

    pub fn with_hint(mut self, hostname: impl Into<String>) -> Self {
        self.host_hint = Some(hostname.into());
        self
    }

    pub fn with_constraint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.constraints.insert(key.into(), value.into());
        self
    }

    pub fn names_host(&self, hostname: &str) -> bool {
        self.host_hint.as_deref() == Some(hostname)
    }

    /// `true` iff every constraint is satisfied by `labels`.
    pub fn constraints_satisfied(&self, labels: &HashMap<String, String>) -> bool {
        self.constraints
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
    }
}

/// The outcome of `TryMatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    Match,
    MismatchStatus,
    InsufficientResources,
    MismatchConstraints,
}
