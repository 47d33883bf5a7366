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

//! Per-host state and its lease lifecycle.

use crate::host::filter::{HostFilter, MatchResult};
use crate::host::status::HostStatus;
use chrono::{DateTime, Utc};
use peloton_core::error::{PelotonError, Result};
use peloton_core::resources::Resources;
use std::collections::HashMap;
use uuid::Uuid;

pub type PodId = String;

#[derive(Debug, Clone)]
pub struct HostSummary {
    pub hostname: String,
    pub capacity: Resources,
    pub pod_to_resources: HashMap<PodId, Resources>,
    pub held_pod_ids: HashMap<PodId, DateTime<Utc>>,
    pub labels: HashMap<String, String>,
    pub status: HostStatus,
    pub lease_id: Option<Uuid>,
    pub version: u64,
}

impl HostSummary {
    pub fn new(hostname: impl Into<String>, capacity: Resources) -> Self {
        Self {
            hostname: hostname.into(),
            capacity,
            pod_to_resources: HashMap::new(),
            held_pod_ids: HashMap::new(),
            labels: HashMap::new(),
            status: HostStatus::Ready,
            lease_id: None,
            version: 0,
        }
    }

    /// `allocated = Σ pod_to_resources.values`.
    pub fn allocated(&self) -> Resources {
        self.pod_to_resources
            .values()
            .fold(Resources::ZERO, |acc, r| acc.add(r))
    }

    /// `capacity - allocated`, clamped componentwise at zero with a logged
    /// overcommit rather than a panic (negative slack is logged, not
    /// fatal).
    pub fn available(&self) -> Resources {
        let allocated = self.allocated();
        match self.capacity.try_subtract(&allocated) {
            Some(r) => r,
            None => {
                tracing::warn!(
                    host = %self.hostname,
                    "allocated resources exceed capacity; host is overcommitted"
                );
                Resources::ZERO
            }
        }
    }

    fn mint_lease(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        self.lease_id = Some(id);
        id
    }

    fn clear_lease(&mut self) {
        self.lease_id = None;
    }

    fn bump_version(&mut self) {
        self.version += 1;
    }

    /// Explicit, validated state transition. `CasStatus(x, x)` always
    /// succeeds as a no-op; any transition outside the allowed table returns
    /// `InvalidArgument` without mutating anything.
    pub fn cas_status(&mut self, old: HostStatus, new: HostStatus) -> Result<()> {
        if self.status != old {
            return Err(PelotonError::InvalidArgument(format!(
                "expected status {old:?}, found {:?}",
                self.status
            )));
        }
        old.validate_transition(new)?;
        if old == new {
            return Ok(());
        }
        self.status = new;
        match new {
            HostStatus::Ready | HostStatus::Held => self.clear_lease(),
            HostStatus::Placing | HostStatus::Reserved => {
                self.mint_lease();
            }
        }
        self.bump_version();
        Ok(())
    }

    fn status_after_lease(&self) -> HostStatus {
        if self.held_pod_ids.is_empty() {
            HostStatus::Ready
        } else {
            HostStatus::Held
        }
    }

    /// Atomic placement attempt. Rejects hosts not in `Ready`/`Held`; a
    /// `Held` host only matches a filter that names it explicitly. On
    /// `Match`, transitions to `Placing` and mints a fresh lease id.
    pub fn try_match(&mut self, filter: &HostFilter) -> MatchResult {
        if self.status != HostStatus::Ready && self.status != HostStatus::Held {
            return MatchResult::MismatchStatus;
        }
        if self.status == HostStatus::Held && !filter.names_host(&self.hostname) {
            return MatchResult::MismatchStatus;
        }
        if !filter.constraints_satisfied(&self.labels) {
            return MatchResult::MismatchConstraints;
        }
        if !self.available().contains(&filter.min_resources) {
            return MatchResult::InsufficientResources;
        }

        self.status = HostStatus::Placing;
        self.mint_lease();
        self.bump_version();
        MatchResult::Match
    }

    /// Completes a lease. The host transitions back to `Ready`/`Held`
    /// *before* the launched pods are validated, so a validation failure
    /// still leaves the host observably out of `Placing`.
    pub fn complete_lease(&mut self, lease_id: Uuid, pods: HashMap<PodId, Resources>) -> Result<()> {
        if self.status != HostStatus::Placing {
            return Err(PelotonError::InvalidArgument(format!(
                "CompleteLease requires status Placing, found {:?}",
                self.status
            )));
        }
        if self.lease_id != Some(lease_id) {
            return Err(PelotonError::InvalidArgument(
                "CompleteLease lease id does not match the host's current lease".to_string(),
            ));
        }

        self.status = self.status_after_lease();
        self.clear_lease();
        self.bump_version();

        for pod_id in pods.keys() {
            if self.pod_to_resources.contains_key(pod_id) {
                return Err(PelotonError::AlreadyExists(format!(
                    "pod {pod_id} already present on host {}",
                    self.hostname
                )));
            }
        }
        let incoming_total = pods.values().fold(Resources::ZERO, |acc, r| acc.add(r));
        if !self.available().contains(&incoming_total) {
            return Err(PelotonError::InvalidArgument(format!(
                "launched pods do not fit available resources on host {}",
                self.hostname
            )));
        }

        self.pod_to_resources.extend(pods);
        Ok(())
    }

    /// Only valid in `Placing`; resets to `Ready`/`Held` without touching
    /// `pod_to_resources`.
    pub fn terminate_lease(&mut self) -> Result<()> {
        if self.status != HostStatus::Placing {
            return Err(PelotonError::InvalidArgument(format!(
                "TerminateLease requires status Placing, found {:?}",
                self.status
            )));
        }
        self.status = self.status_after_lease();
        self.clear_lease();
        self.bump_version();
        Ok(())
    }

    /// Idempotent: releasing an absent pod is logged and ignored.
    pub fn release_pod_resources(&mut self, pod_id: &str) {
        if self.pod_to_resources.remove(pod_id).is_none() {
            tracing::debug!(host = %self.hostname, pod = %pod_id, "release of absent pod ignored");
        } else {
            self.bump_version();
        }
    }

    /// Reserves the host for `pod_ids` with an expiration; transitions
    /// `Ready -> Held`.
    pub fn hold(&mut self, pod_ids: Vec<PodId>, expires_at: DateTime<Utc>) -> Result<()> {
        self.cas_status(HostStatus::Ready, HostStatus::Held)?;
        for pod_id in pod_ids {
            self.held_pod_ids.insert(pod_id, expires_at);
        }
        Ok(())
    }

    pub fn release_hold(&mut self, pod_id: &str) {
        self.held_pod_ids.remove(pod_id);
        if self.held_pod_ids.is_empty() && self.status == HostStatus::Held {
            self.status = HostStatus::Ready;
            self.bump_version();
        }
    }

    /// Clears any hold past `now`. Returns the expired pod ids.
    pub fn expire_holds(&mut self, now: DateTime<Utc>) -> Vec<PodId> {
        let expired: Vec<PodId> = self
            .held_pod_ids
            .iter()
            .filter(|(_, expiry)| **expiry <= now)
            .map(|(pod, _)| pod.clone())
            .collect();
        for pod in &expired {
            self.held_pod_ids.remove(pod);
        }
        if !expired.is_empty() && self.held_pod_ids.is_empty() && self.status == HostStatus::Held {
            self.status = HostStatus::Ready;
            self.bump_version();
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn cap() -> Resources {
        Resources::new(4.0, 8192.0, 100000.0, 0.0)
    }

    #[test]
    fn lease_completes_then_pod_release_frees_allocation() {
        let mut host = HostSummary::new("h1", cap());
        let filter = HostFilter::new(Resources::new(1.0, 1024.0, 0.0, 0.0));
        assert_eq!(host.try_match(&filter), MatchResult::Match);
        assert_eq!(host.status, HostStatus::Placing);
        let lease = host.lease_id.unwrap();

        let mut pods = HashMap::new();
        pods.insert("pod1".to_string(), Resources::new(1.0, 1024.0, 0.0, 0.0));
        host.complete_lease(lease, pods).unwrap();
        assert_eq!(host.status, HostStatus::Ready);
        assert!(host.allocated().approx_equal(&Resources::new(1.0, 1024.0, 0.0, 0.0)));

        host.release_pod_resources("pod1");
        assert!(host.allocated().approx_equal(&Resources::ZERO));
    }

    #[test]
    fn stale_lease_is_rejected_and_host_recovers_via_terminate() {
        let mut host = HostSummary::new("h1", cap());
        let filter = HostFilter::new(Resources::new(1.0, 1024.0, 0.0, 0.0));
        host.try_match(&filter);
        assert_eq!(host.status, HostStatus::Placing);

        let err = host.complete_lease(Uuid::new_v4(), HashMap::new()).unwrap_err();
        assert!(matches!(err, PelotonError::InvalidArgument(_)));
        assert_eq!(host.status, HostStatus::Placing);

        host.terminate_lease().unwrap();
        assert_eq!(host.status, HostStatus::Ready);
        assert!(host.lease_id.is_none());
    }

    #[test]
    fn held_host_only_matches_named_filter() {
        let mut host = HostSummary::new("h1", cap());
        host.hold(vec!["p1".to_string()], Utc::now() + Duration::minutes(3)).unwrap();

        let anon = HostFilter::new(Resources::new(1.0, 1.0, 0.0, 0.0));
        assert_eq!(host.try_match(&anon), MatchResult::MismatchStatus);

        let named = HostFilter::new(Resources::new(1.0, 1.0, 0.0, 0.0)).with_hint("h1");
        assert_eq!(host.try_match(&named), MatchResult::Match);
    }

    #[test]
    fn cas_status_identity_is_noop_and_wrong_old_fails_without_side_effects() {
        let mut host = HostSummary::new("h1", cap());
        host.cas_status(HostStatus::Ready, HostStatus::Ready).unwrap();
        assert_eq!(host.version, 0);

        let err = host.cas_status(HostStatus::Placing, HostStatus::Ready).unwrap_err();
        assert!(matches!(err, PelotonError::InvalidArgument(_)));
        assert_eq!(host.status, HostStatus::Ready);
        assert_eq!(host.version, 0);
    }

    #[test]
    fn release_pod_resources_is_idempotent() {
        let mut host = HostSummary::new("h1", cap());
        host.release_pod_resources("missing");
        host.release_pod_resources("missing");
    }

    #[test]
    fn expire_holds_clears_past_ttl() {
        let mut host = HostSummary::new("h1", cap());
        host.hold(vec!["p1".to_string()], Utc::now() - Duration::seconds(1)).unwrap();
        let expired = host.expire_holds(Utc::now());
        assert_eq!(expired, vec!["p1".to_string()]);
        assert_eq!(host.status, HostStatus::Ready);
    }

    #[test]
    fn complete_lease_recovers_status_even_when_validation_fails() {
        let mut host = HostSummary::new("h1", cap());
        let filter = HostFilter::new(Resources::new(1.0, 1024.0, 0.0, 0.0));
        host.try_match(&filter);
        let lease = host.lease_id.unwrap();

        let mut pods = HashMap::new();
        // Demand far exceeds available capacity: validation should fail...
        pods.insert("podx".to_string(), Resources::new(1000.0, 0.0, 0.0, 0.0));
        let err = host.complete_lease(lease, pods).unwrap_err();
        assert!(matches!(err, PelotonError::InvalidArgument(_)));
        // ...but status must already have recovered out of Placing.
        assert_eq!(host.status, HostStatus::Ready);
    }
}
