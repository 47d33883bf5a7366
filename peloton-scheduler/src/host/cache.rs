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

//! The host cache: per-host lease state machine used by placement engines
//! to atomically reserve resources. Each host's mutable state is behind its
//! own lock; mutators take the write lock, read-only accessors take the
//! read lock, and no lock is ever held across an external call (every
//! method here is purely in-memory).

use crate::host::filter::{HostFilter, MatchResult};
use crate::host::status::HostStatus;
use crate::host::summary::{HostSummary, PodId};
use chrono::{DateTime, Utc};
use peloton_core::error::{PelotonError, Result};
use peloton_core::resources::Resources;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct HostCache {
    hosts: RwLock<HashMap<String, Arc<RwLock<HostSummary>>>>,
}

impl HostCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new host. If `hostname` is already present, its live
    /// lease/allocation state is left untouched and capacity is not
    /// replaced; registration is for hosts newly observed by the agent
    /// adapter.
    pub async fn register_host(&self, hostname: impl Into<String>, capacity: Resources) {
        let hostname = hostname.into();
        let mut hosts = self.hosts.write().await;
        hosts
            .entry(hostname.clone())
            .or_insert_with(|| Arc::new(RwLock::new(HostSummary::new(hostname, capacity))));
    }

    /// A host going away removes its summary only after draining. Callers
    /// are expected to ensure `pod_to_resources` is empty before calling
    /// this (draining is an agent-adapter concern, out of scope here).
    pub async fn remove_host(&self, hostname: &str) -> Result<()> {
        let mut hosts = self.hosts.write().await;
        match hosts.get(hostname) {
            None => Err(PelotonError::NotFound(format!("host {hostname}"))),
            Some(handle) => {
                if !handle.read().await.pod_to_resources.is_empty() {
                    return Err(PelotonError::FailedPrecondition(format!(
                        "host {hostname} still has pods bound; drain before removing"
                    )));
                }
                hosts.remove(hostname);
                Ok(())
            }
        }
    }

    async fn handle(&self, hostname: &str) -> Result<Arc<RwLock<HostSummary>>> {
        self.hosts
            .read()
            .await
            .get(hostname)
            .cloned()
            .ok_or_else(|| PelotonError::NotFound(format!("host {hostname}")))
    }

    pub async fn snapshot(&self, hostname: &str) -> Result<HostSummary> {
        let handle = self.handle(hostname).await?;
        Ok(handle.read().await.clone())
    }

    pub async fn all_hostnames(&self) -> Vec<String> {
        self.hosts.read().await.keys().cloned().collect()
    }

    pub async fn try_match(&self, hostname: &str, filter: &HostFilter) -> Result<(MatchResult, Option<Uuid>)> {
        let handle = self.handle(hostname).await?;
        let mut host = handle.write().await;
        let result = host.try_match(filter);
        let lease_id = if result == MatchResult::Match { host.lease_id } else { None };
        Ok((result, lease_id))
    }

    pub async fn complete_lease(
        &self,
        hostname: &str,
        lease_id: Uuid,
        pods: HashMap<PodId, Resources>,
    ) -> Result<()> {
        let handle = self.handle(hostname).await?;
        handle.write().await.complete_lease(lease_id, pods)
    }

    pub async fn terminate_lease(&self, hostname: &str) -> Result<()> {
        let handle = self.handle(hostname).await?;
        handle.write().await.terminate_lease()
    }

    pub async fn cas_status(&self, hostname: &str, old: HostStatus, new: HostStatus) -> Result<()> {
        let handle = self.handle(hostname).await?;
        handle.write().await.cas_status(old, new)
    }

    pub async fn release_pod_resources(&self, hostname: &str, pod_id: &str) -> Result<()> {
        let handle = self.handle(hostname).await?;
        handle.write().await.release_pod_resources(pod_id);
        Ok(())
    }

    pub async fn hold(&self, hostname: &str, pod_ids: Vec<PodId>, expires_at: DateTime<Utc>) -> Result<()> {
        let handle = self.handle(hostname).await?;
        handle.write().await.hold(pod_ids, expires_at)
    }

    /// Releases one held pod id; once no hold remains the host reverts to
    /// `Ready`. This is the inverse of `hold`, used by e.g. maintenance-complete.
    pub async fn release_hold(&self, hostname: &str, pod_id: &str) -> Result<()> {
        let handle = self.handle(hostname).await?;
        handle.write().await.release_hold(pod_id);
        Ok(())
    }

    /// Sweeps every host for holds past their TTL. Invoked by a background
    /// tick, not a direct RPC handler.
    pub async fn expire_holds(&self, now: DateTime<Utc>) -> HashMap<String, Vec<PodId>> {
        let hosts = self.hosts.read().await;
        let mut expired = HashMap::new();
        for (hostname, handle) in hosts.iter() {
            let pods = handle.write().await.expire_holds(now);
            if !pods.is_empty() {
                expired.insert(hostname.clone(), pods);
            }
        }
        expired
    }
}
