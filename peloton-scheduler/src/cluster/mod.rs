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

//! `Scheduler`: the single wiring point for the resource-pool tree, host
//! cache, ranker, goal-state engine and event stream, bundling everything
//! every other component borrows from behind one handle. Ownership here is
//! process-wide and exclusive to whichever process holds leadership.

use crate::event::EventStream;
use crate::goalstate::GoalStateEngine;
use crate::host::{HostCache, HostFilter, HostSummary, MatchResult};
use crate::ranker::HostRanker;
use crate::respool::{RespoolDescriptor, ResourceConfig, ResourcePoolTree, SchedulingPolicy};
use async_trait::async_trait;
use peloton_core::config::PelotonConfig;
use peloton_core::error::{PelotonError, Result};
use peloton_core::resources::Resources;
use peloton_core::storage::{Predicate, Store};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Marker proving the caller holds cluster leadership. A real deployment
/// obtains one from a leader-election collaborator (out of scope for this
/// build); this is the minimal seam the single-leader requirement needs so
/// mutating methods have somewhere to assert it.
pub trait LeaderGuard: Send + Sync {
    fn is_leader(&self) -> bool;
}

/// Always asserts leadership; the right choice for a single scheduler
/// process with no peers, which is what the CLI and tests run against.
pub struct LocalLeader;

impl LeaderGuard for LocalLeader {
    fn is_leader(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateState {
    Initialized,
    RollingForward,
    Paused,
    RolledBack,
    Succeeded,
    Aborted,
}

impl UpdateState {
    fn is_terminal(self) -> bool {
        matches!(self, UpdateState::Succeeded | UpdateState::Aborted | UpdateState::RolledBack)
    }

    fn is_pausable(self) -> bool {
        matches!(self, UpdateState::RollingForward)
    }

    fn is_resumable(self) -> bool {
        matches!(self, UpdateState::Paused)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortMode {
    Soft,
    Hard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub update_id: String,
    pub job_id: String,
    pub state: UpdateState,
    pub config_version: u64,
    pub goal_config_version: u64,
}

fn encode_update(record: &UpdateRecord) -> Result<Vec<u8>> {
    serde_yaml::to_string(record)
        .map(|s| s.into_bytes())
        .map_err(|e| PelotonError::Internal(format!("failed to encode update record: {e}")))
}

fn decode_update(bytes: &[u8]) -> Result<UpdateRecord> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| PelotonError::Internal(format!("update record is not valid utf8: {e}")))?;
    serde_yaml::from_str(text).map_err(|e| PelotonError::Internal(format!("failed to decode update record: {e}")))
}

fn update_key(update_id: &str) -> String {
    format!("update/{update_id}")
}

/// Resource pool administration: Create, Get, Delete (leaf-only), Update
/// (with optional force), LookupByPath, Query.
#[async_trait]
pub trait ResourcePoolService: Send + Sync {
    async fn create_pool(
        &self,
        id: String,
        name: String,
        parent_id: &str,
        resources: ResourceConfig,
        policy: SchedulingPolicy,
    ) -> Result<String>;
    async fn get_pool(&self, id: &str) -> Result<RespoolDescriptor>;
    async fn delete_pool(&self, id: &str) -> Result<()>;
    async fn update_pool(&self, id: &str, resources: ResourceConfig, force: bool) -> Result<()>;
    async fn lookup_pool_by_path(&self, path: &str) -> Result<String>;
    async fn query_pools(&self) -> Result<Vec<RespoolDescriptor>>;
}

/// Job config-update administration: Create (single active update per job),
/// Get (statusOnly), List, Pause, Resume, Rollback, Abort(soft|hard), GetCache.
#[async_trait]
pub trait UpdateService: Send + Sync {
    async fn create_update(&self, job_id: &str, goal_config_version: u64) -> Result<String>;
    async fn get_update(&self, update_id: &str, status_only: bool) -> Result<UpdateRecord>;
    async fn list_updates(&self, job_id: &str) -> Result<Vec<UpdateRecord>>;
    async fn pause_update(&self, update_id: &str) -> Result<()>;
    async fn resume_update(&self, update_id: &str) -> Result<()>;
    async fn rollback_update(&self, update_id: &str) -> Result<()>;
    async fn abort_update(&self, update_id: &str, mode: AbortMode) -> Result<()>;
    async fn get_update_cache(&self) -> Result<Vec<UpdateRecord>>;
}

/// Host introspection: summaries, pools-of-hosts, labels.
#[async_trait]
pub trait HostService: Send + Sync {
    async fn host_summaries(&self) -> Result<Vec<HostSummary>>;
    /// Maps each host to the resource-pool id recorded in its `respool`
    /// label, if any (a label is the simplest attachment mechanism that fits
    /// the existing `HostSummary.labels` map rather than adding a new field).
    async fn pools_of_hosts(&self) -> Result<HashMap<String, Option<String>>>;
    async fn host_labels(&self, hostname: &str) -> Result<HashMap<String, String>>;
}

pub struct Scheduler {
    pub config: PelotonConfig,
    pub respool_tree: ResourcePoolTree,
    pub host_cache: HostCache,
    pub ranker: Arc<dyn HostRanker>,
    pub goal_state: GoalStateEngine,
    pub events: EventStream,
    pub store: Arc<dyn Store>,
    pub leader: Arc<dyn LeaderGuard>,
}

impl Scheduler {
    pub fn new(
        config: PelotonConfig,
        cluster_capacity: Resources,
        ranker: Arc<dyn HostRanker>,
        store: Arc<dyn Store>,
        leader: Arc<dyn LeaderGuard>,
    ) -> Self {
        let goal_state = GoalStateEngine::new(config.goal_state.clone());
        Self {
            respool_tree: ResourcePoolTree::new(config.scheduler_name.clone(), cluster_capacity),
            host_cache: HostCache::new(),
            ranker,
            goal_state,
            events: EventStream::new(),
            store,
            config,
            leader,
        }
    }

    fn require_leader(&self) -> Result<()> {
        if self.leader.is_leader() {
            Ok(())
        } else {
            Err(PelotonError::Unavailable("this process is not the cluster leader".to_string()))
        }
    }

    /// Placement cycle for one gang-sized filter request: consults the
    /// ranker's current ordering, then walks it trying `HostCache::try_match`
    /// until one succeeds. Does not itself dequeue from the resource-pool
    /// tree; callers combine the two.
    pub async fn find_host(&self, filter: &HostFilter) -> Result<(String, Uuid)> {
        self.require_leader()?;
        for hostname in self.ranker.get_ranked_host_list().await {
            match self.host_cache.try_match(&hostname, filter).await {
                Ok((MatchResult::Match, Some(lease))) => return Ok((hostname, lease)),
                Ok(_) => continue,
                Err(_) => continue,
            }
        }
        Err(PelotonError::Unavailable("no host satisfies the filter".to_string()))
    }
}

#[async_trait]
impl ResourcePoolService for Scheduler {
    async fn create_pool(
        &self,
        id: String,
        name: String,
        parent_id: &str,
        resources: ResourceConfig,
        policy: SchedulingPolicy,
    ) -> Result<String> {
        self.require_leader()?;
        self.respool_tree.new_respool(id, name, parent_id, resources, policy).await
    }

    async fn get_pool(&self, id: &str) -> Result<RespoolDescriptor> {
        self.respool_tree.describe(id).await
    }

    async fn delete_pool(&self, id: &str) -> Result<()> {
        self.require_leader()?;
        self.respool_tree.delete_respool(id).await
    }

    async fn update_pool(&self, id: &str, resources: ResourceConfig, force: bool) -> Result<()> {
        self.require_leader()?;
        self.respool_tree.update_respool_config(id, resources, force).await
    }

    async fn lookup_pool_by_path(&self, path: &str) -> Result<String> {
        self.respool_tree.lookup_by_path(path).await
    }

    async fn query_pools(&self) -> Result<Vec<RespoolDescriptor>> {
        let mut out = Vec::new();
        for id in self.respool_tree.all_ids().await {
            out.push(self.respool_tree.describe(&id).await?);
        }
        Ok(out)
    }
}

#[async_trait]
impl UpdateService for Scheduler {
    async fn create_update(&self, job_id: &str, goal_config_version: u64) -> Result<String> {
        self.require_leader()?;
        if self.list_updates(job_id).await?.iter().any(|u| !u.state.is_terminal()) {
            return Err(PelotonError::AlreadyExists(format!(
                "job {job_id} already has an active update"
            )));
        }
        let update_id = Uuid::new_v4().to_string();
        let record = UpdateRecord {
            update_id: update_id.clone(),
            job_id: job_id.to_string(),
            state: UpdateState::Initialized,
            config_version: 0,
            goal_config_version,
        };
        self.store.create(&update_key(&update_id), encode_update(&record)?, true).await?;
        Ok(update_id)
    }

    async fn get_update(&self, update_id: &str, status_only: bool) -> Result<UpdateRecord> {
        let bytes = self
            .store
            .get(&update_key(update_id))
            .await?
            .ok_or_else(|| PelotonError::NotFound(format!("update {update_id}")))?;
        let mut record = decode_update(&bytes)?;
        if status_only {
            record.config_version = 0;
            record.goal_config_version = 0;
        }
        Ok(record)
    }

    async fn list_updates(&self, job_id: &str) -> Result<Vec<UpdateRecord>> {
        let job_id = job_id.to_string();
        let predicate: Predicate = Arc::new(move |key, value| {
            key.starts_with("update/") && decode_update(value).map(|r| r.job_id == job_id).unwrap_or(false)
        });
        let rows = self.store.query(predicate).await?;
        rows.into_iter().map(|(_, v)| decode_update(&v)).collect()
    }

    async fn pause_update(&self, update_id: &str) -> Result<()> {
        self.require_leader()?;
        let mut record = self.get_update(update_id, false).await?;
        if !record.state.is_pausable() {
            return Err(PelotonError::Unavailable(format!(
                "update {update_id} is in state {:?}, not pausable",
                record.state
            )));
        }
        record.state = UpdateState::Paused;
        self.store.update(&update_key(update_id), encode_update(&record)?).await
    }

    async fn resume_update(&self, update_id: &str) -> Result<()> {
        self.require_leader()?;
        let mut record = self.get_update(update_id, false).await?;
        if !record.state.is_resumable() {
            return Err(PelotonError::Unavailable(format!(
                "update {update_id} is in state {:?}, not resumable",
                record.state
            )));
        }
        record.state = UpdateState::RollingForward;
        self.store.update(&update_key(update_id), encode_update(&record)?).await
    }

    async fn rollback_update(&self, update_id: &str) -> Result<()> {
        self.require_leader()?;
        let mut record = self.get_update(update_id, false).await?;
        if record.state.is_terminal() {
            return Err(PelotonError::Unavailable(format!(
                "update {update_id} already in terminal state {:?}",
                record.state
            )));
        }
        record.state = UpdateState::RolledBack;
        self.store.update(&update_key(update_id), encode_update(&record)?).await
    }

    async fn abort_update(&self, update_id: &str, mode: AbortMode) -> Result<()> {
        self.require_leader()?;
        let mut record = self.get_update(update_id, false).await?;
        if record.state.is_terminal() && mode == AbortMode::Soft {
            return Err(PelotonError::Unavailable(format!(
                "update {update_id} already in terminal state {:?}",
                record.state
            )));
        }
        record.state = UpdateState::Aborted;
        self.store.update(&update_key(update_id), encode_update(&record)?).await
    }

    async fn get_update_cache(&self) -> Result<Vec<UpdateRecord>> {
        let predicate: Predicate = Arc::new(|key, _value| key.starts_with("update/"));
        let rows = self.store.query(predicate).await?;
        rows.into_iter().map(|(_, v)| decode_update(&v)).collect()
    }
}

#[async_trait]
impl HostService for Scheduler {
    async fn host_summaries(&self) -> Result<Vec<HostSummary>> {
        let mut out = Vec::new();
        for hostname in self.host_cache.all_hostnames().await {
            out.push(self.host_cache.snapshot(&hostname).await?);
        }
        Ok(out)
    }

    async fn pools_of_hosts(&self) -> Result<HashMap<String, Option<String>>> {
        let mut out = HashMap::new();
        for summary in self.host_summaries().await? {
            out.insert(summary.hostname.clone(), summary.labels.get("respool").cloned());
        }
        Ok(out)
    }

    async fn host_labels(&self, hostname: &str) -> Result<HashMap<String, String>> {
        Ok(self.host_cache.snapshot(hostname).await?.labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranker::LeastAllocatedRanker;
    use crate::respool::config::KindConfig;
    use peloton_core::storage::MemStore;

    fn resources(r: f64) -> ResourceConfig {
        ResourceConfig {
            cpu: KindConfig { reservation: r, limit: r, share: 1.0 },
            mem: KindConfig { reservation: r * 100.0, limit: r * 100.0, share: 1.0 },
            disk: KindConfig { reservation: r, limit: r, share: 1.0 },
            gpu: KindConfig { reservation: 0.0, limit: 0.0, share: 0.0 },
        }
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(
            PelotonConfig::default(),
            Resources::new(100.0, 10000.0, 1000.0, 0.0),
            Arc::new(LeastAllocatedRanker::new()),
            Arc::new(MemStore::new()),
            Arc::new(LocalLeader),
        )
    }

    #[tokio::test]
    async fn resource_pool_service_roundtrip() {
        let scheduler = scheduler();
        let root = scheduler.respool_tree.root_id();
        scheduler
            .create_pool("team-a".to_string(), "team-a".to_string(), &root, resources(10.0), SchedulingPolicy::PriorityFifo)
            .await
            .unwrap();

        let descriptor = scheduler.get_pool("team-a").await.unwrap();
        assert_eq!(descriptor.name, "team-a");

        assert_eq!(scheduler.lookup_pool_by_path(&descriptor.path).await.unwrap(), "team-a");
        assert_eq!(scheduler.query_pools().await.unwrap().len(), 2); // root + team-a

        scheduler.delete_pool("team-a").await.unwrap();
        assert!(scheduler.get_pool("team-a").await.is_err());
    }

    #[tokio::test]
    async fn update_lifecycle_enforces_single_active_per_job() {
        let scheduler = scheduler();
        let update_id = scheduler.create_update("job-1", 2).await.unwrap();

        let err = scheduler.create_update("job-1", 3).await.unwrap_err();
        assert!(matches!(err, PelotonError::AlreadyExists(_)));

        let err = scheduler.pause_update(&update_id).await.unwrap_err();
        assert!(matches!(err, PelotonError::Unavailable(_))); // still Initialized, not RollingForward

        let mut record = scheduler.get_update(&update_id, false).await.unwrap();
        record.state = UpdateState::RollingForward;
        scheduler
            .store
            .update(&update_key(&update_id), encode_update(&record).unwrap())
            .await
            .unwrap();

        scheduler.pause_update(&update_id).await.unwrap();
        assert_eq!(scheduler.get_update(&update_id, false).await.unwrap().state, UpdateState::Paused);

        scheduler.resume_update(&update_id).await.unwrap();
        assert_eq!(scheduler.get_update(&update_id, false).await.unwrap().state, UpdateState::RollingForward);

        scheduler.abort_update(&update_id, AbortMode::Hard).await.unwrap();
        assert_eq!(scheduler.get_update(&update_id, false).await.unwrap().state, UpdateState::Aborted);

        // Terminal now, so a new update for the same job is allowed.
        scheduler.create_update("job-1", 4).await.unwrap();
    }

    #[tokio::test]
    async fn host_service_reports_summaries_and_pool_labels() {
        let scheduler = scheduler();
        scheduler.host_cache.register_host("h1", Resources::new(4.0, 0.0, 0.0, 0.0)).await;
        let summaries = scheduler.host_summaries().await.unwrap();
        assert_eq!(summaries.len(), 1);

        let pools = scheduler.pools_of_hosts().await.unwrap();
        assert_eq!(pools.get("h1"), Some(&None));
    }

    #[tokio::test]
    async fn find_host_uses_ranker_order() {
        let scheduler = scheduler();
        scheduler.host_cache.register_host("h1", Resources::new(4.0, 0.0, 0.0, 0.0)).await;
        scheduler.ranker.refresh_ranking(&scheduler.host_cache).await.unwrap();

        let filter = HostFilter::new(Resources::new(1.0, 0.0, 0.0, 0.0));
        let (hostname, _lease) = scheduler.find_host(&filter).await.unwrap();
        assert_eq!(hostname, "h1");
    }
}
