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

//! The host ranker: a stateless contract over "given an index of
//! host summaries (and maybe a remote advisor), produce an ordering". The
//! ranker rebuilds its ordering on `refresh_ranking` and serves the most
//! recent snapshot from `get_ranked_host_list`; callers must tolerate that
//! snapshot being stale by one refresh interval.

use crate::host::cache::HostCache;
use async_trait::async_trait;
use peloton_core::error::Result;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// An external collaborator that scores hosts in `[0, 100]`, lower being
/// less loaded. Hosts it doesn't mention are treated as maximally loaded.
#[async_trait]
pub trait LoadAdvisor: Send + Sync {
    async fn score(&self, hostnames: &[String]) -> HashMap<String, f64>;
}

#[async_trait]
pub trait HostRanker: Send + Sync {
    async fn refresh_ranking(&self, cache: &HostCache) -> Result<()>;
    async fn get_ranked_host_list(&self) -> Vec<String>;
}

/// Orders hosts ascending by an external advisor's load score. Hosts
/// absent from the advisor's response sort to the tail, as if maximally
/// loaded; ties break by hostname.
pub struct LoadAwareRanker {
    advisor: Arc<dyn LoadAdvisor>,
    ranking: RwLock<Vec<String>>,
}

impl LoadAwareRanker {
    pub fn new(advisor: Arc<dyn LoadAdvisor>) -> Self {
        Self {
            advisor,
            ranking: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl HostRanker for LoadAwareRanker {
    async fn refresh_ranking(&self, cache: &HostCache) -> Result<()> {
        let hostnames = cache.all_hostnames().await;
        let scores = self.advisor.score(&hostnames).await;
        let mut ordered = hostnames;
        ordered.sort_by(|a, b| {
            let sa = scores.get(a).copied().unwrap_or(f64::MAX);
            let sb = scores.get(b).copied().unwrap_or(f64::MAX);
            sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.cmp(b))
        });
        *self.ranking.write().await = ordered;
        Ok(())
    }

    async fn get_ranked_host_list(&self) -> Vec<String> {
        self.ranking.read().await.clone()
    }
}

/// First-fit-decreasing by free capacity: hosts with the least free CPU go
/// first, packing existing hosts tight before spreading onto idle ones.
pub struct BinPackingRanker {
    ranking: RwLock<Vec<String>>,
}

impl BinPackingRanker {
    pub fn new() -> Self {
        Self { ranking: RwLock::new(Vec::new()) }
    }
}

impl Default for BinPackingRanker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostRanker for BinPackingRanker {
    async fn refresh_ranking(&self, cache: &HostCache) -> Result<()> {
        let hostnames = cache.all_hostnames().await;
        let mut scored = Vec::with_capacity(hostnames.len());
        for hostname in hostnames {
            let snap = cache.snapshot(&hostname).await?;
            scored.push((hostname, snap.available().cpu));
        }
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
        *self.ranking.write().await = scored.into_iter().map(|(h, _)| h).collect();
        Ok(())
    }

    async fn get_ranked_host_list(&self) -> Vec<String> {
        self.ranking.read().await.clone()
    }
}

/// Orders hosts ascending by current allocation (least-loaded first).
pub struct LeastAllocatedRanker {
    ranking: RwLock<Vec<String>>,
}

impl LeastAllocatedRanker {
    pub fn new() -> Self {
        Self { ranking: RwLock::new(Vec::new()) }
    }
}

impl Default for LeastAllocatedRanker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostRanker for LeastAllocatedRanker {
    async fn refresh_ranking(&self, cache: &HostCache) -> Result<()> {
        let hostnames = cache.all_hostnames().await;
        let mut scored = Vec::with_capacity(hostnames.len());
        for hostname in hostnames {
            let snap = cache.snapshot(&hostname).await?;
            scored.push((hostname, snap.allocated().cpu));
        }
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
        *self.ranking.write().await = scored.into_iter().map(|(h, _)| h).collect();
        Ok(())
    }

    async fn get_ranked_host_list(&self) -> Vec<String> {
        self.ranking.read().await.clone()
    }
}

/// Shuffled ordering, used when load signal isn't worth collecting.
pub struct RandomRanker {
    ranking: RwLock<Vec<String>>,
}

impl RandomRanker {
    pub fn new() -> Self {
        Self { ranking: RwLock::new(Vec::new()) }
    }
}

impl Default for RandomRanker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostRanker for RandomRanker {
    async fn refresh_ranking(&self, cache: &HostCache) -> Result<()> {
        let mut hostnames = cache.all_hostnames().await;
        hostnames.shuffle(&mut rand::thread_rng());
        *self.ranking.write().await = hostnames;
        Ok(())
    }

    async fn get_ranked_host_list(&self) -> Vec<String> {
        self.ranking.read().await.clone()
    }
}
