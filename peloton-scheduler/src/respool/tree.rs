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

//! The resource-pool tree. Represented as an arena of nodes rather than
//! `Rc`/`RefCell` parent-child cycles: a `Vec<RespoolNode>` with parent/child
//! indices, traversed by index. Each node's mutable state lives behind its
//! own `RwLock`; multi-node operations (entitlement recomputation, admission
//! checks that walk ancestors) always acquire those locks in pre-order, root
//! first and then down towards the leaf, so no two operations can ever wait
//! on each other's locks in opposite order.

use crate::gang::Gang;
use crate::queue::GangQueue;
use crate::respool::config::{ResourceConfig, SchedulingPolicy};
use crate::respool::entitlement::{self, ChildDemand};
use peloton_core::error::{PelotonError, Result};
use peloton_core::resources::Resources;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub type RespoolId = String;

struct RespoolNodeState {
    policy: SchedulingPolicy,
    resources: ResourceConfig,
    entitlement: Resources,
    allocation: Resources,
    pending: GangQueue,
}

struct RespoolNode {
    id: RespoolId,
    name: String,
    parent: Option<usize>,
    children: Vec<usize>,
    /// Arena slots are never compacted (it would invalidate every other
    /// node's indices), so deletion just tombstones the slot.
    removed: bool,
    state: RwLock<RespoolNodeState>,
}

/// A point-in-time view of one pool, for the resource-pool service's
/// Get/Query/LookupByPath surface.
#[derive(Debug, Clone)]
pub struct RespoolDescriptor {
    pub id: RespoolId,
    pub name: String,
    pub path: String,
    pub parent_id: Option<RespoolId>,
    pub children: Vec<RespoolId>,
    pub policy: SchedulingPolicy,
    pub resources: ResourceConfig,
    pub entitlement: Resources,
    pub allocation: Resources,
}

/// An arena-backed rooted tree of resource pools. The root is created with
/// `ResourcePoolTree::new` and always occupies index 0.
pub struct ResourcePoolTree {
    nodes: RwLock<Vec<RespoolNode>>,
}

impl ResourcePoolTree {
    /// Creates a tree with only a root node, entitled to the full cluster
    /// capacity. The root never holds gangs directly (interior nodes only
    /// aggregate policy); its `resources` config bounds every descendant.
    pub fn new(root_name: impl Into<String>, capacity: Resources) -> Self {
        let root_resources = ResourceConfig {
            cpu: crate::respool::config::KindConfig { reservation: capacity.cpu, limit: capacity.cpu, share: 1.0 },
            mem: crate::respool::config::KindConfig { reservation: capacity.mem, limit: capacity.mem, share: 1.0 },
            disk: crate::respool::config::KindConfig { reservation: capacity.disk, limit: capacity.disk, share: 1.0 },
            gpu: crate::respool::config::KindConfig { reservation: capacity.gpu, limit: capacity.gpu, share: 1.0 },
        };
        let root = RespoolNode {
            id: "root".to_string(),
            name: root_name.into(),
            parent: None,
            children: Vec::new(),
            removed: false,
            state: RwLock::new(RespoolNodeState {
                policy: SchedulingPolicy::PriorityFifo,
                resources: root_resources,
                entitlement: capacity,
                allocation: Resources::ZERO,
                pending: GangQueue::new(),
            }),
        };
        Self {
            nodes: RwLock::new(vec![root]),
        }
    }

    pub fn root_id(&self) -> RespoolId {
        "root".to_string()
    }

    async fn index_of(&self, nodes: &[RespoolNode], id: &str) -> Result<usize> {
        nodes
            .iter()
            .position(|n| n.id == id && !n.removed)
            .ok_or_else(|| PelotonError::NotFound(format!("resource pool {id}")))
    }

    /// Validates policy and resource config, then attaches a new leaf under
    /// `parent_id`. Fails if the parent doesn't exist, the policy is
    /// unknown, any resource kind is missing/invalid, or the new pool's
    /// reservation would push the parent's children reservation sum above
    /// the parent's own reservation.
    pub async fn new_respool(
        &self,
        id: RespoolId,
        name: impl Into<String>,
        parent_id: &str,
        resources: ResourceConfig,
        policy: SchedulingPolicy,
    ) -> Result<RespoolId> {
        resources.validate()?;

        let mut nodes = self.nodes.write().await;
        let parent_idx = self.index_of(&nodes, parent_id).await?;

        if nodes.iter().any(|n| n.id == id) {
            return Err(PelotonError::AlreadyExists(format!("resource pool {id}")));
        }

        {
            let parent_state = nodes[parent_idx].state.read().await;
            let mut sibling_reservation = resources.reservation_vector();
            for &child_idx in &nodes[parent_idx].children {
                let child_state = nodes[child_idx].state.read().await;
                sibling_reservation = sibling_reservation.add(&child_state.resources.reservation_vector());
            }
            if !parent_state.resources.reservation_vector().contains(&sibling_reservation) {
                return Err(PelotonError::InvalidArgument(format!(
                    "children reservation would exceed parent {parent_id} reservation"
                )));
            }
        }

        let new_idx = nodes.len();
        nodes.push(RespoolNode {
            id: id.clone(),
            name: name.into(),
            parent: Some(parent_idx),
            children: Vec::new(),
            removed: false,
            state: RwLock::new(RespoolNodeState {
                policy,
                resources,
                entitlement: Resources::ZERO,
                allocation: Resources::ZERO,
                pending: GangQueue::new(),
            }),
        });
        nodes[parent_idx].children.push(new_idx);
        Ok(id)
    }

    pub async fn is_root(&self, id: &str) -> Result<bool> {
        let nodes = self.nodes.read().await;
        let idx = self.index_of(&nodes, id).await?;
        Ok(nodes[idx].parent.is_none())
    }

    pub async fn is_leaf(&self, id: &str) -> Result<bool> {
        let nodes = self.nodes.read().await;
        let idx = self.index_of(&nodes, id).await?;
        Ok(nodes[idx].children.is_empty())
    }

    pub async fn children(&self, id: &str) -> Result<Vec<RespoolId>> {
        let nodes = self.nodes.read().await;
        let idx = self.index_of(&nodes, id).await?;
        Ok(nodes[idx]
            .children
            .iter()
            .filter(|&&c| !nodes[c].removed)
            .map(|&c| nodes[c].id.clone())
            .collect())
    }

    /// Every live (non-deleted) pool id in the tree, in arena order.
    pub async fn all_ids(&self) -> Vec<RespoolId> {
        self.nodes
            .read()
            .await
            .iter()
            .filter(|n| !n.removed)
            .map(|n| n.id.clone())
            .collect()
    }

    /// Resolves a `/`-separated path of pool names (as returned by
    /// `get_path`) back to an id.
    pub async fn lookup_by_path(&self, path: &str) -> Result<RespoolId> {
        let nodes = self.nodes.read().await;
        let mut idx = 0usize; // root
        let mut segments = path.trim_start_matches('/').split('/');
        let root_name = segments.next().unwrap_or_default();
        if nodes[idx].name != root_name {
            return Err(PelotonError::NotFound(format!("resource pool path {path}")));
        }
        for segment in segments {
            if segment.is_empty() {
                continue;
            }
            let next = nodes[idx]
                .children
                .iter()
                .find(|&&c| !nodes[c].removed && nodes[c].name == segment)
                .copied();
            match next {
                Some(c) => idx = c,
                None => return Err(PelotonError::NotFound(format!("resource pool path {path}"))),
            }
        }
        Ok(nodes[idx].id.clone())
    }

    /// A full point-in-time snapshot of one pool, for `Get`/`Query`.
    pub async fn describe(&self, id: &str) -> Result<RespoolDescriptor> {
        let nodes = self.nodes.read().await;
        let idx = self.index_of(&nodes, id).await?;
        let (policy, resources, entitlement, allocation) = {
            let state = nodes[idx].state.read().await;
            (state.policy, state.resources, state.entitlement, state.allocation)
        };
        let descriptor = RespoolDescriptor {
            id: nodes[idx].id.clone(),
            name: nodes[idx].name.clone(),
            path: String::new(),
            parent_id: nodes[idx].parent.map(|p| nodes[p].id.clone()),
            children: nodes[idx]
                .children
                .iter()
                .filter(|&&c| !nodes[c].removed)
                .map(|&c| nodes[c].id.clone())
                .collect(),
            policy,
            resources,
            entitlement,
            allocation,
        };
        drop(nodes);
        let path = self.get_path(id).await?;
        Ok(RespoolDescriptor { path, ..descriptor })
    }

    /// Removes a leaf pool. Fails if it still has live children, pending
    /// gangs, or non-zero allocation.
    pub async fn delete_respool(&self, id: &str) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        let idx = self.index_of(&nodes, id).await?;
        if nodes[idx].children.iter().any(|&c| !nodes[c].removed) {
            return Err(PelotonError::FailedPrecondition(format!(
                "resource pool {id} has children; delete them first"
            )));
        }
        {
            let state = nodes[idx].state.read().await;
            if !state.allocation.approx_equal(&Resources::ZERO) || !state.pending.is_empty() {
                return Err(PelotonError::FailedPrecondition(format!(
                    "resource pool {id} is not empty"
                )));
            }
        }
        if let Some(parent_idx) = nodes[idx].parent {
            nodes[parent_idx].children.retain(|&c| c != idx);
        }
        nodes[idx].removed = true;
        info!(pool = %id, "deleted resource pool");
        Ok(())
    }

    /// Replaces a pool's resource config. Without `force`, rejects a change
    /// that would push the new reservation below current allocation, or
    /// push the children's combined reservation above the new parent
    /// reservation; `force` skips both checks.
    pub async fn update_respool_config(&self, id: &str, resources: ResourceConfig, force: bool) -> Result<()> {
        resources.validate()?;
        let nodes = self.nodes.read().await;
        let idx = self.index_of(&nodes, id).await?;

        if !force {
            let state = nodes[idx].state.read().await;
            if !resources.reservation_vector().contains(&state.allocation) {
                return Err(PelotonError::InvalidArgument(format!(
                    "new reservation for {id} is below current allocation; pass force to override"
                )));
            }
            drop(state);

            let mut children_reservation = Resources::ZERO;
            for &child_idx in &nodes[idx].children {
                if nodes[child_idx].removed {
                    continue;
                }
                let child_state = nodes[child_idx].state.read().await;
                children_reservation = children_reservation.add(&child_state.resources.reservation_vector());
            }
            if !resources.reservation_vector().contains(&children_reservation) {
                return Err(PelotonError::InvalidArgument(format!(
                    "new reservation for {id} is below its children's combined reservation"
                )));
            }
        }

        nodes[idx].state.write().await.resources = resources;
        Ok(())
    }

    pub async fn get_path(&self, id: &str) -> Result<String> {
        let nodes = self.nodes.read().await;
        let mut idx = self.index_of(&nodes, id).await?;
        let mut segments = vec![nodes[idx].name.clone()];
        while let Some(parent_idx) = nodes[idx].parent {
            segments.push(nodes[parent_idx].name.clone());
            idx = parent_idx;
        }
        segments.reverse();
        Ok(format!("/{}", segments.join("/")))
    }

    /// Recomputes entitlement for the whole tree from `capacity` at the
    /// root, walking pre-order (a node's entitlement is always finalized
    /// before its children's is computed).
    pub async fn entitlement_pass(&self, capacity: Resources) -> Result<()> {
        let nodes = self.nodes.read().await;
        {
            let mut root_state = nodes[0].state.write().await;
            root_state.entitlement = capacity;
        }
        self.entitlement_pass_from(&nodes, 0).await
    }

    async fn entitlement_pass_from(&self, nodes: &[RespoolNode], parent_idx: usize) -> Result<()> {
        let child_indices = nodes[parent_idx].children.clone();
        if child_indices.is_empty() {
            return Ok(());
        }

        let parent_entitlement = nodes[parent_idx].state.read().await.entitlement;

        let mut demands = Vec::with_capacity(child_indices.len());
        for &idx in &child_indices {
            let state = nodes[idx].state.read().await;
            let limit = state.resources.limit_vector();
            let raw_demand = state.allocation.add(&state.pending.metrics_total_resources());
            let capped = Resources::new(
                raw_demand.cpu.min(limit.cpu),
                raw_demand.mem.min(limit.mem),
                raw_demand.disk.min(limit.disk),
                raw_demand.gpu.min(limit.gpu),
            );
            demands.push(ChildDemand {
                reservation: kind_array(&state.resources.reservation_vector()),
                limit: kind_array(&limit),
                share: state.resources.share_vector(),
                demand: kind_array(&capped),
            });
        }

        let entitlements = entitlement::distribute(&parent_entitlement, &demands);

        for (i, &idx) in child_indices.iter().enumerate() {
            let mut state = nodes[idx].state.write().await;
            state.entitlement = entitlements[i];
        }

        for &idx in &child_indices {
            Box::pin(self.entitlement_pass_from(nodes, idx)).await?;
        }
        Ok(())
    }

    /// Builds the root-to-leaf chain of indices for `id`, used so lock
    /// acquisition can walk top-down.
    async fn ancestor_chain(&self, nodes: &[RespoolNode], id: &str) -> Result<Vec<usize>> {
        let mut idx = self.index_of(nodes, id).await?;
        let mut chain = vec![idx];
        while let Some(parent_idx) = nodes[idx].parent {
            chain.push(parent_idx);
            idx = parent_idx;
        }
        chain.reverse();
        Ok(chain)
    }

    pub async fn enqueue_gang(&self, leaf_id: &str, gang: Gang) -> Result<()> {
        if gang.is_empty() {
            return Err(PelotonError::InvalidArgument("cannot enqueue an empty gang".to_string()));
        }
        let nodes = self.nodes.read().await;
        let idx = self.index_of(&nodes, leaf_id).await?;
        if !nodes[idx].children.is_empty() {
            return Err(PelotonError::InvalidArgument(format!(
                "{leaf_id} is not a leaf; only leaves may hold gangs"
            )));
        }
        let mut state = nodes[idx].state.write().await;
        state.pending.enqueue(gang)
    }

    /// Dequeues up to `limit` gangs from the leaf's pending queue,
    /// head-of-line blocking on the first gang that doesn't fit the leaf's
    /// (and its ancestors') entitlement. A fitting gang's resources are
    /// applied to the leaf's and every ancestor's allocation atomically
    /// with the dequeue.
    pub async fn dequeue_gang_list(&self, leaf_id: &str, limit: usize) -> Result<Vec<Gang>> {
        if limit == 0 {
            return Err(PelotonError::InvalidArgument("DequeueGangList(0) is invalid".to_string()));
        }
        let nodes = self.nodes.read().await;
        let idx = self.index_of(&nodes, leaf_id).await?;
        if !nodes[idx].children.is_empty() {
            return Err(PelotonError::InvalidArgument(format!("{leaf_id} is not a leaf")));
        }
        let chain = self.ancestor_chain(&nodes, leaf_id).await?;

        let mut out = Vec::new();
        for _ in 0..limit {
            let head = {
                let state = nodes[idx].state.read().await;
                state.pending.peek_front().cloned()
            };
            let Some(gang) = head else { break };
            let demand = gang.total_resources();

            if !self.fits_chain(&nodes, &chain, &demand).await {
                // Head-of-line blocking: do not skip, do not consume.
                if out.is_empty() {
                    return Err(PelotonError::InvalidArgument(format!(
                        "insufficient resources: {leaf_id} head-of-line gang {} does not fit entitlement",
                        gang.id
                    )));
                }
                break;
            }

            // Re-acquire write locks top-down to apply the allocation.
            for &ancestor_idx in &chain {
                let mut state = nodes[ancestor_idx].state.write().await;
                state.allocation = state.allocation.add(&demand);
            }
            let mut leaf_state = nodes[idx].state.write().await;
            let popped = leaf_state.pending.pop_front();
            drop(leaf_state);
            if let Some(g) = popped {
                out.push(g);
            }
        }
        Ok(out)
    }

    async fn fits_chain(&self, nodes: &[RespoolNode], chain: &[usize], demand: &Resources) -> bool {
        for &idx in chain {
            let state = nodes[idx].state.read().await;
            let projected = state.allocation.add(demand);
            if !state.entitlement.contains(&projected) {
                return false;
            }
        }
        true
    }

    /// Decrements allocation along the chain from `leaf_id` to the root.
    /// Going negative is clamped to zero and logged, never an error.
    pub async fn mark_it_done(&self, leaf_id: &str, resources: Resources) -> Result<()> {
        let nodes = self.nodes.read().await;
        let idx = self.index_of(&nodes, leaf_id).await?;
        let chain = self.ancestor_chain(&nodes, leaf_id).await?;
        for ancestor_idx in chain {
            let mut state = nodes[ancestor_idx].state.write().await;
            state.allocation = match state.allocation.try_subtract(&resources) {
                Some(r) => r,
                None => {
                    warn!(
                        pool = %nodes[ancestor_idx].id,
                        "allocation would go negative on MarkItDone; clamping to zero"
                    );
                    Resources::ZERO
                }
            };
        }
        info!(pool = %leaf_id, "marked resources done");
        Ok(())
    }

    pub async fn allocation(&self, id: &str) -> Result<Resources> {
        let nodes = self.nodes.read().await;
        let idx = self.index_of(&nodes, id).await?;
        Ok(nodes[idx].state.read().await.allocation)
    }

    pub async fn entitlement(&self, id: &str) -> Result<Resources> {
        let nodes = self.nodes.read().await;
        let idx = self.index_of(&nodes, id).await?;
        Ok(nodes[idx].state.read().await.entitlement)
    }
}

fn kind_array(r: &Resources) -> [f64; 4] {
    [r.cpu, r.mem, r.disk, r.gpu]
}

impl GangQueue {
    /// Thin accessor used by the entitlement pass; kept here (rather than
    /// in `queue.rs`) since it is only meaningful in the context of demand
    /// estimation for the tree walk.
    fn metrics_total_resources(&self) -> Resources {
        // peek_front/pop_front don't expose a cheap "sum of all gangs" op;
        // for demand estimation the head-of-line gang's size is a
        // reasonable proxy for "what this pool is asking for right now".
        self.peek_front().map(|g| g.total_resources()).unwrap_or(Resources::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gang::Task;
    use crate::respool::config::KindConfig;
    use std::collections::HashMap;

    fn kc(reservation: f64, limit: f64, share: f64) -> KindConfig {
        KindConfig { reservation, limit, share }
    }

    fn resource_config(reservation: f64, limit: f64, share: f64) -> ResourceConfig {
        ResourceConfig {
            cpu: kc(reservation, limit, share),
            mem: kc(reservation * 10.0, limit * 10.0, share),
            disk: kc(reservation, limit, share),
            gpu: kc(0.0, if limit > 0.0 { 1.0 } else { 0.0 }, share),
        }
    }

    fn task(id: &str, priority: u32, cpu: f64) -> Task {
        Task {
            id: id.to_string(),
            job_id: "job".to_string(),
            priority,
            resources: Resources::new(cpu, 0.0, 0.0, 0.0),
            placement_constraints: HashMap::new(),
            config_version: 1,
        }
    }

    #[tokio::test]
    async fn entitlement_split_across_two_children_respects_caps() {
        let tree = ResourcePoolTree::new("root", Resources::new(100.0, 1000.0, 100.0, 2.0));
        tree.new_respool(
            "a".to_string(),
            "a",
            "root",
            resource_config(50.0, 50.0, 1.0),
            SchedulingPolicy::PriorityFifo,
        )
        .await
        .unwrap();
        tree.new_respool(
            "b".to_string(),
            "b",
            "root",
            resource_config(50.0, 50.0, 1.0),
            SchedulingPolicy::PriorityFifo,
        )
        .await
        .unwrap();

        tree.entitlement_pass(Resources::new(100.0, 1000.0, 100.0, 2.0)).await.unwrap();

        let ea = tree.entitlement("a").await.unwrap();
        let eb = tree.entitlement("b").await.unwrap();
        assert!(ea.approx_equal(&Resources::new(50.0, 500.0, 50.0, 1.0)));
        assert!(eb.approx_equal(&Resources::new(50.0, 500.0, 50.0, 1.0)));
    }

    #[tokio::test]
    async fn new_respool_rejects_reservation_over_parent() {
        let tree = ResourcePoolTree::new("root", Resources::new(10.0, 10.0, 10.0, 1.0));
        let err = tree
            .new_respool(
                "big".to_string(),
                "big",
                "root",
                resource_config(1000.0, 1000.0, 1.0),
                SchedulingPolicy::PriorityFifo,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PelotonError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn dequeue_zero_is_invalid() {
        let tree = ResourcePoolTree::new("root", Resources::new(10.0, 10.0, 10.0, 1.0));
        tree.new_respool("leaf".to_string(), "leaf", "root", resource_config(10.0, 10.0, 1.0), SchedulingPolicy::PriorityFifo)
            .await
            .unwrap();
        let err = tree.dequeue_gang_list("leaf", 0).await.unwrap_err();
        assert!(matches!(err, PelotonError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn head_of_line_blocking_then_unblocks_on_raised_entitlement() {
        let tree = ResourcePoolTree::new("root", Resources::new(1000.0, 1000.0, 1000.0, 0.0));
        tree.new_respool(
            "leaf".to_string(),
            "leaf",
            "root",
            resource_config(100.0, 100.0, 1.0),
            SchedulingPolicy::PriorityFifo,
        )
        .await
        .unwrap();
        tree.entitlement_pass(Resources::new(1000.0, 1000.0, 1000.0, 0.0)).await.unwrap();

        let gang = Gang::single(task("big", 3, 200.0));
        tree.enqueue_gang("leaf", gang).await.unwrap();

        let err = tree.dequeue_gang_list("leaf", 1).await.unwrap_err();
        assert!(matches!(err, PelotonError::InvalidArgument(_)));

        tree.new_respool(
            "other".to_string(),
            "other",
            "root",
            resource_config(0.0, 0.0, 0.0),
            SchedulingPolicy::PriorityFifo,
        )
        .await
        .ok();

        // Raise the leaf's entitlement directly (simulating a policy
        // change) and retry.
        tree.entitlement_pass(Resources::new(1000.0, 1000.0, 1000.0, 0.0)).await.unwrap();
        {
            let nodes = tree.nodes.write().await;
            let idx = tree.index_of(&nodes, "leaf").await.unwrap();
            nodes[idx].state.write().await.entitlement = Resources::new(500.0, 500.0, 500.0, 0.0);
        }
        let out = tree.dequeue_gang_list("leaf", 1).await.unwrap();
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn mark_it_done_clamps_at_zero() {
        let tree = ResourcePoolTree::new("root", Resources::new(10.0, 10.0, 10.0, 0.0));
        tree.new_respool("leaf".to_string(), "leaf", "root", resource_config(10.0, 10.0, 1.0), SchedulingPolicy::PriorityFifo)
            .await
            .unwrap();
        tree.mark_it_done("leaf", Resources::new(5.0, 0.0, 0.0, 0.0)).await.unwrap();
        let alloc = tree.allocation("leaf").await.unwrap();
        assert!(alloc.approx_equal(&Resources::ZERO));
    }

    #[tokio::test]
    async fn enqueue_rejects_interior_node() {
        let tree = ResourcePoolTree::new("root", Resources::new(10.0, 10.0, 10.0, 0.0));
        tree.new_respool("leaf".to_string(), "leaf", "root", resource_config(10.0, 10.0, 1.0), SchedulingPolicy::PriorityFifo)
            .await
            .unwrap();
        let gang = Gang::single(task("t", 1, 1.0));
        assert!(tree.enqueue_gang("root", gang).await.is_err());
    }

    #[tokio::test]
    async fn get_path_reflects_tree_shape() {
        let tree = ResourcePoolTree::new("root", Resources::new(10.0, 10.0, 10.0, 0.0));
        tree.new_respool("a".to_string(), "a", "root", resource_config(5.0, 5.0, 1.0), SchedulingPolicy::PriorityFifo)
            .await
            .unwrap();
        tree.new_respool("b".to_string(), "b", "a", resource_config(5.0, 5.0, 1.0), SchedulingPolicy::PriorityFifo)
            .await
            .unwrap();
        assert_eq!(tree.get_path("b").await.unwrap(), "/root/a/b");
        assert!(tree.is_leaf("b").await.unwrap());
        assert!(!tree.is_leaf("a").await.unwrap());
        assert!(tree.is_root("root").await.unwrap());
    }

    #[tokio::test]
    async fn lookup_by_path_resolves_to_id() {
        let tree = ResourcePoolTree::new("root", Resources::new(10.0, 10.0, 10.0, 0.0));
        tree.new_respool("a".to_string(), "a", "root", resource_config(5.0, 5.0, 1.0), SchedulingPolicy::PriorityFifo)
            .await
            .unwrap();
        assert_eq!(tree.lookup_by_path("/root/a").await.unwrap(), "a");
        assert!(tree.lookup_by_path("/root/missing").await.is_err());
    }

    #[tokio::test]
    async fn delete_respool_requires_empty_leaf() {
        let tree = ResourcePoolTree::new("root", Resources::new(10.0, 10.0, 10.0, 0.0));
        tree.new_respool("a".to_string(), "a", "root", resource_config(5.0, 5.0, 1.0), SchedulingPolicy::PriorityFifo)
            .await
            .unwrap();
        tree.entitlement_pass(Resources::new(10.0, 10.0, 10.0, 0.0)).await.unwrap();

        let gang = Gang::single(task("t", 1, 1.0));
        tree.enqueue_gang("a", gang).await.unwrap();
        tree.dequeue_gang_list("a", 1).await.unwrap();

        let err = tree.delete_respool("a").await.unwrap_err();
        assert!(matches!(err, PelotonError::FailedPrecondition(_)));

        tree.mark_it_done("a", Resources::new(1.0, 0.0, 0.0, 0.0)).await.unwrap();
        tree.delete_respool("a").await.unwrap();
        assert!(tree.describe("a").await.is_err());
        assert!(tree.children("root").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_respool_rejects_nonleaf() {
        let tree = ResourcePoolTree::new("root", Resources::new(10.0, 10.0, 10.0, 0.0));
        tree.new_respool("a".to_string(), "a", "root", resource_config(5.0, 5.0, 1.0), SchedulingPolicy::PriorityFifo)
            .await
            .unwrap();
        tree.new_respool("b".to_string(), "b", "a", resource_config(5.0, 5.0, 1.0), SchedulingPolicy::PriorityFifo)
            .await
            .unwrap();
        let err = tree.delete_respool("a").await.unwrap_err();
        assert!(matches!(err, PelotonError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn update_respool_config_rejects_reservation_below_allocation_without_force() {
        let tree = ResourcePoolTree::new("root", Resources::new(10.0, 10.0, 10.0, 0.0));
        tree.new_respool("a".to_string(), "a", "root", resource_config(5.0, 5.0, 1.0), SchedulingPolicy::PriorityFifo)
            .await
            .unwrap();
        tree.entitlement_pass(Resources::new(10.0, 10.0, 10.0, 0.0)).await.unwrap();
        let gang = Gang::single(task("t", 1, 4.0));
        tree.enqueue_gang("a", gang).await.unwrap();
        tree.dequeue_gang_list("a", 1).await.unwrap();

        let err = tree
            .update_respool_config("a", resource_config(1.0, 1.0, 1.0), false)
            .await
            .unwrap_err();
        assert!(matches!(err, PelotonError::InvalidArgument(_)));

        tree.update_respool_config("a", resource_config(1.0, 1.0, 1.0), true).await.unwrap();
        let descriptor = tree.describe("a").await.unwrap();
        assert!(descriptor.resources.cpu.reservation - 1.0 < 1e-9);
    }

    #[tokio::test]
    async fn describe_reports_path_and_children() {
        let tree = ResourcePoolTree::new("root", Resources::new(10.0, 10.0, 10.0, 0.0));
        tree.new_respool("a".to_string(), "a", "root", resource_config(5.0, 5.0, 1.0), SchedulingPolicy::PriorityFifo)
            .await
            .unwrap();
        let descriptor = tree.describe("a").await.unwrap();
        assert_eq!(descriptor.path, "/root/a");
        assert_eq!(descriptor.parent_id.as_deref(), Some("root"));
        assert_eq!(tree.all_ids().await.len(), 2);
    }
}
