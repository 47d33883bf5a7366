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

//! Entitlement computation. A pure, deterministic function over a
//! snapshot of a parent's entitlement and its children's reservation/limit/
//! share/demand; the tree walk in `tree.rs` is responsible for snapshotting
//! under lock, calling this, and applying results back under lock.

use peloton_core::resources::{Resources, EPSILON};

/// What the entitlement algorithm needs to know about one child of the node
/// currently being distributed.
#[derive(Debug, Clone, Copy)]
pub struct ChildDemand {
    pub reservation: [f64; 4],
    pub limit: [f64; 4],
    pub share: [f64; 4],
    /// What the child would consume if unconstrained: current allocation
    /// plus whatever its pending queue is asking for, already capped to the
    /// child's own limit by the caller.
    pub demand: [f64; 4],
}

fn to_array(r: &Resources) -> [f64; 4] {
    [r.cpu, r.mem, r.disk, r.gpu]
}

fn from_array(a: [f64; 4]) -> Resources {
    Resources::new(a[0], a[1], a[2], a[3])
}

/// Splits `parent_entitlement` among `children` per-kind:
/// 1. Start from each child's reservation floor.
/// 2. Distribute the remaining parent entitlement by share, capped at limit.
/// 3. Redistribute slack from children whose demand is below their
///    share-proportional allotment to hungrier siblings, bounded by limit,
///    iterating until no slack moves or `children.len()` rounds have run.
pub fn distribute(parent_entitlement: &Resources, children: &[ChildDemand]) -> Vec<Resources> {
    if children.is_empty() {
        return Vec::new();
    }
    let parent = to_array(parent_entitlement);
    let mut result = vec![[0.0f64; 4]; children.len()];

    for kind in 0..4 {
        let reservations: Vec<f64> = children.iter().map(|c| c.reservation[kind]).collect();
        let limits: Vec<f64> = children.iter().map(|c| c.limit[kind]).collect();
        let shares: Vec<f64> = children.iter().map(|c| c.share[kind]).collect();
        let demands: Vec<f64> = children.iter().map(|c| c.demand[kind]).collect();

        let reserved_total: f64 = reservations.iter().sum();
        let mut remaining = (parent[kind] - reserved_total).max(0.0);

        let mut alloc: Vec<f64> = reservations.clone();
        let total_share: f64 = shares.iter().sum();

        if total_share > EPSILON && remaining > EPSILON {
            for i in 0..children.len() {
                let share_fraction = shares[i] / total_share;
                let grant = (remaining * share_fraction).min(limits[i] - alloc[i]).max(0.0);
                alloc[i] += grant;
            }
        }

        // Iteratively move slack from over-allotted-but-not-demanding
        // children to hungry siblings, bounded by the number of children so
        // this always terminates.
        for _ in 0..children.len() {
            let mut slack = 0.0;
            let mut hungry_share_total = 0.0;
            let mut hungry: Vec<bool> = vec![false; children.len()];

            for i in 0..children.len() {
                if alloc[i] > demands[i] + EPSILON {
                    slack += alloc[i] - demands[i];
                    alloc[i] = demands[i];
                } else if alloc[i] + EPSILON < limits[i] && demands[i] > alloc[i] + EPSILON {
                    hungry[i] = true;
                    hungry_share_total += shares[i].max(EPSILON);
                }
            }

            if slack <= EPSILON || hungry_share_total <= EPSILON {
                break;
            }

            let mut moved = 0.0;
            for i in 0..children.len() {
                if hungry[i] {
                    let fraction = shares[i].max(EPSILON) / hungry_share_total;
                    let want = (slack * fraction).min(limits[i] - alloc[i]).max(0.0);
                    alloc[i] += want;
                    moved += want;
                }
            }
            if moved <= EPSILON {
                break;
            }
        }

        for i in 0..children.len() {
            result[i][kind] = alloc[i];
        }
    }

    result.into_iter().map(from_array).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(reservation: f64, limit: f64, share: f64, demand: f64) -> ChildDemand {
        ChildDemand {
            reservation: [reservation; 4],
            limit: [limit; 4],
            share: [share; 4],
            demand: [demand; 4],
        }
    }

    #[test]
    fn entitlement_split_gives_each_child_its_reservation_when_demand_matches() {
        // root {100,1000,100,2}; two children reservation {50,500,50,1}
        // share=1 each. Expect each entitlement == reservation.
        let parent = Resources::new(100.0, 1000.0, 100.0, 2.0);
        let children = vec![
            ChildDemand {
                reservation: [50.0, 500.0, 50.0, 1.0],
                limit: [50.0, 500.0, 50.0, 1.0],
                share: [1.0; 4],
                demand: [50.0, 500.0, 50.0, 1.0],
            },
            ChildDemand {
                reservation: [50.0, 500.0, 50.0, 1.0],
                limit: [50.0, 500.0, 50.0, 1.0],
                share: [1.0; 4],
                demand: [50.0, 500.0, 50.0, 1.0],
            },
        ];
        let out = distribute(&parent, &children);
        assert!(out[0].approx_equal(&Resources::new(50.0, 500.0, 50.0, 1.0)));
        assert!(out[1].approx_equal(&Resources::new(50.0, 500.0, 50.0, 1.0)));
    }

    #[test]
    fn adding_zero_reservation_sibling_with_no_slack_does_not_change_existing() {
        let parent = Resources::new(100.0, 1000.0, 100.0, 2.0);
        let children = vec![
            child(50.0, 50.0, 1.0, 50.0),
            child(50.0, 50.0, 1.0, 50.0),
            child(0.0, 0.0, 1.0, 0.0),
        ];
        let out = distribute(&parent, &children);
        assert!(out[0].cpu - 50.0 < EPSILON);
        assert!(out[1].cpu - 50.0 < EPSILON);
        assert!(out[2].cpu < EPSILON);
    }

    #[test]
    fn slack_from_satisfied_child_flows_to_hungry_sibling() {
        let parent = Resources::new(100.0, 100.0, 100.0, 100.0);
        let children = vec![
            // Reserves 20, share 1, but only demands 20: its proportional
            // share of the remaining 60 (30) is slack.
            child(20.0, 100.0, 1.0, 20.0),
            // Reserves 20, share 1, demands the full limit: hungry for the
            // slack freed by its sibling.
            child(20.0, 100.0, 1.0, 100.0),
        ];
        let out = distribute(&parent, &children);
        assert!((out[0].cpu - 20.0).abs() < 1e-3);
        assert!(out[1].cpu > out[0].cpu);
    }

    #[test]
    fn empty_children_yields_empty_result() {
        let parent = Resources::new(1.0, 1.0, 1.0, 1.0);
        assert!(distribute(&parent, &[]).is_empty());
    }
}
