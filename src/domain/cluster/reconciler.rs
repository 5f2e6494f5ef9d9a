// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Drives a cluster one step at a time toward its desired topology.
//!
//! Every cycle starts from a fresh snapshot and nothing is carried over
//! between cycles, so a failed or interrupted cycle is repaired by the next.

use crate::domain::cluster::inspector::ClusterInspector;
use crate::domain::topology::{
    sort_actions, ClusterSnapshot, DesiredTopology, ObservedNode, ReconcileAction,
};
use crate::infrastructure::redis::ClusterDriver;
use crate::shared::error::{RedisKubeError, Result};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct Reconciler {
    inspector: Arc<ClusterInspector>,
    driver: Arc<dyn ClusterDriver>,
    // one cycle at a time per cluster
    cycle: Mutex<()>,
}

impl Reconciler {
    pub fn new(inspector: Arc<ClusterInspector>, driver: Arc<dyn ClusterDriver>) -> Self {
        Self {
            inspector,
            driver,
            cycle: Mutex::new(()),
        }
    }

    pub fn inspector(&self) -> &Arc<ClusterInspector> {
        &self.inspector
    }

    /// Runs one cycle: observe, plan, then execute the plan in order.
    ///
    /// Returns the actions that were executed. The first driver failure
    /// aborts the cycle; actions already executed stay in effect.
    pub async fn apply(&self, desired: &DesiredTopology) -> Result<Vec<ReconcileAction>> {
        desired.validate()?;
        let _guard = self.cycle.lock().await;

        let snapshot = self.inspector.observe().await?;
        let actions = plan(desired, &snapshot);
        if actions.is_empty() {
            debug!(generation = snapshot.generation, "cluster matches desired topology");
            return Ok(actions);
        }

        info!(
            generation = snapshot.generation,
            count = actions.len(),
            "reconciling toward {}",
            desired
        );
        for action in &actions {
            self.driver.execute(action).await.map_err(|e| match e {
                RedisKubeError::DriverExecutionError { .. } => e,
                other => RedisKubeError::driver(action.clone(), other.to_string()),
            })?;
        }

        Ok(actions)
    }

    /// `apply` bounded by `deadline`. On expiry no further action is issued.
    pub async fn apply_with_deadline(
        &self,
        desired: &DesiredTopology,
        deadline: Duration,
    ) -> Result<Vec<ReconcileAction>> {
        tokio::time::timeout(deadline, self.apply(desired))
            .await
            .map_err(|_| {
                RedisKubeError::Timeout(format!("reconcile did not finish within {:?}", deadline))
            })?
    }

    /// Plans a cycle without executing anything.
    pub async fn dry_run(
        &self,
        desired: &DesiredTopology,
    ) -> Result<(ClusterSnapshot, Vec<ReconcileAction>)> {
        desired.validate()?;
        let snapshot = self.inspector.observe().await?;
        let actions = plan(desired, &snapshot);
        Ok((snapshot, actions))
    }
}

/// Computes the actions of one reconcile cycle. Pure.
///
/// A replica count mismatch yields only a `ScaleTo`. A cluster without a
/// healthy master yields only the promotion of its freshest node. Otherwise
/// orphaned slaves are attached to the least loaded masters and at most one
/// structural change (promotion, demotion or slave move) is added.
pub fn plan(desired: &DesiredTopology, snapshot: &ClusterSnapshot) -> Vec<ReconcileAction> {
    if snapshot.len() != desired.replica_count as usize {
        return vec![ReconcileAction::ScaleTo(desired.replica_count)];
    }

    if snapshot.healthy_masters().next().is_none() {
        return snapshot
            .nodes()
            .iter()
            .filter(|n| n.healthy && !n.is_master())
            .max_by(|a, b| freshest_first(a, b))
            .map(|n| vec![ReconcileAction::promote(&n.id)])
            .unwrap_or_default();
    }

    let mut groups = MasterGroups::new(snapshot);
    let mut actions = Vec::new();

    for node in snapshot
        .nodes()
        .iter()
        .filter(|n| n.healthy && !n.is_master())
    {
        if groups.is_attached(node) {
            continue;
        }
        if let Some(master) = groups.least_loaded(None) {
            groups.plan_attachment(&master);
            actions.push(ReconcileAction::attach(&node.id, master));
        }
    }

    if let Some(action) = groups.structural_change(desired.target_master_count()) {
        actions.push(action);
    }

    sort_actions(&mut actions);
    actions
}

/// Higher offset wins; equal offsets prefer the lower id.
fn freshest_first(a: &ObservedNode, b: &ObservedNode) -> Ordering {
    a.replication_offset
        .cmp(&b.replication_offset)
        .then_with(|| b.id.cmp(&a.id))
}

/// Healthy masters with the healthy slaves already following them,
/// plus the attachments planned during the current cycle.
struct MasterGroups<'a> {
    members: BTreeMap<String, Vec<&'a ObservedNode>>,
    planned: BTreeMap<String, usize>,
}

impl<'a> MasterGroups<'a> {
    fn new(snapshot: &'a ClusterSnapshot) -> Self {
        Self {
            members: snapshot.master_groups(),
            planned: BTreeMap::new(),
        }
    }

    fn is_attached(&self, node: &ObservedNode) -> bool {
        node.is_slave()
            && node
                .master_ref
                .as_ref()
                .is_some_and(|id| self.members.contains_key(id))
    }

    fn load(&self, master: &str) -> usize {
        let existing = self.members.get(master).map_or(0, Vec::len);
        existing + self.planned.get(master).copied().unwrap_or(0)
    }

    fn plan_attachment(&mut self, master: &str) {
        *self.planned.entry(master.to_string()).or_default() += 1;
    }

    /// Lowest load, ties to the lower id.
    fn least_loaded(&self, except: Option<&str>) -> Option<String> {
        self.members
            .keys()
            .filter(|id| Some(id.as_str()) != except)
            .min_by_key(|id| self.load(id))
            .cloned()
    }

    fn structural_change(&self, target_masters: usize) -> Option<ReconcileAction> {
        let masters = self.members.len();

        match masters.cmp(&target_masters) {
            Ordering::Less => self.promotion(),
            Ordering::Greater => self.demotion(),
            Ordering::Equal => self.rebalance(),
        }
    }

    /// Promote the freshest slave of the most loaded master.
    fn promotion(&self) -> Option<ReconcileAction> {
        let (_, group) = self
            .members
            .iter()
            .filter(|(_, group)| !group.is_empty())
            .max_by(|(a, _), (b, _)| self.load(a).cmp(&self.load(b)).then_with(|| b.cmp(a)))?;

        group
            .iter()
            .copied()
            .max_by(|a, b| freshest_first(a, b))
            .map(|n| ReconcileAction::promote(&n.id))
    }

    /// Turn the least loaded master (ties to the highest id) into a slave of
    /// the least loaded remaining master. Masters receiving attachments in this
    /// cycle are kept.
    fn demotion(&self) -> Option<ReconcileAction> {
        let demoted = self
            .members
            .keys()
            .filter(|id| !self.planned.contains_key(*id))
            .min_by(|a, b| self.load(a).cmp(&self.load(b)).then_with(|| b.cmp(a)))?;

        self.least_loaded(Some(demoted.as_str()))
            .map(|target| ReconcileAction::attach(demoted, target))
    }

    /// Move the stalest slave of the most loaded master to a master without slaves.
    fn rebalance(&self) -> Option<ReconcileAction> {
        let receiver = self.members.keys().find(|id| self.load(id) == 0)?;

        let (_, group) = self
            .members
            .iter()
            .filter(|(id, group)| self.load(id) >= 2 && !group.is_empty())
            .max_by(|(a, _), (b, _)| self.load(a).cmp(&self.load(b)).then_with(|| b.cmp(a)))?;

        group
            .iter()
            .copied()
            .min_by(|a, b| freshest_first(a, b))
            .map(|n| ReconcileAction::attach(&n.id, receiver.as_str()))
    }
}
