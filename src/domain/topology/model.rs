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

//! Desired and observed cluster shape

use crate::shared::error::{RedisKubeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The topology a reconciliation cycle drives toward.
///
/// `replica_count` is the total number of pods (masters and slaves together),
/// `slaves_per_master` the intended fan-out of each master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredTopology {
    pub replica_count: u32,
    pub slaves_per_master: i64,
}

impl DesiredTopology {
    pub fn new(replica_count: u32, slaves_per_master: i64) -> Self {
        Self {
            replica_count,
            slaves_per_master,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.replica_count < 1 {
            return Err(RedisKubeError::invalid_topology(format!(
                "replica_count must be >= 1, got {}",
                self.replica_count
            )));
        }

        if self.slaves_per_master < 0 {
            return Err(RedisKubeError::invalid_topology(format!(
                "slaves_per_master must be >= 0, got {}",
                self.slaves_per_master
            )));
        }

        Ok(())
    }

    /// `replica_count` in the signed form the StatefulSet API carries.
    pub fn statefulset_replicas(&self) -> Result<i32> {
        replicas_to_i32(self.replica_count)
    }

    /// Number of masters a converged cluster carries. Always at least one.
    pub fn target_master_count(&self) -> usize {
        let group = self.slaves_per_master.max(0) as usize + 1;
        (self.replica_count as usize / group).max(1)
    }
}

pub fn replicas_to_i32(replicas: u32) -> Result<i32> {
    i32::try_from(replicas).map_err(|_| {
        RedisKubeError::invalid_topology(format!(
            "replica_count {} exceeds the StatefulSet limit of {}",
            replicas,
            i32::MAX
        ))
    })
}

impl fmt::Display for DesiredTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} replicas, {} slaves per master",
            self.replica_count, self.slaves_per_master
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    Master,
    Slave,
    Unknown,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Master => "master",
            NodeRole::Slave => "slave",
            NodeRole::Unknown => "unknown",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One Redis pod as seen by a single observation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedNode {
    pub id: String,
    pub role: NodeRole,
    /// Id of the master this node replicates from. Resolved by lookup, never owned.
    pub master_ref: Option<String>,
    pub replication_offset: u64,
    pub healthy: bool,
    pub address: Option<String>,
}

impl ObservedNode {
    pub fn new(id: impl Into<String>, role: NodeRole) -> Self {
        Self {
            id: id.into(),
            role,
            master_ref: None,
            replication_offset: 0,
            healthy: true,
            address: None,
        }
    }

    pub fn with_master(mut self, master_id: impl Into<String>) -> Self {
        self.master_ref = Some(master_id.into());
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.replication_offset = offset;
        self
    }

    pub fn with_healthy(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn is_master(&self) -> bool {
        self.role == NodeRole::Master
    }

    pub fn is_slave(&self) -> bool {
        self.role == NodeRole::Slave
    }
}

/// Point-in-time view of every pod in the cluster, ordered by node id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    nodes: Vec<ObservedNode>,
    pub generation: u64,
    pub observed_at: DateTime<Utc>,
}

impl ClusterSnapshot {
    pub fn new(mut nodes: Vec<ObservedNode>, generation: u64) -> Self {
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes.dedup_by(|a, b| a.id == b.id);
        Self {
            nodes,
            generation,
            observed_at: Utc::now(),
        }
    }

    pub fn nodes(&self) -> &[ObservedNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ObservedNode> {
        self.nodes
            .binary_search_by(|n| n.id.as_str().cmp(id))
            .ok()
            .map(|idx| &self.nodes[idx])
    }

    pub fn masters(&self) -> impl Iterator<Item = &ObservedNode> {
        self.nodes.iter().filter(|n| n.is_master())
    }

    pub fn slaves(&self) -> impl Iterator<Item = &ObservedNode> {
        self.nodes.iter().filter(|n| n.is_slave())
    }

    pub fn healthy_masters(&self) -> impl Iterator<Item = &ObservedNode> {
        self.masters().filter(|n| n.healthy)
    }

    /// The master a node replicates from, if it exists in this snapshot.
    pub fn master_of(&self, node: &ObservedNode) -> Option<&ObservedNode> {
        node.master_ref
            .as_deref()
            .and_then(|id| self.get(id))
            .filter(|m| m.is_master())
    }

    /// Healthy slaves attached to each healthy master, keyed by master id.
    pub fn master_groups(&self) -> BTreeMap<String, Vec<&ObservedNode>> {
        let mut groups: BTreeMap<String, Vec<&ObservedNode>> = self
            .healthy_masters()
            .map(|m| (m.id.clone(), Vec::new()))
            .collect();

        for slave in self.slaves().filter(|s| s.healthy) {
            if let Some(group) = slave
                .master_ref
                .as_ref()
                .and_then(|id| groups.get_mut(id))
            {
                group.push(slave);
            }
        }

        groups
    }
}
