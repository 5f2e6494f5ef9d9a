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

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single step toward the desired topology, executed by a `ClusterDriver`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", content = "args")]
pub enum ReconcileAction {
    ScaleTo(u32),
    PromoteToMaster(String),
    /// (node id, master id)
    AttachSlave(String, String),
    RemoveNode(String),
}

impl ReconcileAction {
    pub fn attach(node_id: impl Into<String>, master_id: impl Into<String>) -> Self {
        ReconcileAction::AttachSlave(node_id.into(), master_id.into())
    }

    pub fn promote(node_id: impl Into<String>) -> Self {
        ReconcileAction::PromoteToMaster(node_id.into())
    }

    pub fn remove(node_id: impl Into<String>) -> Self {
        ReconcileAction::RemoveNode(node_id.into())
    }

    /// Position of the action kind in an emitted action list.
    ///
    /// Promotions run before attachments so a slave is never pointed at a
    /// master that does not exist yet.
    pub fn rank(&self) -> u8 {
        match self {
            ReconcileAction::ScaleTo(_) => 0,
            ReconcileAction::PromoteToMaster(_) => 1,
            ReconcileAction::AttachSlave(..) => 2,
            ReconcileAction::RemoveNode(_) => 3,
        }
    }
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileAction::ScaleTo(replicas) => write!(f, "ScaleTo({})", replicas),
            ReconcileAction::PromoteToMaster(id) => write!(f, "PromoteToMaster({})", id),
            ReconcileAction::AttachSlave(id, master) => {
                write!(f, "AttachSlave({}, {})", id, master)
            }
            ReconcileAction::RemoveNode(id) => write!(f, "RemoveNode({})", id),
        }
    }
}

/// Stable sort into emission order, keeping the relative order within a kind.
pub fn sort_actions(actions: &mut [ReconcileAction]) {
    actions.sort_by_key(|a| a.rank());
}
