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

//! In-memory Kubernetes + Redis stand-in shared by the integration tests.
//!
//! One `SimulatedCluster` plays every collaborator: the platform API, the
//! resource client, the role probe and the driver. Driver actions mutate the
//! simulated nodes so that successive reconcile cycles see their effect.

#![allow(dead_code)]

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use redis_kube::domain::config::{ClusterConf, KubernetesConfig};
use redis_kube::{
    ClusterDriver, ClusterPlatformClient, NodeRoleProbe, PodInfo, ReconcileAction,
    RedisClusterManager, RedisKubeClient, RedisKubeError, Result, RoleInfo,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CLUSTER_ID: &str = "cache";
pub const NAMESPACE: &str = "prod";
pub const MASTER_OFFSET: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimRole {
    Master,
    Slave(String),
}

#[derive(Debug, Clone)]
pub struct SimNode {
    pub ip: String,
    pub role: SimRole,
    pub offset: u64,
    pub reachable: bool,
}

#[derive(Default)]
pub struct SimState {
    pub nodes: BTreeMap<String, SimNode>,
    pub statefulset: Option<StatefulSet>,
    pub service: Option<String>,
    pub configmap: Option<String>,
    pub pvcs_deleted: bool,
    pub storage_classes: Vec<String>,
    /// Every mutating call, in order.
    pub calls: Vec<String>,
    pub executed: Vec<ReconcileAction>,
    /// Number of upcoming `list_pods` calls that fail.
    pub list_failures: u32,
    pub fail_on: Option<ReconcileAction>,
    pub driver_delay: Option<Duration>,
    next_ip: u8,
}

#[derive(Default)]
pub struct SimulatedCluster {
    pub state: Mutex<SimState>,
}

impl SimulatedCluster {
    pub fn new() -> Arc<Self> {
        let sim = Self::default();
        sim.state.lock().unwrap().storage_classes = vec!["standard".to_string()];
        Arc::new(sim)
    }

    pub fn pod_name(index: u32) -> String {
        format!("{}-{}", CLUSTER_ID, index)
    }

    /// Adds a pod that is already running Redis.
    pub fn add_node(&self, name: &str, role: SimRole, offset: u64) {
        let mut state = self.state.lock().unwrap();
        state.next_ip += 1;
        let ip = format!("10.0.0.{}", state.next_ip);
        state.nodes.insert(
            name.to_string(),
            SimNode {
                ip,
                role,
                offset,
                reachable: true,
            },
        );
    }

    pub fn add_master(&self, name: &str) {
        self.add_node(name, SimRole::Master, MASTER_OFFSET);
    }

    pub fn add_slave(&self, name: &str, master: &str) {
        self.add_node(name, SimRole::Slave(master.to_string()), MASTER_OFFSET);
    }

    pub fn set_reachable(&self, name: &str, reachable: bool) {
        if let Some(node) = self.state.lock().unwrap().nodes.get_mut(name) {
            node.reachable = reachable;
        }
    }

    pub fn set_offset(&self, name: &str, offset: u64) {
        if let Some(node) = self.state.lock().unwrap().nodes.get_mut(name) {
            node.offset = offset;
        }
    }

    pub fn fail_next_lists(&self, count: u32) {
        self.state.lock().unwrap().list_failures = count;
    }

    pub fn fail_on(&self, action: ReconcileAction) {
        self.state.lock().unwrap().fail_on = Some(action);
    }

    pub fn slow_driver(&self, delay: Duration) {
        self.state.lock().unwrap().driver_delay = Some(delay);
    }

    pub fn executed(&self) -> Vec<ReconcileAction> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn masters(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .nodes
            .iter()
            .filter(|(_, n)| n.role == SimRole::Master)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Master id to the ids of its slaves.
    pub fn groups(&self) -> BTreeMap<String, Vec<String>> {
        let state = self.state.lock().unwrap();
        let mut groups: BTreeMap<String, Vec<String>> = state
            .nodes
            .iter()
            .filter(|(_, n)| n.role == SimRole::Master)
            .map(|(id, _)| (id.clone(), Vec::new()))
            .collect();
        for (id, node) in &state.nodes {
            if let SimRole::Slave(master) = &node.role {
                groups.entry(master.clone()).or_default().push(id.clone());
            }
        }
        groups
    }

    pub fn node_count(&self) -> usize {
        self.state.lock().unwrap().nodes.len()
    }

    fn resize(&self, replicas: u32) {
        let existing: Vec<u32> = {
            let state = self.state.lock().unwrap();
            (0..replicas)
                .filter(|i| !state.nodes.contains_key(&Self::pod_name(*i)))
                .collect()
        };
        // a fresh redis-server starts as a master of its own
        for index in existing {
            self.add_node(&Self::pod_name(index), SimRole::Master, 0);
        }

        let mut state = self.state.lock().unwrap();
        state.nodes.retain(|name, _| {
            name.rsplit_once('-')
                .and_then(|(_, i)| i.parse::<u32>().ok())
                .map_or(true, |i| i < replicas)
        });
        if let Some(spec) = state
            .statefulset
            .as_mut()
            .and_then(|sts| sts.spec.as_mut())
        {
            spec.replicas = Some(replicas as i32);
        }
    }

    /// A manager wired entirely to this simulation.
    pub fn manager(self: &Arc<Self>, conf: ClusterConf) -> RedisClusterManager {
        RedisClusterManager::new(
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            kube_config(),
            conf,
        )
    }
}

pub fn kube_config() -> KubernetesConfig {
    KubernetesConfig::new(CLUSTER_ID, NAMESPACE)
}

/// Short timeouts so failing tests do not hang.
pub fn test_conf() -> ClusterConf {
    let mut conf = ClusterConf::default();
    conf.reconcile.apply_timeout_secs = 5;
    conf.reconcile.converge_interval_secs = 0;
    conf.reconcile.max_cycles = 10;
    conf.reconcile.retry_max_times = 2;
    conf
}

#[async_trait::async_trait]
impl ClusterPlatformClient for SimulatedCluster {
    async fn list_pods(&self, _selector: &BTreeMap<String, String>) -> Result<Vec<PodInfo>> {
        let mut state = self.state.lock().unwrap();
        if state.list_failures > 0 {
            state.list_failures -= 1;
            return Err(RedisKubeError::KubeApi("apiserver unavailable".to_string()));
        }
        Ok(state
            .nodes
            .iter()
            .map(|(name, node)| PodInfo::new(name, Some(node.ip.clone())))
            .collect())
    }

    async fn scale_statefulset(&self, name: &str, replicas: u32) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(format!("scale {} {}", name, replicas));
        self.resize(replicas);
        Ok(())
    }

    async fn delete_pod(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete pod {}", name));
        state.nodes.remove(name);
        Ok(())
    }
}

#[async_trait::async_trait]
impl NodeRoleProbe for SimulatedCluster {
    async fn get_role(&self, address: &str) -> Result<RoleInfo> {
        let state = self.state.lock().unwrap();
        let node = state
            .nodes
            .values()
            .find(|n| format!("{}:6379", n.ip) == address && n.reachable)
            .ok_or_else(|| RedisKubeError::Timeout(format!("connect to {}", address)))?;

        Ok(match &node.role {
            SimRole::Master => RoleInfo::master(node.offset),
            SimRole::Slave(master) => {
                let master_ip = state
                    .nodes
                    .get(master)
                    .map(|m| m.ip.clone())
                    .unwrap_or_else(|| "10.255.255.255".to_string());
                RoleInfo::slave(format!("{}:6379", master_ip), node.offset)
            }
        })
    }
}

#[async_trait::async_trait]
impl ClusterDriver for SimulatedCluster {
    async fn execute(&self, action: &ReconcileAction) -> Result<()> {
        let delay = self.state.lock().unwrap().driver_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut state = self.state.lock().unwrap();
            if state.fail_on.as_ref() == Some(action) {
                return Err(RedisKubeError::driver(action.clone(), "connection reset"));
            }
            state.executed.push(action.clone());
        }

        match action {
            ReconcileAction::ScaleTo(replicas) => {
                self.scale_statefulset(CLUSTER_ID, *replicas).await
            }
            ReconcileAction::PromoteToMaster(id) => {
                let mut state = self.state.lock().unwrap();
                if let Some(node) = state.nodes.get_mut(id) {
                    node.role = SimRole::Master;
                }
                Ok(())
            }
            ReconcileAction::AttachSlave(id, master) => {
                let mut state = self.state.lock().unwrap();
                let offset = state.nodes.get(master).map_or(0, |m| m.offset);
                if let Some(node) = state.nodes.get_mut(id) {
                    node.role = SimRole::Slave(master.clone());
                    node.offset = offset;
                }
                Ok(())
            }
            ReconcileAction::RemoveNode(id) => self.delete_pod(id).await,
        }
    }
}

#[async_trait::async_trait]
impl RedisKubeClient for SimulatedCluster {
    async fn apply_configmap(&self, configmap: &ConfigMap) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let name = configmap.metadata.name.clone().unwrap_or_default();
        state.calls.push(format!("apply configmap {}", name));
        state.configmap = Some(name);
        Ok(())
    }

    async fn apply_service(&self, service: &Service) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let name = service.metadata.name.clone().unwrap_or_default();
        state.calls.push(format!("apply service {}", name));
        state.service = Some(name);
        Ok(())
    }

    async fn apply_statefulset(&self, statefulset: &StatefulSet) -> Result<()> {
        let replicas = statefulset
            .spec
            .as_ref()
            .and_then(|s| s.replicas)
            .unwrap_or(0) as u32;
        {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!(
                "apply statefulset {}",
                statefulset.metadata.name.clone().unwrap_or_default()
            ));
            state.statefulset = Some(statefulset.clone());
        }
        self.resize(replicas);
        Ok(())
    }

    async fn get_statefulset(&self, name: &str) -> Result<StatefulSet> {
        self.state
            .lock()
            .unwrap()
            .statefulset
            .clone()
            .ok_or_else(|| RedisKubeError::not_found("StatefulSet", name, NAMESPACE))
    }

    async fn annotate_statefulset(&self, name: &str, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let sts = state
            .statefulset
            .as_mut()
            .ok_or_else(|| RedisKubeError::not_found("StatefulSet", name, NAMESPACE))?;
        sts.metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        state.calls.push(format!("annotate {} {}={}", name, key, value));
        Ok(())
    }

    async fn delete_statefulset(&self, name: &str, orphan: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.statefulset = None;
        state
            .calls
            .push(format!("delete statefulset {} orphan={}", name, orphan));
        Ok(())
    }

    async fn delete_service(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.service = None;
        state.calls.push(format!("delete service {}", name));
        Ok(())
    }

    async fn delete_configmap(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.configmap = None;
        state.calls.push(format!("delete configmap {}", name));
        Ok(())
    }

    async fn delete_pvcs_for_cluster(&self, cluster_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.pvcs_deleted = true;
        state.calls.push(format!("delete pvcs {}", cluster_id));
        Ok(())
    }

    async fn list_storage_classes(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().storage_classes.clone())
    }
}
