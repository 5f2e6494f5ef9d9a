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

use crate::domain::config::KubernetesConfig;
use crate::domain::topology::{ClusterSnapshot, NodeRole, ObservedNode};
use crate::infrastructure::kubernetes::{ClusterPlatformClient, PodInfo};
use crate::infrastructure::redis::NodeRoleProbe;
use crate::shared::error::{RedisKubeError, Result};
use futures::future::join_all;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// `<pod>.<service>[.<namespace>.svc.<domain>]`
const POD_FQDN_PATTERN: &str = r"^(?P<pod>[a-z0-9]([-a-z0-9]*[a-z0-9])?)\.(?P<service>[a-z0-9]([-a-z0-9]*[a-z0-9])?)(\..*)?$";

fn pod_fqdn_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(POD_FQDN_PATTERN) {
        Ok(re) => re,
        Err(_) => unreachable!("pod FQDN pattern is a valid literal"),
    })
}

/// Builds point-in-time snapshots from the platform's pod list and the
/// role each reachable node reports. Read-only.
pub struct ClusterInspector {
    platform: Arc<dyn ClusterPlatformClient>,
    probe: Arc<dyn NodeRoleProbe>,
    config: KubernetesConfig,
    generation: AtomicU64,
}

impl ClusterInspector {
    pub fn new(
        platform: Arc<dyn ClusterPlatformClient>,
        probe: Arc<dyn NodeRoleProbe>,
        config: KubernetesConfig,
    ) -> Self {
        Self {
            platform,
            probe,
            config,
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &KubernetesConfig {
        &self.config
    }

    /// Fails with `InspectionError` only when the pod list itself is unavailable.
    /// Nodes that cannot be probed are reported as unhealthy `Unknown` nodes.
    pub async fn observe(&self) -> Result<ClusterSnapshot> {
        let pods = self
            .platform
            .list_pods(&self.config.selector_labels())
            .await
            .map_err(|e| RedisKubeError::inspection(format!("listing pods failed: {}", e)))?;

        let resolver = MasterResolver::new(&pods, &self.config.headless_service_name());

        let nodes = join_all(pods.iter().map(|pod| self.observe_pod(pod, &resolver))).await;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = ClusterSnapshot::new(nodes, generation);
        debug!(
            generation,
            nodes = snapshot.len(),
            masters = snapshot.masters().count(),
            "observed cluster"
        );
        Ok(snapshot)
    }

    async fn observe_pod(&self, pod: &PodInfo, resolver: &MasterResolver) -> ObservedNode {
        let unknown = ObservedNode::new(&pod.name, NodeRole::Unknown).with_healthy(false);

        let Some(ip) = pod.ip.as_deref().filter(|_| pod.is_running()) else {
            debug!(pod = %pod.name, phase = ?pod.phase, "pod not running yet");
            return unknown;
        };
        let address = format!("{}:{}", ip, self.config.redis_port);

        match self.probe.get_role(&address).await {
            Ok(info) => {
                let mut node = ObservedNode::new(&pod.name, info.role)
                    .with_offset(info.offset)
                    .with_address(&address);
                node.master_ref = info
                    .master_address
                    .as_deref()
                    .and_then(|addr| resolver.resolve(addr));
                node
            }
            Err(e) => {
                debug!(pod = %pod.name, %address, error = %e, "probe failed");
                unknown.with_address(address)
            }
        }
    }
}

/// Maps a `host:port` master address back to a pod name.
struct MasterResolver {
    by_ip: HashMap<String, String>,
    names: Vec<String>,
    headless_service: String,
    fqdn: &'static Regex,
}

impl MasterResolver {
    fn new(pods: &[PodInfo], headless_service: &str) -> Self {
        Self {
            by_ip: pods
                .iter()
                .filter_map(|p| p.ip.clone().map(|ip| (ip, p.name.clone())))
                .collect(),
            names: pods.iter().map(|p| p.name.clone()).collect(),
            headless_service: headless_service.to_string(),
            fqdn: pod_fqdn_regex(),
        }
    }

    fn resolve(&self, address: &str) -> Option<String> {
        let host = address
            .rsplit_once(':')
            .map_or(address, |(host, _port)| host);

        if let Some(name) = self.by_ip.get(host) {
            return Some(name.clone());
        }
        if self.names.iter().any(|n| n == host) {
            return Some(host.to_string());
        }

        let caps = self.fqdn.captures(host)?;
        if caps.name("service")?.as_str() != self.headless_service {
            return None;
        }
        let pod = caps.name("pod")?.as_str();
        self.names.iter().find(|n| *n == pod).cloned()
    }
}
