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

//! File based configuration for a managed Redis cluster

use crate::domain::config::kubernetes::{KubernetesConfig, StorageConfig};
use crate::domain::topology::DesiredTopology;
use crate::infrastructure::constants::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::read_to_string;
use std::time::Duration;

// ============================================================================
// Main cluster configuration
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConf {
    pub topology: TopologyConf,
    pub reconcile: ReconcileConf,
    pub health: HealthConf,
    pub probe: ProbeConf,
    pub redis: RedisServerConf,
    pub kubernetes: Option<KubernetesConf>,
}

impl ClusterConf {
    /// Load configuration from TOML file
    pub fn from<T: AsRef<str>>(path: T) -> anyhow::Result<Self> {
        let content = read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.as_ref(), e))?;

        let conf: Self =
            toml::from_str(&content).map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;

        Ok(conf)
    }

    pub fn desired_topology(&self) -> DesiredTopology {
        DesiredTopology::new(self.topology.replicas, self.topology.slaves_per_master)
    }

    /// Kubernetes settings from the `[kubernetes]` section over the defaults.
    pub fn kube_config(&self) -> KubernetesConfig {
        let mut config = KubernetesConfig::default();
        let Some(k) = self.kubernetes.as_ref() else {
            return config;
        };

        if let Some(ref id) = k.cluster_id {
            config.cluster_id = id.clone();
        }
        config.namespace = k.namespace.clone();
        config.image = k.image.clone();
        config.image_pull_policy = k.image_pull_policy.clone();
        config.image_pull_secrets = k.image_pull_secrets.clone();
        config.redis_port = k.port;
        config.node_selector = k.node_selector.clone();
        config.labels = k.labels.clone();
        config.annotations = k.annotations.clone();
        config.service_account = k.service_account.clone();
        config.pod_template = k.pod_template.clone();
        config.cluster_domain = k.cluster_domain.clone();
        if k.storage_class.is_some() || k.storage_size.is_some() {
            config.storage = Some(StorageConfig {
                storage_class: k.storage_class.clone(),
                size: k
                    .storage_size
                    .clone()
                    .unwrap_or_else(|| DEFAULT_STORAGE_SIZE.to_string()),
            });
        }
        config
    }
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConf {
    pub replicas: u32,
    pub slaves_per_master: i64,
}

impl Default for TopologyConf {
    fn default() -> Self {
        Self {
            replicas: 3,
            slaves_per_master: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConf {
    pub apply_timeout_secs: u64,
    pub converge_interval_secs: u64,
    pub max_cycles: u32,
    pub retry_max_times: usize,
}

impl Default for ReconcileConf {
    fn default() -> Self {
        Self {
            apply_timeout_secs: 60,
            converge_interval_secs: 5,
            max_cycles: 30,
            retry_max_times: 5,
        }
    }
}

impl ReconcileConf {
    pub fn apply_timeout(&self) -> Duration {
        Duration::from_secs(self.apply_timeout_secs)
    }

    pub fn converge_interval(&self) -> Duration {
        Duration::from_secs(self.converge_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConf {
    pub interval_secs: u64,
    /// Consecutive failed probes before a node is reported unhealthy.
    pub failure_threshold: u32,
    /// Maximum replication offset distance from the master, in bytes.
    pub lag_threshold: u64,
}

impl Default for HealthConf {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            failure_threshold: 3,
            lag_threshold: 1024 * 1024,
        }
    }
}

impl HealthConf {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConf {
    pub connect_timeout_ms: u64,
    pub io_timeout_ms: u64,
    pub password: Option<String>,
}

impl Default for ProbeConf {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 2000,
            io_timeout_ms: 3000,
            password: None,
        }
    }
}

impl ProbeConf {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

/// Settings rendered into the `redis.conf` mounted into every pod.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisServerConf {
    pub appendonly: bool,
    pub maxmemory: Option<String>,
    pub maxmemory_policy: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl Default for RedisServerConf {
    fn default() -> Self {
        Self {
            appendonly: true,
            maxmemory: None,
            maxmemory_policy: None,
            extra: BTreeMap::new(),
        }
    }
}

impl RedisServerConf {
    pub fn render(&self, port: u16, password: Option<&str>) -> String {
        let mut lines = vec![
            format!("port {}", port),
            "bind 0.0.0.0".to_string(),
            "protected-mode no".to_string(),
            format!("dir {}", REDIS_DATA_DIR),
            format!("appendonly {}", if self.appendonly { "yes" } else { "no" }),
        ];

        if let Some(ref maxmemory) = self.maxmemory {
            lines.push(format!("maxmemory {}", maxmemory));
        }
        if let Some(ref policy) = self.maxmemory_policy {
            lines.push(format!("maxmemory-policy {}", policy));
        }
        if let Some(password) = password {
            // slaves authenticate against their master with the same secret
            lines.push(format!("requirepass {}", password));
            lines.push(format!("masterauth {}", password));
        }
        for (key, value) in &self.extra {
            lines.push(format!("{} {}", key, value));
        }

        lines.join("\n") + "\n"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesConf {
    pub cluster_id: Option<String>,
    pub namespace: String,
    pub image: String,
    pub image_pull_policy: String,
    pub image_pull_secrets: Vec<String>,
    pub port: u16,
    pub storage_class: Option<String>,
    pub storage_size: Option<String>,
    pub node_selector: Option<HashMap<String, String>>,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    pub service_account: Option<String>,
    pub pod_template: Option<String>,
    pub cluster_domain: String,
}

impl Default for KubernetesConf {
    fn default() -> Self {
        Self {
            cluster_id: None,
            namespace: "default".to_string(),
            image: DEFAULT_REDIS_IMAGE.to_string(),
            image_pull_policy: "IfNotPresent".to_string(),
            image_pull_secrets: Vec::new(),
            port: REDIS_PORT,
            storage_class: None,
            storage_size: None,
            node_selector: None,
            labels: HashMap::new(),
            annotations: HashMap::new(),
            service_account: None,
            pod_template: None,
            cluster_domain: POD_CLUSTER_DOMAIN.to_string(),
        }
    }
}
