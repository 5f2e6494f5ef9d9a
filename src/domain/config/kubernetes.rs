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

use crate::infrastructure::constants::*;
use crate::shared::error::RedisKubeError;
use k8s_openapi::api::core::v1::ResourceRequirements;
use std::collections::{BTreeMap, HashMap};

/// Where and how the Redis StatefulSet runs.
#[derive(Debug, Clone)]
pub struct KubernetesConfig {
    pub cluster_id: String,
    pub namespace: String,
    pub image: String,
    pub image_pull_policy: String,
    pub image_pull_secrets: Vec<String>,
    pub redis_port: u16,
    pub resources: Option<ResourceRequirements>,
    pub node_selector: Option<HashMap<String, String>>,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    pub service_account: Option<String>,
    pub pod_template: Option<String>,
    pub storage: Option<StorageConfig>,
    pub cluster_domain: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub storage_class: Option<String>,
    pub size: String,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            cluster_id: DEFAULT_CLUSTER_ID.to_string(),
            namespace: "default".to_string(),
            image: DEFAULT_REDIS_IMAGE.to_string(),
            image_pull_policy: "IfNotPresent".to_string(),
            image_pull_secrets: Vec::new(),
            redis_port: REDIS_PORT,
            resources: None,
            node_selector: None,
            labels: HashMap::new(),
            annotations: HashMap::new(),
            service_account: None,
            pod_template: None,
            storage: None,
            cluster_domain: POD_CLUSTER_DOMAIN.to_string(),
        }
    }
}

impl KubernetesConfig {
    pub fn new(cluster_id: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn statefulset_name(&self) -> String {
        self.cluster_id.clone()
    }

    pub fn headless_service_name(&self) -> String {
        format!("{}{}", self.cluster_id, SERVICE_SUFFIX_HEADLESS)
    }

    pub fn configmap_name(&self) -> String {
        format!("{}{}", self.cluster_id, SERVICE_SUFFIX_CONFIG)
    }

    /// Stable DNS name of a StatefulSet pod behind the headless service.
    pub fn pod_fqdn(&self, pod_name: &str) -> String {
        format!(
            "{}.{}.{}.svc.{}",
            pod_name,
            self.headless_service_name(),
            self.namespace,
            self.cluster_domain
        )
    }

    /// Labels every pod of this cluster carries; used as the pod list selector.
    pub fn selector_labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_APP.to_string(), self.cluster_id.clone());
        labels.insert(LABEL_COMPONENT.to_string(), COMPONENT_REDIS.to_string());
        labels
    }

    pub fn validate(&self) -> Result<(), RedisKubeError> {
        if !is_valid_k8s_name(&self.cluster_id) {
            return Err(RedisKubeError::ConfigError(format!(
                "Invalid cluster_id: {}",
                self.cluster_id
            )));
        }

        // StatefulSet pod names append "-<ordinal>" and must fit a 63 char label
        if self.cluster_id.len() > 52 {
            return Err(RedisKubeError::ConfigError(format!(
                "cluster_id too long (max 52 chars): {}",
                self.cluster_id
            )));
        }

        if !is_valid_k8s_name(&self.namespace) {
            return Err(RedisKubeError::ConfigError(format!(
                "Invalid namespace: {}",
                self.namespace
            )));
        }

        if self.redis_port == 0 {
            return Err(RedisKubeError::ConfigError(
                "redis port must be > 0".to_string(),
            ));
        }

        if self.image.trim().is_empty() {
            return Err(RedisKubeError::ConfigError(
                "image must not be empty".to_string(),
            ));
        }

        let valid_policies = ["Always", "IfNotPresent", "Never"];
        if !valid_policies.contains(&self.image_pull_policy.as_str()) {
            return Err(RedisKubeError::ConfigError(format!(
                "Invalid image_pull_policy: {}",
                self.image_pull_policy
            )));
        }

        Ok(())
    }
}

pub(crate) fn is_valid_k8s_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 253 {
        return false;
    }

    if !name.chars().next().unwrap_or(' ').is_ascii_alphanumeric() {
        return false;
    }
    if !name.chars().last().unwrap_or(' ').is_ascii_alphanumeric() {
        return false;
    }

    name.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_names() {
        let config = KubernetesConfig::new("cache", "prod");
        assert_eq!(config.statefulset_name(), "cache");
        assert_eq!(config.headless_service_name(), "cache-headless");
        assert_eq!(config.configmap_name(), "cache-config");
        assert_eq!(
            config.pod_fqdn("cache-0"),
            "cache-0.cache-headless.prod.svc.cluster.local"
        );
    }

    #[test]
    fn test_validate() {
        assert!(KubernetesConfig::default().validate().is_ok());

        let mut config = KubernetesConfig::new("Bad_Name", "default");
        assert!(config.validate().is_err());

        config.cluster_id = "ok".to_string();
        config.image_pull_policy = "Sometimes".to_string();
        assert!(config.validate().is_err());

        config.image_pull_policy = "Always".to_string();
        config.redis_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_valid_k8s_name() {
        assert!(is_valid_k8s_name("redis-cluster"));
        assert!(is_valid_k8s_name("r1"));
        assert!(!is_valid_k8s_name("-redis"));
        assert!(!is_valid_k8s_name("redis-"));
        assert!(!is_valid_k8s_name("Redis"));
        assert!(!is_valid_k8s_name(""));
    }
}
