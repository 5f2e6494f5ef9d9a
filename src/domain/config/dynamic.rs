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

//! `-D key=value` overrides

use crate::domain::config::kubernetes::{KubernetesConfig, StorageConfig};
use crate::domain::config::redis::ClusterConf;
use crate::infrastructure::constants::DEFAULT_STORAGE_SIZE;
use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::{BTreeMap, HashMap};

/// Parse dynamic configuration properties from -D key=value format
pub fn parse_dynamic_configs(configs: &[String]) -> Result<HashMap<String, String>, String> {
    let mut map = HashMap::new();

    for config in configs {
        let parts: Vec<&str> = config.splitn(2, '=').collect();
        if parts.len() != 2 {
            return Err(format!(
                "Invalid config format: '{}'. Expected 'key=value'",
                config
            ));
        }

        let key = parts[0].trim();
        let value = parts[1].trim();

        if key.is_empty() {
            return Err(format!("Empty key in config: '{}'", config));
        }

        map.insert(key.to_string(), value.to_string());
    }

    Ok(map)
}

pub fn apply_to_kube_config(configs: &HashMap<String, String>, kube_config: &mut KubernetesConfig) {
    if let Some(image) = configs.get("kubernetes.image") {
        kube_config.image = image.clone();
    }

    if let Some(policy) = configs.get("kubernetes.image.pull-policy") {
        kube_config.image_pull_policy = policy.clone();
    }

    if let Some(secrets) = configs.get("kubernetes.image.pull-secrets") {
        kube_config.image_pull_secrets = secrets
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    if let Some(domain) = configs.get("kubernetes.cluster.domain") {
        kube_config.cluster_domain = domain.clone();
    }

    if let Some(port) = configs.get("kubernetes.redis.port") {
        if let Ok(port) = port.parse::<u16>() {
            kube_config.redis_port = port;
        }
    }

    if let Some(storage_class) = configs.get("kubernetes.storage.class") {
        kube_config
            .storage
            .get_or_insert_with(default_storage)
            .storage_class = Some(storage_class.clone());
    }

    if let Some(size) = configs.get("kubernetes.storage.size") {
        kube_config.storage.get_or_insert_with(default_storage).size = size.clone();
    }

    if let Some(template) = configs.get("kubernetes.pod-template") {
        kube_config.pod_template = Some(template.clone());
    }

    if let Some(cpu_str) = configs.get("kubernetes.cpu") {
        if let Ok(cpu_float) = cpu_str.parse::<f64>() {
            let cpu_milli = (cpu_float * 1000.0) as i32;
            set_resource(kube_config, "cpu", Quantity(format!("{}m", cpu_milli)));
        }
    }

    if let Some(mem_str) = configs.get("kubernetes.memory") {
        set_resource(kube_config, "memory", Quantity(mem_str.clone()));
    }

    if let Some(selector_str) = configs.get("kubernetes.node-selector") {
        let selectors = parse_key_value_pairs(selector_str);
        if !selectors.is_empty() {
            kube_config.node_selector = Some(selectors);
        }
    }

    if let Some(labels_str) = configs.get("kubernetes.labels") {
        kube_config.labels.extend(parse_key_value_pairs(labels_str));
    }

    if let Some(annotations_str) = configs.get("kubernetes.annotations") {
        kube_config
            .annotations
            .extend(parse_key_value_pairs(annotations_str));
    }

    if let Some(sa) = configs.get("kubernetes.service-account") {
        kube_config.service_account = Some(sa.clone());
    }
}

/// Overrides for the reconcile and health sections.
pub fn apply_to_cluster_conf(configs: &HashMap<String, String>, conf: &mut ClusterConf) {
    if let Some(v) = configs.get("health.interval-secs").and_then(|v| v.parse().ok()) {
        conf.health.interval_secs = v;
    }

    if let Some(v) = configs
        .get("health.failure-threshold")
        .and_then(|v| v.parse().ok())
    {
        conf.health.failure_threshold = v;
    }

    if let Some(v) = configs.get("health.lag-threshold").and_then(|v| v.parse().ok()) {
        conf.health.lag_threshold = v;
    }

    if let Some(v) = configs
        .get("reconcile.apply-timeout-secs")
        .and_then(|v| v.parse().ok())
    {
        conf.reconcile.apply_timeout_secs = v;
    }

    if let Some(v) = configs
        .get("reconcile.max-cycles")
        .and_then(|v| v.parse().ok())
    {
        conf.reconcile.max_cycles = v;
    }

    if let Some(password) = configs.get("probe.password") {
        conf.probe.password = Some(password.clone());
    }
}

fn default_storage() -> StorageConfig {
    StorageConfig {
        storage_class: None,
        size: DEFAULT_STORAGE_SIZE.to_string(),
    }
}

fn set_resource(kube_config: &mut KubernetesConfig, name: &str, quantity: Quantity) {
    let resources = kube_config
        .resources
        .get_or_insert_with(ResourceRequirements::default);

    resources
        .requests
        .get_or_insert_with(BTreeMap::new)
        .insert(name.to_string(), quantity.clone());
    resources
        .limits
        .get_or_insert_with(BTreeMap::new)
        .insert(name.to_string(), quantity);
}

fn parse_key_value_pairs(input: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for pair in input.split(',') {
        let parts: Vec<&str> = pair.splitn(2, '=').collect();
        if parts.len() == 2 {
            map.insert(parts[0].trim().to_string(), parts[1].trim().to_string());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[&str]) -> HashMap<String, String> {
        parse_dynamic_configs(&pairs.iter().map(|s| s.to_string()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn test_parse_dynamic_configs_rejects_bad_format() {
        assert!(parse_dynamic_configs(&["novalue".to_string()]).is_err());
        assert!(parse_dynamic_configs(&["=x".to_string()]).is_err());

        let map = props(&["kubernetes.labels=team=cache,tier=data"]);
        assert_eq!(map["kubernetes.labels"], "team=cache,tier=data");
    }

    #[test]
    fn test_apply_to_kube_config() {
        let mut config = KubernetesConfig::default();
        apply_to_kube_config(
            &props(&[
                "kubernetes.image=redis:7.4",
                "kubernetes.storage.size=20Gi",
                "kubernetes.cpu=0.5",
                "kubernetes.memory=512Mi",
                "kubernetes.node-selector=disk=ssd",
                "kubernetes.labels=team=cache",
            ]),
            &mut config,
        );

        assert_eq!(config.image, "redis:7.4");
        assert_eq!(config.storage.as_ref().unwrap().size, "20Gi");
        let requests = config.resources.as_ref().unwrap().requests.as_ref().unwrap();
        assert_eq!(requests["cpu"], Quantity("500m".to_string()));
        assert_eq!(requests["memory"], Quantity("512Mi".to_string()));
        assert_eq!(config.node_selector.unwrap()["disk"], "ssd");
        assert_eq!(config.labels["team"], "cache");
    }

    #[test]
    fn test_apply_to_cluster_conf() {
        let mut conf = ClusterConf::default();
        apply_to_cluster_conf(
            &props(&["health.failure-threshold=7", "health.lag-threshold=oops"]),
            &mut conf,
        );
        assert_eq!(conf.health.failure_threshold, 7);
        assert_eq!(conf.health.lag_threshold, 1024 * 1024);
    }
}
