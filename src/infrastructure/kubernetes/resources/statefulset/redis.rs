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
use crate::domain::topology::DesiredTopology;
use crate::infrastructure::constants::*;
use crate::infrastructure::kubernetes::resources::pod::{
    load_pod_from_template_file, merge_pod_with_template, EnvironmentBuilder,
};
use crate::shared::error::Result;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, KeyToPath,
    LocalObjectReference, PersistentVolumeClaim, PersistentVolumeClaimSpec, Pod, PodSpec,
    PodTemplateSpec, Probe, TCPSocketAction, Volume, VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

/// Builds the single StatefulSet that runs every Redis node of a cluster.
///
/// All pods start from the same spec; which of them serve as masters is
/// decided at runtime by the reconciler, not by the pod template.
pub struct RedisStatefulSetBuilder<'a> {
    config: &'a KubernetesConfig,
    desired: DesiredTopology,
}

impl<'a> RedisStatefulSetBuilder<'a> {
    pub fn new(config: &'a KubernetesConfig, desired: DesiredTopology) -> Self {
        Self { config, desired }
    }

    pub fn build(&self) -> Result<StatefulSet> {
        let template_pod = match self.config.pod_template {
            Some(ref template_file) => Some(load_pod_from_template_file(
                template_file,
                CONTAINER_NAME_REDIS,
            )?),
            None => None,
        };

        let final_pod = merge_pod_with_template(
            template_pod,
            self.build_base_pod(),
            self.build_volumes(),
            self.build_volume_mounts(),
            self.get_pod_labels(),
        )?;

        let replicas = self.desired.statefulset_replicas()?;

        let mut annotations = BTreeMap::new();
        annotations.insert(
            ANNOTATION_SLAVES_PER_MASTER.to_string(),
            self.desired.slaves_per_master.to_string(),
        );

        Ok(StatefulSet {
            metadata: ObjectMeta {
                name: Some(self.config.statefulset_name()),
                namespace: Some(self.config.namespace.clone()),
                labels: Some(self.get_labels()),
                annotations: Some(annotations),
                ..Default::default()
            },
            spec: Some(StatefulSetSpec {
                replicas: Some(replicas),
                service_name: self.config.headless_service_name(),
                selector: LabelSelector {
                    match_labels: Some(self.config.selector_labels()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(final_pod.metadata),
                    spec: final_pod.spec,
                },
                volume_claim_templates: self.build_volume_claim_templates(),
                pod_management_policy: Some(POD_MANAGEMENT_POLICY_PARALLEL.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn build_base_pod(&self) -> Pod {
        let port = i32::from(self.config.redis_port);
        let tcp_probe = |initial_delay: Option<i32>, period: i32| Probe {
            tcp_socket: Some(TCPSocketAction {
                port: IntOrString::Int(port),
                ..Default::default()
            }),
            initial_delay_seconds: initial_delay,
            period_seconds: Some(period),
            timeout_seconds: Some(LIVENESS_TIMEOUT),
            failure_threshold: Some(LIVENESS_FAILURE_THRESHOLD),
            ..Default::default()
        };

        let container = Container {
            name: CONTAINER_NAME_REDIS.to_string(),
            image: Some(self.config.image.clone()),
            image_pull_policy: Some(self.config.image_pull_policy.clone()),
            command: Some(vec![
                "redis-server".to_string(),
                REDIS_CONF_FILE.to_string(),
            ]),
            env: Some(EnvironmentBuilder::new(self.config).build()),
            ports: Some(vec![ContainerPort {
                container_port: port,
                name: Some(PORT_NAME_REDIS.to_string()),
                ..Default::default()
            }]),
            liveness_probe: Some(tcp_probe(Some(LIVENESS_INITIAL_DELAY), LIVENESS_PERIOD)),
            readiness_probe: Some(tcp_probe(None, READINESS_PERIOD)),
            resources: self.config.resources.clone(),
            ..Default::default()
        };

        let annotations = if self.config.annotations.is_empty() {
            None
        } else {
            Some(self.config.annotations.clone().into_iter().collect())
        };

        let image_pull_secrets = if self.config.image_pull_secrets.is_empty() {
            None
        } else {
            Some(
                self.config
                    .image_pull_secrets
                    .iter()
                    .map(|name| LocalObjectReference { name: name.clone() })
                    .collect(),
            )
        };

        Pod {
            metadata: ObjectMeta {
                labels: Some(self.get_pod_labels()),
                annotations,
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![container],
                node_selector: self
                    .config
                    .node_selector
                    .as_ref()
                    .map(|hm| hm.clone().into_iter().collect()),
                service_account_name: self.config.service_account.clone(),
                image_pull_secrets,
                termination_grace_period_seconds: Some(TERMINATION_GRACE_PERIOD),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn build_volumes(&self) -> Vec<Volume> {
        let mut volumes = vec![Volume {
            name: VOLUME_NAME_CONFIG.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: self.config.configmap_name(),
                default_mode: Some(CONFIG_FILE_MODE),
                items: Some(vec![KeyToPath {
                    key: CONFIG_FILE_NAME.to_string(),
                    path: CONFIG_FILE_NAME.to_string(),
                    mode: Some(CONFIG_FILE_MODE),
                }]),
                optional: Some(false),
            }),
            ..Default::default()
        }];

        // without persistent storage the data dir lives as long as the pod
        if self.config.storage.is_none() {
            volumes.push(Volume {
                name: VOLUME_NAME_DATA.to_string(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            });
        }

        volumes
    }

    fn build_volume_mounts(&self) -> Vec<VolumeMount> {
        vec![
            VolumeMount {
                name: VOLUME_NAME_CONFIG.to_string(),
                mount_path: REDIS_CONF_DIR.to_string(),
                read_only: Some(true),
                ..Default::default()
            },
            VolumeMount {
                name: VOLUME_NAME_DATA.to_string(),
                mount_path: REDIS_DATA_DIR.to_string(),
                read_only: Some(false),
                ..Default::default()
            },
        ]
    }

    fn build_volume_claim_templates(&self) -> Option<Vec<PersistentVolumeClaim>> {
        let storage = self.config.storage.as_ref()?;

        let mut requests = BTreeMap::new();
        requests.insert("storage".to_string(), Quantity(storage.size.clone()));

        Some(vec![PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(VOLUME_NAME_DATA.to_string()),
                labels: Some(self.get_labels()),
                ..Default::default()
            },
            spec: Some(PersistentVolumeClaimSpec {
                access_modes: Some(vec![DEFAULT_ACCESS_MODE.to_string()]),
                storage_class_name: storage.storage_class.clone(),
                resources: Some(VolumeResourceRequirements {
                    requests: Some(requests),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            status: None,
        }])
    }

    pub fn get_labels(&self) -> BTreeMap<String, String> {
        let mut labels = self.config.selector_labels();
        labels.insert(LABEL_TYPE.to_string(), LABEL_TYPE_VALUE.to_string());
        labels
    }

    fn get_pod_labels(&self) -> BTreeMap<String, String> {
        let mut labels = self.get_labels();
        for (k, v) in &self.config.labels {
            labels.insert(k.clone(), v.clone());
        }
        labels
    }
}
