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

use crate::domain::topology::replicas_to_i32;
use crate::infrastructure::constants::{FIELD_MANAGER, LABEL_APP};
use crate::shared::error::RedisKubeError;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Pod, Service};
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde_json::json;
use std::collections::BTreeMap;

/// A pod of the cluster as reported by the orchestration platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodInfo {
    pub name: String,
    pub ip: Option<String>,
    pub phase: Option<String>,
}

impl PodInfo {
    pub fn new(name: impl Into<String>, ip: Option<String>) -> Self {
        Self {
            name: name.into(),
            ip,
            phase: Some("Running".to_string()),
        }
    }

    pub fn from_pod(pod: &Pod) -> Option<Self> {
        let name = pod.metadata.name.clone()?;
        let status = pod.status.as_ref();

        Some(Self {
            name,
            ip: status.and_then(|s| s.pod_ip.clone()),
            phase: status.and_then(|s| s.phase.clone()),
        })
    }

    pub fn is_running(&self) -> bool {
        self.phase.as_deref() == Some("Running")
    }
}

/// The slice of the platform API the reconciliation core consumes.
#[async_trait::async_trait]
pub trait ClusterPlatformClient: Send + Sync {
    async fn list_pods(
        &self,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<PodInfo>, RedisKubeError>;

    async fn scale_statefulset(&self, name: &str, replicas: u32) -> Result<(), RedisKubeError>;

    /// Deleting a pod that is already gone succeeds.
    async fn delete_pod(&self, name: &str) -> Result<(), RedisKubeError>;
}

/// Resource management used by install and uninstall.
#[async_trait::async_trait]
pub trait RedisKubeClient: Send + Sync {
    async fn apply_configmap(&self, configmap: &ConfigMap) -> Result<(), RedisKubeError>;

    async fn apply_service(&self, service: &Service) -> Result<(), RedisKubeError>;

    async fn apply_statefulset(&self, statefulset: &StatefulSet) -> Result<(), RedisKubeError>;

    async fn get_statefulset(&self, name: &str) -> Result<StatefulSet, RedisKubeError>;

    async fn annotate_statefulset(
        &self,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), RedisKubeError>;

    /// With `orphan` the pods outlive their StatefulSet.
    async fn delete_statefulset(&self, name: &str, orphan: bool) -> Result<(), RedisKubeError>;

    async fn delete_service(&self, name: &str) -> Result<(), RedisKubeError>;

    async fn delete_configmap(&self, name: &str) -> Result<(), RedisKubeError>;

    async fn delete_pvcs_for_cluster(&self, cluster_id: &str) -> Result<(), RedisKubeError>;

    async fn list_storage_classes(&self) -> Result<Vec<String>, RedisKubeError>;
}

pub struct RedisKubeClientImpl {
    client: Client,
    namespace: String,
}

impl RedisKubeClientImpl {
    pub async fn new(namespace: String) -> Result<Self, RedisKubeError> {
        let client = Client::try_default().await.map_err(|e| {
            RedisKubeError::KubeApi(format!("Failed to create Kubernetes client: {}", e))
        })?;

        Ok(Self { client, namespace })
    }

    pub async fn new_with_config(
        namespace: String,
        kubeconfig_path: Option<String>,
        context: Option<String>,
        api_server: Option<String>,
    ) -> Result<Self, RedisKubeError> {
        use kube::config::{KubeConfigOptions, Kubeconfig};

        let kubeconfig = if let Some(path) = kubeconfig_path {
            Kubeconfig::read_from(path)
                .map_err(|e| RedisKubeError::KubeApi(format!("Failed to load kubeconfig: {}", e)))?
        } else {
            Kubeconfig::read()
                .map_err(|e| RedisKubeError::KubeApi(format!("Failed to load kubeconfig: {}", e)))?
        };

        let config_options = KubeConfigOptions {
            context,
            cluster: None,
            user: None,
        };

        let mut config = kube::Config::from_custom_kubeconfig(kubeconfig, &config_options)
            .await
            .map_err(|e| {
                RedisKubeError::KubeApi(format!("Failed to create Kubernetes config: {}", e))
            })?;

        if let Some(server) = api_server {
            config.cluster_url = server.parse().map_err(|e| {
                RedisKubeError::config_error(format!("Invalid api server address {}: {}", server, e))
            })?;
        }

        let client = Client::try_from(config).map_err(|e| {
            RedisKubeError::KubeApi(format!("Failed to create Kubernetes client: {}", e))
        })?;

        Ok(Self { client, namespace })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn api<K>(&self) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    async fn apply_named<K>(&self, kind: &str, resource: &K) -> Result<(), RedisKubeError>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + serde::Serialize
            + serde::de::DeserializeOwned
            + std::fmt::Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let api: Api<K> = self.api();
        let name = resource
            .meta()
            .name
            .as_ref()
            .ok_or_else(|| RedisKubeError::config_error(format!("{} name is required", kind)))?;

        match api.get(name).await {
            Ok(_) => {
                let patch_params = PatchParams::apply(FIELD_MANAGER).force();
                let patch = serde_json::to_value(resource).map_err(|e| {
                    RedisKubeError::KubeApi(format!("Failed to serialize {}: {}", kind, e))
                })?;
                api.patch(name, &patch_params, &Patch::Apply(patch)).await?;
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                api.create(&PostParams::default(), resource).await?;
            }
            Err(e) => return Err(RedisKubeError::KubeApi(e.to_string())),
        }
        Ok(())
    }

    async fn delete_named<K>(&self, name: &str, dp: &DeleteParams) -> Result<(), RedisKubeError>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + serde::de::DeserializeOwned
            + std::fmt::Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let api: Api<K> = self.api();
        match api.delete(name, dp).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait::async_trait]
impl ClusterPlatformClient for RedisKubeClientImpl {
    async fn list_pods(
        &self,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<PodInfo>, RedisKubeError> {
        let api: Api<Pod> = self.api();
        let label_selector = selector
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");

        let lp = ListParams::default().labels(&label_selector);
        let pods = api.list(&lp).await?;

        Ok(pods.items.iter().filter_map(PodInfo::from_pod).collect())
    }

    async fn scale_statefulset(&self, name: &str, replicas: u32) -> Result<(), RedisKubeError> {
        let replicas = replicas_to_i32(replicas)?;
        let api: Api<StatefulSet> = self.api();
        let patch = json!({ "spec": { "replicas": replicas } });

        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| match e {
                kube::Error::Api(ae) if ae.code == 404 => {
                    RedisKubeError::not_found("StatefulSet", name, &self.namespace)
                }
                other => other.into(),
            })?;
        Ok(())
    }

    async fn delete_pod(&self, name: &str) -> Result<(), RedisKubeError> {
        self.delete_named::<Pod>(name, &DeleteParams::default())
            .await
    }
}

#[async_trait::async_trait]
impl RedisKubeClient for RedisKubeClientImpl {
    async fn apply_configmap(&self, configmap: &ConfigMap) -> Result<(), RedisKubeError> {
        self.apply_named("ConfigMap", configmap).await
    }

    async fn apply_service(&self, service: &Service) -> Result<(), RedisKubeError> {
        self.apply_named("Service", service).await
    }

    async fn apply_statefulset(&self, statefulset: &StatefulSet) -> Result<(), RedisKubeError> {
        let api: Api<StatefulSet> = self.api();
        let name = statefulset.metadata.name.as_ref().ok_or_else(|| {
            RedisKubeError::ConfigError("StatefulSet name is required".to_string())
        })?;

        if let Ok(existing) = api.get(name).await {
            let existing_pvcs = existing
                .spec
                .as_ref()
                .and_then(|s| s.volume_claim_templates.as_ref());
            let new_pvcs = statefulset
                .spec
                .as_ref()
                .and_then(|s| s.volume_claim_templates.as_ref());

            if let (Some(existing), Some(new)) = (existing_pvcs, new_pvcs) {
                let names = |pvcs: &Vec<PersistentVolumeClaim>| {
                    pvcs.iter()
                        .map(|p| p.metadata.name.clone())
                        .collect::<Vec<_>>()
                };
                if names(existing) != names(new) {
                    return Err(RedisKubeError::ConfigError(
                        "StatefulSet volumeClaimTemplates cannot be changed. Please uninstall and reinstall the cluster.".to_string()
                    ));
                }
            }
        }

        self.apply_named("StatefulSet", statefulset).await
    }

    async fn get_statefulset(&self, name: &str) -> Result<StatefulSet, RedisKubeError> {
        let api: Api<StatefulSet> = self.api();
        api.get(name).await.map_err(|e| {
            if let kube::Error::Api(ae) = e {
                if ae.code == 404 {
                    RedisKubeError::not_found("StatefulSet", name, &self.namespace)
                } else {
                    RedisKubeError::KubeApi(ae.message)
                }
            } else {
                RedisKubeError::KubeApi(e.to_string())
            }
        })
    }

    async fn annotate_statefulset(
        &self,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), RedisKubeError> {
        let api: Api<StatefulSet> = self.api();
        let patch = json!({ "metadata": { "annotations": { key: value } } });

        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn delete_statefulset(&self, name: &str, orphan: bool) -> Result<(), RedisKubeError> {
        let dp = if orphan {
            DeleteParams::orphan()
        } else {
            DeleteParams::default()
        };
        self.delete_named::<StatefulSet>(name, &dp).await
    }

    async fn delete_service(&self, name: &str) -> Result<(), RedisKubeError> {
        self.delete_named::<Service>(name, &DeleteParams::default())
            .await
    }

    async fn delete_configmap(&self, name: &str) -> Result<(), RedisKubeError> {
        self.delete_named::<ConfigMap>(name, &DeleteParams::default())
            .await
    }

    async fn delete_pvcs_for_cluster(&self, cluster_id: &str) -> Result<(), RedisKubeError> {
        let api: Api<PersistentVolumeClaim> = self.api();
        let dp = DeleteParams::default();

        let lp = ListParams::default().labels(&format!("{}={}", LABEL_APP, cluster_id));
        let pvcs = api.list(&lp).await?;

        for pvc in pvcs.items {
            if let Some(name) = pvc.metadata.name.as_ref() {
                if let Err(e) = api.delete(name, &dp).await {
                    tracing::warn!(pvc = %name, error = %e, "failed to delete PVC");
                }
            }
        }

        Ok(())
    }

    async fn list_storage_classes(&self) -> Result<Vec<String>, RedisKubeError> {
        let api: Api<StorageClass> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await.map_err(|e| {
            RedisKubeError::KubeApi(format!("Failed to list StorageClasses: {}", e))
        })?;

        Ok(list
            .items
            .iter()
            .filter_map(|sc| sc.metadata.name.clone())
            .collect())
    }
}
