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

use crate::domain::cluster::health::{evaluate, HealthMap, HealthMonitor};
use crate::domain::cluster::inspector::ClusterInspector;
use crate::domain::cluster::reconciler::{plan, Reconciler};
use crate::domain::cluster::validator::InstallValidator;
use crate::domain::config::{ClusterConf, KubernetesConfig};
use crate::domain::topology::{ClusterSnapshot, DesiredTopology, ReconcileAction};
use crate::infrastructure::constants::ANNOTATION_SLAVES_PER_MASTER;
use crate::infrastructure::kubernetes::resources::{
    ConfigMapBuilder, HeadlessServiceBuilder, RedisStatefulSetBuilder,
};
use crate::infrastructure::kubernetes::{
    ClusterPlatformClient, RedisKubeClient, RedisKubeClientImpl,
};
use crate::infrastructure::redis::{
    ClusterDriver, NodeRoleProbe, RedisClusterDriver, RespRoleProbe,
};
use crate::shared::error::{RedisKubeError, Result};
use backon::{BackoffBuilder, ExponentialBuilder};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Outcome of `converge`.
#[derive(Debug, Clone, Serialize)]
pub struct ConvergeReport {
    pub cycles: u32,
    pub converged: bool,
    pub actions: Vec<ReconcileAction>,
}

/// Everything `status` shows about one cluster.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterStatus {
    pub cluster_id: String,
    pub namespace: String,
    /// `None` when the StatefulSet does not exist.
    pub desired: Option<DesiredTopology>,
    pub snapshot: ClusterSnapshot,
    pub health: HealthMap,
    pub pending: Vec<ReconcileAction>,
}

/// Install, scale, check and uninstall one Redis cluster.
pub struct RedisClusterManager {
    client: Arc<dyn RedisKubeClient>,
    driver: Arc<dyn ClusterDriver>,
    reconciler: Arc<Reconciler>,
    config: KubernetesConfig,
    conf: ClusterConf,
}

impl RedisClusterManager {
    pub fn new(
        client: Arc<dyn RedisKubeClient>,
        platform: Arc<dyn ClusterPlatformClient>,
        probe: Arc<dyn NodeRoleProbe>,
        driver: Arc<dyn ClusterDriver>,
        config: KubernetesConfig,
        conf: ClusterConf,
    ) -> Self {
        let inspector = Arc::new(ClusterInspector::new(platform, probe, config.clone()));
        let reconciler = Arc::new(Reconciler::new(inspector, driver.clone()));
        Self {
            client,
            driver,
            reconciler,
            config,
            conf,
        }
    }

    /// Wires the manager to a live Kubernetes cluster.
    pub async fn connect(
        config: KubernetesConfig,
        conf: ClusterConf,
        kubeconfig_path: Option<String>,
        context: Option<String>,
        api_server: Option<String>,
    ) -> Result<Self> {
        let kube = Arc::new(
            RedisKubeClientImpl::new_with_config(
                config.namespace.clone(),
                kubeconfig_path,
                context,
                api_server,
            )
            .await?,
        );
        let probe = RespRoleProbe::new(&conf.probe);
        let driver = Arc::new(RedisClusterDriver::new(
            kube.clone(),
            probe.clone(),
            config.clone(),
        ));

        Ok(Self::new(
            kube.clone(),
            kube,
            Arc::new(probe),
            driver,
            config,
            conf,
        ))
    }

    pub fn config(&self) -> &KubernetesConfig {
        &self.config
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn health_monitor(&self) -> HealthMonitor {
        HealthMonitor::new(
            self.reconciler.inspector().clone(),
            self.conf.health.clone(),
        )
    }

    /// Creates the cluster resources and runs one reconcile cycle.
    pub async fn install(&self, desired: &DesiredTopology) -> Result<Vec<ReconcileAction>> {
        InstallValidator::new(self.client.as_ref())
            .validate(desired, &self.config)
            .await?;

        let sts_name = self.config.statefulset_name();
        match self.client.get_statefulset(&sts_name).await {
            Ok(_) => {
                return Err(RedisKubeError::already_exists(
                    "StatefulSet",
                    &sts_name,
                    &self.config.namespace,
                ))
            }
            Err(RedisKubeError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let configmap = ConfigMapBuilder::new(&self.config, &self.conf.redis)
            .with_password(self.conf.probe.password.as_deref())
            .build();
        self.client.apply_configmap(&configmap).await?;
        info!(name = %self.config.configmap_name(), "ConfigMap applied");

        let service = HeadlessServiceBuilder::new(&self.config).build();
        self.client.apply_service(&service).await?;
        info!(name = %self.config.headless_service_name(), "headless Service applied");

        let statefulset = RedisStatefulSetBuilder::new(&self.config, *desired).build()?;
        self.client.apply_statefulset(&statefulset).await?;
        info!(name = %sts_name, replicas = desired.replica_count, "StatefulSet applied");

        self.reconciler
            .apply_with_deadline(desired, self.conf.reconcile.apply_timeout())
            .await
    }

    /// The topology recorded on the StatefulSet at install or last scale.
    pub async fn stored_topology(&self) -> Result<DesiredTopology> {
        let sts = self
            .client
            .get_statefulset(&self.config.statefulset_name())
            .await?;

        let replicas = sts
            .spec
            .as_ref()
            .and_then(|s| s.replicas)
            .unwrap_or(0)
            .max(0) as u32;

        let stored = sts
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(ANNOTATION_SLAVES_PER_MASTER));
        let slaves_per_master = match stored.map(|v| v.parse::<i64>()) {
            Some(Ok(n)) => n,
            Some(Err(_)) | None => {
                warn!(
                    annotation = ANNOTATION_SLAVES_PER_MASTER,
                    "slaves per master not recorded, using configured value"
                );
                self.conf.topology.slaves_per_master
            }
        };

        Ok(DesiredTopology::new(replicas, slaves_per_master))
    }

    /// Changes the replica count, keeping the stored fan-out unless a new one is given.
    pub async fn scale(
        &self,
        new_replica_count: i64,
        slaves_per_master: Option<i64>,
    ) -> Result<Vec<ReconcileAction>> {
        let replica_count = u32::try_from(new_replica_count)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                RedisKubeError::invalid_topology(format!(
                    "replica_count must be >= 1, got {}",
                    new_replica_count
                ))
            })?;

        let stored = self.stored_topology().await?;
        let desired = DesiredTopology::new(
            replica_count,
            slaves_per_master.unwrap_or(stored.slaves_per_master),
        );
        desired.validate()?;

        if desired.slaves_per_master != stored.slaves_per_master {
            self.client
                .annotate_statefulset(
                    &self.config.statefulset_name(),
                    ANNOTATION_SLAVES_PER_MASTER,
                    &desired.slaves_per_master.to_string(),
                )
                .await?;
        }

        info!(from = %stored, to = %desired, "scaling cluster");
        self.reconciler
            .apply_with_deadline(&desired, self.conf.reconcile.apply_timeout())
            .await
    }

    /// One health evaluation without debounce history.
    pub async fn check_health(&self) -> Result<HealthMap> {
        let snapshot = self.reconciler.inspector().observe().await?;
        Ok(evaluate(&snapshot, self.conf.health.lag_threshold))
    }

    /// Removes every node, slaves before masters, then the cluster resources.
    ///
    /// The StatefulSet is deleted first with orphaned pods so that removed
    /// pods are not recreated.
    pub async fn uninstall(&self, delete_pvcs: bool) -> Result<Vec<ReconcileAction>> {
        let snapshot = self.reconciler.inspector().observe().await?;
        let actions = removal_order(&snapshot);

        self.client
            .delete_statefulset(&self.config.statefulset_name(), true)
            .await?;

        for action in &actions {
            self.driver.execute(action).await?;
        }

        self.client
            .delete_service(&self.config.headless_service_name())
            .await?;
        self.client
            .delete_configmap(&self.config.configmap_name())
            .await?;
        if delete_pvcs {
            self.client
                .delete_pvcs_for_cluster(&self.config.cluster_id)
                .await?;
        }

        info!(cluster = %self.config.cluster_id, removed = actions.len(), "cluster uninstalled");
        Ok(actions)
    }

    /// Repeats reconcile cycles until one plans nothing or `max_cycles` is reached.
    pub async fn converge(
        &self,
        desired: &DesiredTopology,
        max_cycles: u32,
        interval: Duration,
    ) -> Result<ConvergeReport> {
        let mut report = ConvergeReport {
            cycles: 0,
            converged: false,
            actions: Vec::new(),
        };

        while report.cycles < max_cycles {
            report.cycles += 1;
            let actions = self.apply_with_retry(desired).await?;
            if actions.is_empty() {
                report.converged = true;
                break;
            }
            report.actions.extend(actions);
            tokio::time::sleep(interval).await;
        }

        if !report.converged {
            warn!(cycles = report.cycles, "cluster did not converge");
        }
        Ok(report)
    }

    async fn apply_with_retry(&self, desired: &DesiredTopology) -> Result<Vec<ReconcileAction>> {
        let mut backoff = ExponentialBuilder::default()
            .with_max_times(self.conf.reconcile.retry_max_times)
            .build();

        loop {
            match self
                .reconciler
                .apply_with_deadline(desired, self.conf.reconcile.apply_timeout())
                .await
            {
                Err(e) if e.is_retryable() => match backoff.next() {
                    Some(delay) => {
                        warn!(error = %e, ?delay, "reconcile cycle failed, retrying");
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(e),
                },
                other => return other,
            }
        }
    }

    pub async fn status(&self) -> Result<ClusterStatus> {
        let desired = match self.stored_topology().await {
            Ok(desired) => Some(desired),
            Err(RedisKubeError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };

        let snapshot = self.reconciler.inspector().observe().await?;
        let health = evaluate(&snapshot, self.conf.health.lag_threshold);
        let pending = desired
            .map(|d| plan(&d, &snapshot))
            .unwrap_or_default();

        Ok(ClusterStatus {
            cluster_id: self.config.cluster_id.clone(),
            namespace: self.config.namespace.clone(),
            desired,
            snapshot,
            health,
            pending,
        })
    }
}

/// `RemoveNode` for every node: non-masters first, then masters, each in
/// descending id order.
pub fn removal_order(snapshot: &ClusterSnapshot) -> Vec<ReconcileAction> {
    let (masters, others): (Vec<_>, Vec<_>) =
        snapshot.nodes().iter().partition(|n| n.is_master());

    others
        .iter()
        .rev()
        .chain(masters.iter().rev())
        .map(|n| ReconcileAction::remove(&n.id))
        .collect()
}
