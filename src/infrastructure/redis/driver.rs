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
use crate::domain::topology::ReconcileAction;
use crate::infrastructure::kubernetes::ClusterPlatformClient;
use crate::infrastructure::redis::probe::RespRoleProbe;
use crate::shared::error::{RedisKubeError, Result};
use std::sync::Arc;
use tracing::info;

/// Carries out one reconcile action against the cluster.
///
/// Executing an action that already holds is a no-op.
#[async_trait::async_trait]
pub trait ClusterDriver: Send + Sync {
    async fn execute(&self, action: &ReconcileAction) -> Result<()>;
}

pub struct RedisClusterDriver {
    platform: Arc<dyn ClusterPlatformClient>,
    probe: RespRoleProbe,
    config: KubernetesConfig,
}

impl RedisClusterDriver {
    pub fn new(
        platform: Arc<dyn ClusterPlatformClient>,
        probe: RespRoleProbe,
        config: KubernetesConfig,
    ) -> Self {
        Self {
            platform,
            probe,
            config,
        }
    }

    async fn node_address(&self, node_id: &str) -> Result<String> {
        let pods = self
            .platform
            .list_pods(&self.config.selector_labels())
            .await?;

        pods.into_iter()
            .find(|p| p.name == node_id)
            .and_then(|p| p.ip)
            .map(|ip| format!("{}:{}", ip, self.config.redis_port))
            .ok_or_else(|| {
                RedisKubeError::not_found("Pod address", node_id, &self.config.namespace)
            })
    }

    async fn replicaof(&self, node_id: &str, host: &str, port: &str) -> Result<()> {
        let address = self.node_address(node_id).await?;
        let mut conn = self.probe.open(&address).await?;
        conn.command(&["REPLICAOF", host, port]).await?;
        Ok(())
    }

    async fn dispatch(&self, action: &ReconcileAction) -> Result<()> {
        match action {
            ReconcileAction::ScaleTo(replicas) => {
                self.platform
                    .scale_statefulset(&self.config.statefulset_name(), *replicas)
                    .await
            }
            ReconcileAction::PromoteToMaster(node_id) => {
                self.replicaof(node_id, "NO", "ONE").await
            }
            ReconcileAction::AttachSlave(node_id, master_id) => {
                let master_host = self.config.pod_fqdn(master_id);
                let port = self.config.redis_port.to_string();
                self.replicaof(node_id, &master_host, &port).await
            }
            ReconcileAction::RemoveNode(node_id) => self.platform.delete_pod(node_id).await,
        }
    }
}

#[async_trait::async_trait]
impl ClusterDriver for RedisClusterDriver {
    async fn execute(&self, action: &ReconcileAction) -> Result<()> {
        info!(%action, "executing");
        self.dispatch(action)
            .await
            .map_err(|e| RedisKubeError::driver(action.clone(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::ProbeConf;
    use crate::infrastructure::kubernetes::PodInfo;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct RecordingPlatform {
        pods: Vec<PodInfo>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ClusterPlatformClient for RecordingPlatform {
        async fn list_pods(&self, _selector: &BTreeMap<String, String>) -> Result<Vec<PodInfo>> {
            Ok(self.pods.clone())
        }

        async fn scale_statefulset(&self, name: &str, replicas: u32) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("scale {} {}", name, replicas));
            Ok(())
        }

        async fn delete_pod(&self, name: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("delete {}", name));
            Ok(())
        }
    }

    fn driver(platform: Arc<RecordingPlatform>, port: u16) -> RedisClusterDriver {
        let mut config = KubernetesConfig::new("cache", "prod");
        config.redis_port = port;
        RedisClusterDriver::new(platform, RespRoleProbe::new(&ProbeConf::default()), config)
    }

    #[tokio::test]
    async fn test_scale_and_remove_go_to_platform() {
        let platform = Arc::new(RecordingPlatform::default());
        let driver = driver(platform.clone(), 6379);

        driver.execute(&ReconcileAction::ScaleTo(5)).await.unwrap();
        driver.execute(&ReconcileAction::remove("cache-4")).await.unwrap();

        assert_eq!(
            *platform.calls.lock().unwrap(),
            vec!["scale cache 5".to_string(), "delete cache-4".to_string()]
        );
    }

    #[tokio::test]
    async fn test_attach_sends_replicaof_with_master_fqdn() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(b"+OK\r\n").await.unwrap();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });

        let platform = Arc::new(RecordingPlatform {
            pods: vec![PodInfo::new("cache-1", Some("127.0.0.1".to_string()))],
            ..Default::default()
        });
        driver(platform, port)
            .execute(&ReconcileAction::attach("cache-1", "cache-0"))
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.contains("REPLICAOF"));
        assert!(request.contains("cache-0.cache-headless.prod.svc.cluster.local"));
    }

    #[tokio::test]
    async fn test_unknown_node_is_a_driver_error() {
        let platform = Arc::new(RecordingPlatform::default());
        let err = driver(platform, 6379)
            .execute(&ReconcileAction::promote("cache-9"))
            .await
            .unwrap_err();

        match err {
            RedisKubeError::DriverExecutionError { action, .. } => {
                assert_eq!(action, ReconcileAction::promote("cache-9"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
