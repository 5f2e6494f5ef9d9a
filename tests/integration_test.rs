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

#[cfg(test)]
mod tests {
    use redis_kube::domain::config::ClusterConf;
    use redis_kube::*;
    use std::time::Duration;

    fn create_test_kube_config() -> KubernetesConfig {
        let mut config = KubernetesConfig::new("it-redis", "default");
        config.image = "docker.io/redis:7.2".to_string();
        config
    }

    fn create_test_cluster_conf() -> ClusterConf {
        let mut conf = ClusterConf::default();
        conf.reconcile.converge_interval_secs = 3;
        conf.reconcile.max_cycles = 40;
        conf
    }

    #[test]
    fn test_config_validation() {
        let config = create_test_kube_config();
        assert!(config.validate().is_ok());

        let mut invalid_config = config.clone();
        invalid_config.cluster_id = "Invalid_Cluster".to_string();
        assert!(invalid_config.validate().is_err());
    }

    #[test]
    fn test_builders_agree_on_names() {
        let config = create_test_kube_config();
        let conf = create_test_cluster_conf();

        let configmap = ConfigMapBuilder::new(&config, &conf.redis).build();
        assert_eq!(configmap.metadata.name.as_deref(), Some("it-redis-config"));

        let service = HeadlessServiceBuilder::new(&config).build();
        assert_eq!(service.metadata.name.as_deref(), Some("it-redis-headless"));

        let statefulset = RedisStatefulSetBuilder::new(&config, DesiredTopology::new(3, 2))
            .build()
            .expect("Failed to build StatefulSet");
        let spec = statefulset.spec.as_ref().unwrap();
        assert_eq!(spec.replicas, Some(3));
        assert_eq!(spec.service_name, "it-redis-headless");
    }

    #[tokio::test]
    #[ignore] // Requires Kubernetes cluster
    async fn test_client_creation() {
        let client = RedisKubeClientImpl::new("default".to_string())
            .await
            .expect("Failed to create client");
        assert!(!client
            .list_storage_classes()
            .await
            .expect("Failed to list storage classes")
            .is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires Kubernetes cluster and network access to pod IPs
    async fn test_install_scale_uninstall() {
        let conf = create_test_cluster_conf();
        let manager = RedisClusterManager::connect(
            create_test_kube_config(),
            conf.clone(),
            None,
            None,
            None,
        )
        .await
        .expect("Failed to connect");

        let desired = DesiredTopology::new(3, 2);
        manager.install(&desired).await.expect("Install failed");
        let report = manager
            .converge(&desired, conf.reconcile.max_cycles, Duration::from_secs(3))
            .await
            .expect("Converge failed");
        assert!(report.converged);

        manager.scale(4, Some(1)).await.expect("Scale failed");
        let report = manager
            .converge(
                &DesiredTopology::new(4, 1),
                conf.reconcile.max_cycles,
                Duration::from_secs(3),
            )
            .await
            .expect("Converge failed");
        assert!(report.converged);

        let health = manager.check_health().await.expect("Check failed");
        assert_eq!(health.len(), 4);

        manager.uninstall(true).await.expect("Uninstall failed");
    }
}
