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

mod common;

#[cfg(test)]
mod tests {
    use super::common::*;
    use redis_kube::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn reconciler(sim: &Arc<SimulatedCluster>) -> Reconciler {
        let inspector = Arc::new(ClusterInspector::new(
            sim.clone(),
            sim.clone(),
            kube_config(),
        ));
        Reconciler::new(inspector, sim.clone())
    }

    #[test]
    fn test_validate() {
        assert!(DesiredTopology::new(1, 0).validate().is_ok());
        assert!(DesiredTopology::new(6, 2).validate().is_ok());
        assert!(matches!(
            DesiredTopology::new(0, 1).validate(),
            Err(RedisKubeError::InvalidTopology(_))
        ));
        assert!(matches!(
            DesiredTopology::new(3, -1).validate(),
            Err(RedisKubeError::InvalidTopology(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_topology_touches_nothing() {
        let sim = SimulatedCluster::new();
        sim.add_master("cache-0");

        let err = reconciler(&sim)
            .apply(&DesiredTopology::new(0, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, RedisKubeError::InvalidTopology(_)));
        assert!(sim.executed().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_nodes_only_scale() {
        let sim = SimulatedCluster::new();
        sim.add_master("cache-0");
        sim.add_master("cache-1");
        sim.set_reachable("cache-0", false);
        sim.set_reachable("cache-1", false);

        let actions = reconciler(&sim)
            .apply(&DesiredTopology::new(4, 1))
            .await
            .unwrap();
        assert_eq!(actions, vec![ReconcileAction::ScaleTo(4)]);
        assert_eq!(sim.node_count(), 4);
    }

    #[tokio::test]
    async fn test_no_master_promotes_exactly_one() {
        let sim = SimulatedCluster::new();
        sim.add_node("cache-0", SimRole::Slave("gone".to_string()), 100);
        sim.add_node("cache-1", SimRole::Slave("gone".to_string()), 700);
        sim.add_node("cache-2", SimRole::Slave("gone".to_string()), 400);

        let actions = reconciler(&sim)
            .apply(&DesiredTopology::new(3, 2))
            .await
            .unwrap();
        assert_eq!(actions, vec![ReconcileAction::promote("cache-1")]);
        assert_eq!(sim.masters(), vec!["cache-1".to_string()]);
    }

    #[tokio::test]
    async fn test_orphans_attach_round_robin() {
        let sim = SimulatedCluster::new();
        sim.add_master("cache-0");
        sim.add_master("cache-1");
        sim.add_slave("cache-2", "gone");
        sim.add_slave("cache-3", "gone");

        let actions = reconciler(&sim)
            .apply(&DesiredTopology::new(4, 1))
            .await
            .unwrap();
        assert_eq!(
            actions,
            vec![
                ReconcileAction::attach("cache-2", "cache-0"),
                ReconcileAction::attach("cache-3", "cache-1"),
            ]
        );
    }

    #[tokio::test]
    async fn test_second_apply_is_idempotent() {
        let sim = SimulatedCluster::new();
        sim.add_master("cache-0");
        sim.add_master("cache-1");
        sim.add_slave("cache-2", "gone");
        sim.add_slave("cache-3", "gone");

        let reconciler = reconciler(&sim);
        let desired = DesiredTopology::new(4, 1);
        assert_eq!(reconciler.apply(&desired).await.unwrap().len(), 2);
        assert!(reconciler.apply(&desired).await.unwrap().is_empty());
        assert_eq!(sim.executed().len(), 2);
    }

    #[tokio::test]
    async fn test_fresh_pods_converge_to_master_groups() {
        let sim = SimulatedCluster::new();
        let reconciler = reconciler(&sim);
        let desired = DesiredTopology::new(6, 2);

        let mut cycles = 0;
        loop {
            cycles += 1;
            assert!(cycles <= 10, "did not converge");
            if reconciler.apply(&desired).await.unwrap().is_empty() {
                break;
            }
        }

        let groups = sim.groups();
        assert_eq!(groups.len(), desired.target_master_count());
        for slaves in groups.values() {
            assert_eq!(slaves.len(), 2);
        }
    }

    #[tokio::test]
    async fn test_dry_run_executes_nothing() {
        let sim = SimulatedCluster::new();
        sim.add_master("cache-0");
        sim.add_slave("cache-1", "gone");

        let (snapshot, actions) = reconciler(&sim)
            .dry_run(&DesiredTopology::new(2, 1))
            .await
            .unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(actions, vec![ReconcileAction::attach("cache-1", "cache-0")]);
        assert!(sim.executed().is_empty());
    }

    #[tokio::test]
    async fn test_inspection_error_is_not_retried_by_apply() {
        let sim = SimulatedCluster::new();
        sim.add_master("cache-0");
        sim.fail_next_lists(1);

        let reconciler = reconciler(&sim);
        let err = reconciler
            .apply(&DesiredTopology::new(1, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RedisKubeError::InspectionError(_)));
        assert!(err.is_retryable());

        assert!(reconciler
            .apply(&DesiredTopology::new(1, 0))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_driver_failure_stops_the_cycle() {
        let sim = SimulatedCluster::new();
        sim.add_master("cache-0");
        sim.add_master("cache-1");
        sim.add_slave("cache-2", "gone");
        sim.add_slave("cache-3", "gone");
        sim.fail_on(ReconcileAction::attach("cache-3", "cache-1"));

        let err = reconciler(&sim)
            .apply(&DesiredTopology::new(4, 1))
            .await
            .unwrap_err();
        match err {
            RedisKubeError::DriverExecutionError { action, .. } => {
                assert_eq!(action, ReconcileAction::attach("cache-3", "cache-1"))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            sim.executed(),
            vec![ReconcileAction::attach("cache-2", "cache-0")]
        );
    }

    #[tokio::test]
    async fn test_deadline_expiry_is_timeout() {
        let sim = SimulatedCluster::new();
        sim.add_master("cache-0");
        sim.add_slave("cache-1", "gone");
        sim.slow_driver(Duration::from_millis(500));

        let err = reconciler(&sim)
            .apply_with_deadline(&DesiredTopology::new(2, 1), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, RedisKubeError::Timeout(_)));
        assert!(sim.executed().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_applies_do_not_double_act() {
        let sim = SimulatedCluster::new();
        sim.add_master("cache-0");
        sim.add_slave("cache-1", "gone");
        sim.slow_driver(Duration::from_millis(20));

        let reconciler = Arc::new(reconciler(&sim));
        let desired = DesiredTopology::new(2, 1);
        let (a, b) = tokio::join!(reconciler.apply(&desired), reconciler.apply(&desired));

        assert_eq!(a.unwrap().len() + b.unwrap().len(), 1);
        assert_eq!(sim.executed().len(), 1);
    }
}
