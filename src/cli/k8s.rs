//! Kubernetes cluster commands

use crate::cli::display::TableRenderer;
use crate::domain::cluster::{HealthMap, RedisClusterManager};
use crate::domain::config::{
    apply_to_cluster_conf, apply_to_kube_config, parse_dynamic_configs, ClusterConf,
    KubernetesConfig,
};
use crate::domain::topology::DesiredTopology;
use crate::infrastructure::constants::CONF_FILE_ENV;
use clap::Parser;
use colored::Colorize;
use std::future::Future;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Connection and configuration flags shared by every command.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ClusterArgs {
    /// Cluster ID (must be a valid Kubernetes name)
    /// If not provided, uses kubernetes.cluster_id from the config file
    #[arg(long, short = 'c')]
    pub cluster_id: Option<String>,

    /// Kubernetes namespace
    /// If not provided, uses kubernetes.namespace from the config file
    #[arg(long, short = 'n')]
    pub namespace: Option<String>,

    /// Path to kubeconfig file
    /// If not specified, uses default kubeconfig resolution (KUBECONFIG env or ~/.kube/config)
    #[arg(long)]
    pub kubeconfig: Option<String>,

    /// Kubernetes context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Kubernetes API server URL, overrides the one in kubeconfig
    #[arg(long)]
    pub api_server: Option<String>,

    /// Path to the cluster configuration file (redis-kube.toml)
    /// Falls back to the REDIS_KUBE_CONF_FILE environment variable
    #[arg(long, value_name = "PATH")]
    pub config_file: Option<String>,

    /// Dynamic configuration properties to override any settings (-D key=value)
    ///
    /// Kubernetes: kubernetes.image, kubernetes.image.pull-policy, kubernetes.image.pull-secrets,
    /// kubernetes.redis.port, kubernetes.cluster.domain, kubernetes.cpu, kubernetes.memory,
    /// kubernetes.node-selector, kubernetes.labels, kubernetes.annotations (format: key1=val1,key2=val2),
    /// kubernetes.service-account, kubernetes.pod-template,
    /// kubernetes.storage.class, kubernetes.storage.size
    /// Cluster: health.interval-secs, health.failure-threshold, health.lag-threshold,
    /// reconcile.apply-timeout-secs, reconcile.max-cycles, probe.password
    ///
    /// Example: -Dkubernetes.image=redis:7.2 -Dkubernetes.labels=team=cache
    #[arg(short = 'D', value_name = "KEY=VALUE")]
    pub properties: Vec<String>,
}

impl ClusterArgs {
    /// Config file, then `-D` overrides. Defaults when no file is given.
    pub fn load_conf(&self) -> anyhow::Result<ClusterConf> {
        let path = self
            .config_file
            .clone()
            .or_else(|| std::env::var(CONF_FILE_ENV).ok());

        let mut conf = match path {
            Some(path) => {
                if !std::path::Path::new(&path).exists() {
                    anyhow::bail!("❌ Configuration file not found: {}", path);
                }
                ClusterConf::from(&path)?
            }
            None => ClusterConf::default(),
        };

        if !self.properties.is_empty() {
            let configs = parse_dynamic_configs(&self.properties)
                .map_err(|e| anyhow::anyhow!("Failed to parse dynamic configs: {}", e))?;
            apply_to_cluster_conf(&configs, &mut conf);
        }
        Ok(conf)
    }

    /// Priority: command line > config file > defaults
    pub fn kube_config(&self, conf: &ClusterConf) -> anyhow::Result<KubernetesConfig> {
        let mut kube_config = conf.kube_config();

        if let Some(ref id) = self.cluster_id {
            kube_config.cluster_id = id.clone();
        }
        if let Some(ref namespace) = self.namespace {
            kube_config.namespace = namespace.clone();
        }

        if !self.properties.is_empty() {
            let configs = parse_dynamic_configs(&self.properties)
                .map_err(|e| anyhow::anyhow!("Failed to parse dynamic configs: {}", e))?;
            apply_to_kube_config(&configs, &mut kube_config);
        }
        Ok(kube_config)
    }

    pub async fn connect(&self) -> anyhow::Result<(RedisClusterManager, ClusterConf)> {
        let conf = self.load_conf()?;
        let kube_config = self.kube_config(&conf)?;

        let manager = RedisClusterManager::connect(
            kube_config,
            conf.clone(),
            self.kubeconfig.clone(),
            self.context.clone(),
            self.api_server.clone(),
        )
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to Kubernetes: {}", e))?;

        Ok((manager, conf))
    }
}

#[derive(Parser, Debug, Clone)]
pub struct InstallCommand {
    #[command(flatten)]
    pub cluster: ClusterArgs,

    /// Total number of Redis nodes
    #[arg(long)]
    pub replicas: Option<u32>,

    /// Slaves attached to each master, must be >= 0
    #[arg(long, allow_negative_numbers = true)]
    pub slaves_per_master: Option<i64>,

    /// Keep reconciling until the topology converges
    #[arg(long)]
    pub wait: bool,
}

impl InstallCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let (manager, conf) = self.cluster.connect().await?;

        let stored = conf.desired_topology();
        let desired = DesiredTopology::new(
            self.replicas.unwrap_or(stored.replica_count),
            self.slaves_per_master.unwrap_or(stored.slaves_per_master),
        );

        let actions = manager
            .install(&desired)
            .await
            .map_err(|e| anyhow::anyhow!("Installation failed: {}", e))?;

        let renderer = TableRenderer::new();
        println!("{}", renderer.render_actions("Initial reconcile", &actions));

        if self.wait {
            converge(&manager, &conf, &desired).await?;
        }

        println!(
            "Cluster {} installed with {}",
            manager.config().cluster_id,
            desired
        );
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
pub struct UninstallCommand {
    #[command(flatten)]
    pub cluster: ClusterArgs,

    /// Delete PVCs (persistent volumes)
    #[arg(long)]
    pub delete_pvcs: bool,
}

impl UninstallCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let (manager, _) = self.cluster.connect().await?;

        let removed = manager
            .uninstall(self.delete_pvcs)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to uninstall cluster: {}", e))?;

        println!("{}", TableRenderer::new().render_actions("Removed", &removed));
        println!(
            "Cluster {} uninstalled successfully!",
            manager.config().cluster_id
        );
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
pub struct ScaleCommand {
    #[command(flatten)]
    pub cluster: ClusterArgs,

    /// New total number of Redis nodes
    #[arg(long, allow_negative_numbers = true)]
    pub replicas: i64,

    /// New slaves per master, keeps the installed value when omitted
    #[arg(long, allow_negative_numbers = true)]
    pub slaves_per_master: Option<i64>,

    /// Keep reconciling until the topology converges
    #[arg(long)]
    pub wait: bool,
}

impl ScaleCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let (manager, conf) = self.cluster.connect().await?;

        let actions = manager
            .scale(self.replicas, self.slaves_per_master)
            .await
            .map_err(|e| anyhow::anyhow!("Scale failed: {}", e))?;
        println!("{}", TableRenderer::new().render_actions("Scale", &actions));

        if self.wait {
            let desired = manager.stored_topology().await?;
            converge(&manager, &conf, &desired).await?;
        }
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
pub struct CheckCommand {
    #[command(flatten)]
    pub cluster: ClusterArgs,
}

impl CheckCommand {
    /// Fails when any node is unhealthy so scripts can rely on the exit code.
    pub async fn execute(&self) -> anyhow::Result<()> {
        let (manager, _) = self.cluster.connect().await?;

        let health = manager
            .check_health()
            .await
            .map_err(|e| anyhow::anyhow!("Health check failed: {}", e))?;
        println!("{}", TableRenderer::new().render_health(&health));

        let unhealthy: Vec<_> = health
            .iter()
            .filter(|(_, ok)| !**ok)
            .map(|(id, _)| id.as_str())
            .collect();
        if !unhealthy.is_empty() {
            anyhow::bail!("unhealthy nodes: {}", unhealthy.join(", "));
        }
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
pub struct StatusCommand {
    #[command(flatten)]
    pub cluster: ClusterArgs,
}

impl StatusCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let (manager, _) = self.cluster.connect().await?;

        let status = manager
            .status()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get cluster status: {}", e))?;

        println!("{}", TableRenderer::new().render_cluster_status(&status));
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
pub struct ReconcileCommand {
    #[command(flatten)]
    pub cluster: ClusterArgs,

    /// Only print the actions one cycle would take
    #[arg(long)]
    pub dry_run: bool,

    /// Keep reconciling until the topology converges
    #[arg(long, conflicts_with = "dry_run")]
    pub wait: bool,
}

impl ReconcileCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let (manager, conf) = self.cluster.connect().await?;
        let desired = manager.stored_topology().await?;
        let renderer = TableRenderer::new();

        if self.dry_run {
            let (_, actions) = manager.reconciler().dry_run(&desired).await?;
            println!("{}", renderer.render_actions("Planned", &actions));
            return Ok(());
        }

        if self.wait {
            return converge(&manager, &conf, &desired).await;
        }

        let actions = manager
            .reconciler()
            .apply_with_deadline(&desired, conf.reconcile.apply_timeout())
            .await?;
        println!("{}", renderer.render_actions("Applied", &actions));
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
pub struct MonitorCommand {
    #[command(flatten)]
    pub cluster: ClusterArgs,
}

impl MonitorCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let (manager, conf) = self.cluster.connect().await?;
        let monitor = std::sync::Arc::new(manager.health_monitor());
        let health_rx = monitor.subscribe();

        let cancel = CancellationToken::new();
        let handle = monitor.clone().spawn(cancel.clone());

        println!(
            "Monitoring {} every {}s, press Ctrl-C to stop",
            manager.config().cluster_id,
            conf.health.interval_secs
        );

        follow_health(health_rx, tokio::signal::ctrl_c(), |node, ok| {
            let line = format!(
                "{} {} is {}",
                chrono::Local::now().format("%H:%M:%S"),
                node,
                if ok { "healthy" } else { "unhealthy" }
            );
            if ok {
                println!("{}", line.green());
            } else {
                println!("{}", line.red());
            }
        })
        .await;

        cancel.cancel();
        handle.await?;
        println!("Monitor stopped");
        Ok(())
    }
}

/// Reports every per-node health transition until `shutdown` resolves or
/// the monitor goes away.
async fn follow_health<F>(
    mut health_rx: watch::Receiver<HealthMap>,
    shutdown: F,
    mut on_change: impl FnMut(&str, bool),
) where
    F: Future,
{
    tokio::pin!(shutdown);
    let mut last = health_rx.borrow().clone();
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = health_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let health = health_rx.borrow_and_update().clone();
                for (node, ok) in &health {
                    if last.get(node) != Some(ok) {
                        on_change(node, *ok);
                    }
                }
                last = health;
            }
        }
    }
}

async fn converge(
    manager: &RedisClusterManager,
    conf: &ClusterConf,
    desired: &DesiredTopology,
) -> anyhow::Result<()> {
    let report = manager
        .converge(
            desired,
            conf.reconcile.max_cycles,
            conf.reconcile.converge_interval(),
        )
        .await?;

    println!(
        "{}",
        TableRenderer::new().render_actions(
            &format!("Converge ({} cycles)", report.cycles),
            &report.actions
        )
    );
    if !report.converged {
        anyhow::bail!(
            "cluster did not converge after {} cycles",
            report.cycles
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_command_line_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [topology]
            replicas = 4

            [kubernetes]
            cluster_id = "from-file"
            namespace = "cache"
            "#
        )
        .unwrap();

        let args = ClusterArgs {
            cluster_id: Some("from-flag".to_string()),
            config_file: Some(file.path().to_string_lossy().to_string()),
            properties: vec!["kubernetes.image=redis:7.2".to_string()],
            ..Default::default()
        };

        let conf = args.load_conf().unwrap();
        assert_eq!(conf.topology.replicas, 4);

        let kube_config = args.kube_config(&conf).unwrap();
        assert_eq!(kube_config.cluster_id, "from-flag");
        assert_eq!(kube_config.namespace, "cache");
        assert_eq!(kube_config.image, "redis:7.2");
    }

    #[test]
    fn test_missing_config_file() {
        let args = ClusterArgs {
            config_file: Some("/nonexistent/redis-kube.toml".to_string()),
            ..Default::default()
        };
        assert!(args.load_conf().is_err());
    }

    #[test]
    fn test_invalid_property() {
        let args = ClusterArgs {
            properties: vec!["no-equals-sign".to_string()],
            ..Default::default()
        };
        assert!(args.load_conf().is_err());
    }

    #[tokio::test]
    async fn test_follow_health_reports_transitions_until_shutdown() {
        let (health_tx, health_rx) = watch::channel(HealthMap::new());
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();

        let follower = tokio::spawn(follow_health(health_rx, stop_rx, move |node, ok| {
            let _ = seen_tx.send((node.to_string(), ok));
        }));

        let mut health = HealthMap::new();
        health.insert("cache-0".to_string(), true);
        health.insert("cache-1".to_string(), true);
        health_tx.send(health.clone()).unwrap();
        assert_eq!(seen_rx.recv().await, Some(("cache-0".to_string(), true)));
        assert_eq!(seen_rx.recv().await, Some(("cache-1".to_string(), true)));

        health.insert("cache-1".to_string(), false);
        health_tx.send(health).unwrap();
        assert_eq!(seen_rx.recv().await, Some(("cache-1".to_string(), false)));

        stop_tx.send(()).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), follower)
            .await
            .unwrap()
            .unwrap();
        assert!(seen_rx.try_recv().is_err());
    }
}
