// CLI command definitions

use super::k8s::{
    CheckCommand, InstallCommand, MonitorCommand, ReconcileCommand, ScaleCommand, StatusCommand,
    UninstallCommand,
};
use crate::domain::config::LogConfig;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "redis-kube",
    version,
    about = "Redis master/slave clusters on Kubernetes",
    long_about = "A standalone CLI tool for installing, scaling and health-checking Redis master/slave clusters running as a Kubernetes StatefulSet"
)]
pub struct CliArgs {
    /// Show debug output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Only show errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl CliArgs {
    pub fn log_config(&self) -> LogConfig {
        LogConfig::from_flags(self.verbose, self.quiet)
    }
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Install a new Redis cluster (creates all resources)
    Install(InstallCommand),

    /// Remove every node, slaves first, then the cluster resources
    Uninstall(UninstallCommand),

    /// Change the number of Redis nodes
    Scale(ScaleCommand),

    /// Probe every node once and report its health
    Check(CheckCommand),

    /// Show the observed topology and pending actions
    Status(StatusCommand),

    /// Run reconcile cycles against the stored topology
    Reconcile(ReconcileCommand),

    /// Watch node health until interrupted
    Monitor(MonitorCommand),
}

impl Commands {
    pub async fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Install(cmd) => cmd.execute().await,
            Commands::Uninstall(cmd) => cmd.execute().await,
            Commands::Scale(cmd) => cmd.execute().await,
            Commands::Check(cmd) => cmd.execute().await,
            Commands::Status(cmd) => cmd.execute().await,
            Commands::Reconcile(cmd) => cmd.execute().await,
            Commands::Monitor(cmd) => cmd.execute().await,
        }
    }
}
