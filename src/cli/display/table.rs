//! Table rendering for CLI output

use super::{ColorTheme, StatusIcon};
use crate::domain::cluster::{ClusterStatus, HealthMap};
use crate::domain::topology::ReconcileAction;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Table};

/// Table renderer for formatted output
pub struct TableRenderer {
    theme: ColorTheme,
}

impl Default for TableRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn count_healthy(health: &HealthMap) -> (u32, u32) {
    let healthy = health.values().filter(|ok| **ok).count() as u32;
    (healthy, health.len() as u32)
}

impl TableRenderer {
    pub fn new() -> Self {
        Self {
            theme: ColorTheme::default(),
        }
    }

    /// Render one health verdict per node
    pub fn render_health(&self, health: &HealthMap) -> String {
        if health.is_empty() {
            return "No Redis nodes found".to_string();
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("NODE").set_alignment(CellAlignment::Left),
                Cell::new("HEALTH").set_alignment(CellAlignment::Center),
            ]);

        for (node, ok) in health {
            let (text, color) = if *ok {
                ("Healthy", self.theme.success)
            } else {
                ("Unhealthy", self.theme.error)
            };
            table.add_row(vec![
                Cell::new(node),
                Cell::new(format!("{} {}", StatusIcon::for_node(*ok), text)).fg(color),
            ]);
        }

        let (healthy, total) = count_healthy(health);
        let mut output = String::new();
        output.push_str(&table.to_string());
        output.push('\n');
        output.push_str(&format!(
            "{} {}/{} nodes healthy\n",
            StatusIcon::get_health_icon(healthy, total),
            healthy,
            total
        ));
        output
    }

    /// Render planned or executed actions in execution order
    pub fn render_actions(&self, title: &str, actions: &[ReconcileAction]) -> String {
        if actions.is_empty() {
            return format!("{} {}: nothing to do", StatusIcon::SUCCESS.green(), title);
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("#").set_alignment(CellAlignment::Right),
                Cell::new("ACTION").set_alignment(CellAlignment::Left),
            ]);

        for (i, action) in actions.iter().enumerate() {
            let color = match action {
                ReconcileAction::ScaleTo(_) => self.theme.info,
                ReconcileAction::PromoteToMaster(_) => self.theme.warning,
                ReconcileAction::AttachSlave(_, _) => self.theme.success,
                ReconcileAction::RemoveNode(_) => self.theme.error,
            };
            table.add_row(vec![
                Cell::new(i + 1).set_alignment(CellAlignment::Right),
                Cell::new(action.to_string()).fg(color),
            ]);
        }

        format!(
            "{} {}\n{}",
            title,
            format!("[{} actions]", actions.len()).bright_black(),
            table
        )
    }

    /// Render the observed topology of one cluster
    pub fn render_cluster_status(&self, status: &ClusterStatus) -> String {
        let (healthy, total) = count_healthy(&status.health);
        let overall_color = self.theme.get_health_color(healthy, total);
        let overall_status = format!(
            "{} {}",
            StatusIcon::get_health_icon(healthy, total),
            StatusIcon::get_status_text(healthy, total)
        );

        let desired = status
            .desired
            .map(|d| d.to_string())
            .unwrap_or_else(|| "StatefulSet not found".to_string());

        let mut summary = Table::new();
        summary
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        summary.add_row(vec![
            Cell::new("📊 Redis Cluster Status").set_alignment(CellAlignment::Center)
        ]);
        summary.add_row(vec![Cell::new(format!(
            "Cluster: {} | Namespace: {}",
            status.cluster_id, status.namespace
        ))]);
        summary.add_row(vec![Cell::new(format!("Desired: {}", desired))]);
        summary.add_row(vec![Cell::new(format!(
            "Status: {} ({}/{} healthy)",
            overall_status, healthy, total
        ))
        .fg(overall_color)]);
        summary.add_row(vec![Cell::new(format!(
            "Observed: {} (generation {})",
            status
                .snapshot
                .observed_at
                .format("%Y-%m-%d %H:%M:%S UTC"),
            status.snapshot.generation
        ))
        .fg(self.theme.muted)]);

        let mut nodes = Table::new();
        nodes
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("NODE"),
                Cell::new("ROLE").set_alignment(CellAlignment::Center),
                Cell::new("MASTER"),
                Cell::new("OFFSET").set_alignment(CellAlignment::Right),
                Cell::new("ADDRESS"),
                Cell::new("HEALTH").set_alignment(CellAlignment::Center),
            ]);

        for node in status.snapshot.nodes() {
            let ok = status.health.get(&node.id).copied().unwrap_or(false);
            nodes.add_row(vec![
                Cell::new(&node.id),
                Cell::new(node.role.as_str()).fg(self.theme.get_role_color(node.role)),
                Cell::new(node.master_ref.as_deref().unwrap_or("-")),
                Cell::new(node.replication_offset).set_alignment(CellAlignment::Right),
                Cell::new(node.address.as_deref().unwrap_or("-")),
                Cell::new(StatusIcon::for_node(ok)).fg(if ok {
                    self.theme.success
                } else {
                    self.theme.error
                }),
            ]);
        }

        let mut output = format!("{}\n{}\n", summary, nodes);
        if !status.pending.is_empty() {
            output.push_str(&format!(
                "{} {}\n",
                StatusIcon::PENDING,
                "Pending actions:".yellow()
            ));
            for action in &status.pending {
                output.push_str(&format!("  - {}\n", action));
            }
        }
        output.push_str(&format!(
            "Legend: {} Healthy  {} Degraded  {} Failed\n",
            StatusIcon::SUCCESS.green(),
            StatusIcon::WARNING.yellow(),
            StatusIcon::ERROR.red()
        ));
        output
    }
}
