//! Color theme for CLI output

use crate::domain::topology::NodeRole;
use comfy_table::Color as TableColor;

/// Color theme for terminal output
#[derive(Debug, Clone)]
pub struct ColorTheme {
    pub success: TableColor,
    pub warning: TableColor,
    pub error: TableColor,
    pub info: TableColor,
    pub muted: TableColor,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            success: TableColor::Green,
            warning: TableColor::Yellow,
            error: TableColor::Red,
            info: TableColor::Cyan,
            muted: TableColor::DarkGrey,
        }
    }
}

impl ColorTheme {
    /// Get color based on how many nodes passed their health check
    pub fn get_health_color(&self, healthy: u32, total: u32) -> TableColor {
        if total == 0 {
            self.muted
        } else if healthy == total {
            self.success
        } else if healthy > 0 {
            self.warning
        } else {
            self.error
        }
    }

    pub fn get_role_color(&self, role: NodeRole) -> TableColor {
        match role {
            NodeRole::Master => self.info,
            NodeRole::Slave => self.success,
            NodeRole::Unknown => self.muted,
        }
    }
}
