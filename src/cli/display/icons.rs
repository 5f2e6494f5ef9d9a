//! Status icons for CLI output

/// Status icons for different states
pub struct StatusIcon;

impl StatusIcon {
    /// Success icon (all nodes healthy)
    pub const SUCCESS: &'static str = "✓";

    /// Warning icon (some nodes unhealthy)
    pub const WARNING: &'static str = "⚠";

    /// Error icon (no healthy node)
    pub const ERROR: &'static str = "✗";

    /// Pending icon (actions still planned)
    pub const PENDING: &'static str = "⏳";

    pub const UNKNOWN: &'static str = "?";

    pub fn get_health_icon(healthy: u32, total: u32) -> &'static str {
        if total == 0 {
            Self::UNKNOWN
        } else if healthy == total {
            Self::SUCCESS
        } else if healthy > 0 {
            Self::WARNING
        } else {
            Self::ERROR
        }
    }

    pub fn get_status_text(healthy: u32, total: u32) -> &'static str {
        if total == 0 {
            "Unknown"
        } else if healthy == total {
            "Healthy"
        } else if healthy > 0 {
            "Degraded"
        } else {
            "Failed"
        }
    }

    pub fn for_node(healthy: bool) -> &'static str {
        if healthy {
            Self::SUCCESS
        } else {
            Self::ERROR
        }
    }
}
