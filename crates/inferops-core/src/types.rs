//! Small domain types shared between configuration and runtime crates.

use serde::{Deserialize, Serialize};

/// Stable identifier of a configured compute node.
pub type NodeId = u32;

/// Severity of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertLevel::Warning => f.write_str("warning"),
            AlertLevel::Critical => f.write_str("critical"),
        }
    }
}

/// A telemetry field an alert rule can watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricPath {
    #[serde(rename = "gpu.temperature_celsius")]
    GpuTemperature,
    #[serde(rename = "gpu.utilization_percent")]
    GpuUtilization,
    #[serde(rename = "gpu.memory_usage_percent")]
    GpuMemoryUsage,
    #[serde(rename = "memory.percent")]
    MemoryPercent,
    #[serde(rename = "cpu_usage_percent")]
    CpuUsage,
}

impl MetricPath {
    /// The dotted path as written in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricPath::GpuTemperature => "gpu.temperature_celsius",
            MetricPath::GpuUtilization => "gpu.utilization_percent",
            MetricPath::GpuMemoryUsage => "gpu.memory_usage_percent",
            MetricPath::MemoryPercent => "memory.percent",
            MetricPath::CpuUsage => "cpu_usage_percent",
        }
    }
}

impl std::fmt::Display for MetricPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        metric: MetricPath,
        level: AlertLevel,
    }

    #[test]
    fn metric_path_uses_dotted_names() {
        let w: Wrapper =
            toml::from_str("metric = \"memory.percent\"\nlevel = \"warning\"").unwrap();
        assert_eq!(w.metric, MetricPath::MemoryPercent);
        assert_eq!(w.level, AlertLevel::Warning);
        assert_eq!(w.metric.to_string(), "memory.percent");
    }

    #[test]
    fn unknown_metric_path_is_rejected() {
        let res: Result<Wrapper, _> =
            toml::from_str("metric = \"gpu.fan_speed\"\nlevel = \"critical\"");
        assert!(res.is_err());
    }
}
