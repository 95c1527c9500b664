//! Domain types for the InferOps state store.
//!
//! `NodeMetrics` mirrors the JSON telemetry served by a node agent's
//! `GET /status`. Every sub-system is optional so that "no GPU" or
//! "memory not reported" is an explicit `None` rather than a missing key.

use serde::{Deserialize, Serialize};

pub use inferops_core::{AlertLevel, NodeId};

// ── Node ──────────────────────────────────────────────────────────

/// Cached status of one configured node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeRecord {
    pub id: NodeId,
    pub name: String,
    /// Set by the health poller; `false` until the first successful probe.
    pub online: bool,
    /// Latest telemetry. Present iff `online`.
    pub metrics: Option<NodeMetrics>,
}

impl NodeRecord {
    /// A freshly configured node: offline, no telemetry.
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            online: false,
            metrics: None,
        }
    }
}

/// Telemetry reported by a node agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeMetrics {
    /// The agent's own reservation flag. Informational only: the agent is
    /// the arbiter, this copy can be stale between polls.
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub cpu_usage_percent: Option<f64>,
    #[serde(default, alias = "cpu_info")]
    pub cpu_model: Option<String>,
    #[serde(default)]
    pub memory: Option<MemoryInfo>,
    #[serde(default)]
    pub gpu: Option<GpuInfo>,
}

/// System memory (RAM) figures. Byte counts, `percent` in 0..=100.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryInfo {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub available: Option<u64>,
    #[serde(default)]
    pub percent: Option<f64>,
    #[serde(default)]
    pub used: Option<u64>,
    #[serde(default)]
    pub free: Option<u64>,
}

/// Figures for the node's primary GPU.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GpuInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub utilization_percent: Option<f64>,
    #[serde(default)]
    pub memory_usage_percent: Option<f64>,
    #[serde(default)]
    pub temperature_celsius: Option<f64>,
}

impl NodeMetrics {
    pub fn gpu_utilization(&self) -> Option<f64> {
        self.gpu.as_ref().and_then(|g| g.utilization_percent)
    }

    pub fn gpu_memory_usage(&self) -> Option<f64> {
        self.gpu.as_ref().and_then(|g| g.memory_usage_percent)
    }

    pub fn gpu_temperature(&self) -> Option<f64> {
        self.gpu.as_ref().and_then(|g| g.temperature_celsius)
    }

    pub fn memory_percent(&self) -> Option<f64> {
        self.memory.as_ref().and_then(|m| m.percent)
    }
}

// ── Alerts ────────────────────────────────────────────────────────

/// An active threshold breach.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    /// `{rule_id}_{node_id}`.
    pub id: String,
    pub level: AlertLevel,
    pub message: String,
    /// Unix timestamp (seconds) of the firing.
    pub timestamp: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_agent_telemetry() {
        let json = r#"{
            "locked": false,
            "model_id": "llama3:8b",
            "cpu_usage_percent": 12.5,
            "cpu_model": "x86_64",
            "memory": {"total": 100, "available": 40, "percent": 60.0, "used": 60, "free": 40},
            "gpu": {"available": true, "utilization_percent": 30, "memory_usage_percent": 45.5,
                    "temperature_celsius": 61, "power_watts": 120.0}
        }"#;
        let m: NodeMetrics = serde_json::from_str(json).unwrap();
        assert!(!m.locked);
        assert_eq!(m.model_id.as_deref(), Some("llama3:8b"));
        assert_eq!(m.memory_percent(), Some(60.0));
        assert_eq!(m.gpu_utilization(), Some(30.0));
        assert_eq!(m.gpu_temperature(), Some(61.0));
        assert_eq!(m.memory.as_ref().unwrap().free, Some(40));
    }

    #[test]
    fn gpu_may_be_absent_or_unavailable() {
        let m: NodeMetrics = serde_json::from_str(r#"{"locked": true, "gpu": null}"#).unwrap();
        assert!(m.locked);
        assert!(m.gpu.is_none());
        assert_eq!(m.gpu_utilization(), None);

        let m: NodeMetrics = serde_json::from_str(
            r#"{"locked": false, "gpu": {"available": false, "error": "no driver"}}"#,
        )
        .unwrap();
        assert_eq!(m.gpu_temperature(), None);
    }

    #[test]
    fn cpu_info_alias_is_accepted() {
        let m: NodeMetrics = serde_json::from_str(r#"{"cpu_info": "Ryzen"}"#).unwrap();
        assert_eq!(m.cpu_model.as_deref(), Some("Ryzen"));
    }

    #[test]
    fn new_record_is_offline_without_metrics() {
        let r = NodeRecord::new(3, "node-3");
        assert!(!r.online);
        assert!(r.metrics.is_none());
    }
}
