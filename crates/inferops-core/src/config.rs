//! inferops.toml configuration parser.
//!
//! Every section except `[[nodes]]` is optional and falls back to the
//! defaults below. Durations are written as strings (`"500ms"`, `"5s"`,
//! `"2m"`, or a bare number of seconds) and are checked by [`GatewayConfig::validate`].

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::{AlertLevel, MetricPath, NodeId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub gateway: GatewaySection,
    #[serde(default)]
    pub health: HealthSection,
    #[serde(default)]
    pub locks: LocksSection,
    #[serde(default)]
    pub upstream: UpstreamSection,
    #[serde(default)]
    pub alerts: AlertsSection,
    #[serde(default)]
    pub batch: BatchSection,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSection {
    /// Time between two poll cycles.
    #[serde(default = "default_health_interval")]
    pub interval: String,
    /// Per-probe timeout. Must be shorter than `interval`.
    #[serde(default = "default_health_timeout")]
    pub timeout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocksSection {
    #[serde(default = "default_lock_timeout")]
    pub timeout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSection {
    /// Applied to connecting and to every body read.
    #[serde(default = "default_upstream_timeout")]
    pub timeout: String,
    /// Byte sequence that marks the end of a generation in the upstream stream.
    #[serde(default = "default_completion_marker")]
    pub completion_marker: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertsSection {
    /// Evaluation interval. Defaults to twice the health interval.
    pub interval: Option<String>,
    /// Rule set. `None` selects the built-in rules.
    pub rules: Option<Vec<AlertRuleConfig>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRuleConfig {
    pub id: String,
    pub metric: MetricPath,
    pub threshold: f64,
    #[serde(default = "default_alert_level")]
    pub level: AlertLevel,
    /// Message template; `{node}` and `{value}` are substituted.
    pub message: String,
    #[serde(default = "default_alert_cooldown")]
    pub cooldown: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSection {
    /// Fraction of processed items after which result merging may begin.
    #[serde(default = "default_merge_threshold")]
    pub merge_threshold: f64,
}

/// Static description of one compute node. Immutable for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    pub id: NodeId,
    pub name: String,
    /// Base URL of the node agent (`/status`, `/lock`, `/unlock` live under it).
    pub agent_url: String,
    /// Chat endpoint of the inference server on this node.
    pub inference_url: String,
    /// Raw capability of the node; the numerator of the scheduling score.
    #[serde(default = "default_static_weight")]
    pub static_weight: f64,
}

impl NodeConfig {
    /// Full URL of an agent endpoint, e.g. `agent_endpoint("/status")`.
    pub fn agent_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.agent_url.trim_end_matches('/'), path)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_health_interval() -> String {
    "5s".to_string()
}
fn default_health_timeout() -> String {
    "4s".to_string()
}
fn default_lock_timeout() -> String {
    "5s".to_string()
}
fn default_upstream_timeout() -> String {
    "120s".to_string()
}
fn default_completion_marker() -> String {
    "\"done\":true".to_string()
}
fn default_alert_level() -> AlertLevel {
    AlertLevel::Critical
}
fn default_alert_cooldown() -> String {
    "300s".to_string()
}
fn default_merge_threshold() -> f64 {
    0.5
}
fn default_static_weight() -> f64 {
    1.0
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            interval: default_health_interval(),
            timeout: default_health_timeout(),
        }
    }
}

impl Default for LocksSection {
    fn default() -> Self {
        Self {
            timeout: default_lock_timeout(),
        }
    }
}

impl Default for UpstreamSection {
    fn default() -> Self {
        Self {
            timeout: default_upstream_timeout(),
            completion_marker: default_completion_marker(),
        }
    }
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            merge_threshold: default_merge_threshold(),
        }
    }
}

impl AlertRuleConfig {
    pub fn cooldown(&self) -> Duration {
        parse_duration(&self.cooldown).unwrap_or(Duration::from_secs(300))
    }

    /// Rules used when the config file does not declare any.
    pub fn defaults() -> Vec<Self> {
        vec![
            AlertRuleConfig {
                id: "gpu_temp_severe".to_string(),
                metric: MetricPath::GpuTemperature,
                threshold: 85.0,
                level: AlertLevel::Critical,
                message: "{node} GPU temperature at {value}°C".to_string(),
                cooldown: "300s".to_string(),
            },
            AlertRuleConfig {
                id: "mem_usage_severe".to_string(),
                metric: MetricPath::MemoryPercent,
                threshold: 95.0,
                level: AlertLevel::Critical,
                message: "{node} memory usage at {value}%".to_string(),
                cooldown: "300s".to_string(),
            },
        ]
    }
}

impl GatewayConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: GatewayConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn health_interval(&self) -> Duration {
        parse_duration(&self.health.interval).unwrap_or(Duration::from_secs(5))
    }

    pub fn health_timeout(&self) -> Duration {
        parse_duration(&self.health.timeout).unwrap_or(Duration::from_secs(4))
    }

    pub fn lock_timeout(&self) -> Duration {
        parse_duration(&self.locks.timeout).unwrap_or(Duration::from_secs(5))
    }

    pub fn upstream_timeout(&self) -> Duration {
        parse_duration(&self.upstream.timeout).unwrap_or(Duration::from_secs(120))
    }

    pub fn alert_interval(&self) -> Duration {
        self.alerts
            .interval
            .as_deref()
            .and_then(parse_duration)
            .unwrap_or_else(|| self.health_interval().saturating_mul(2))
    }

    pub fn alert_rules(&self) -> Vec<AlertRuleConfig> {
        self.alerts
            .rules
            .clone()
            .unwrap_or_else(AlertRuleConfig::defaults)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.nodes.is_empty() {
            return Err(ConfigError::NoNodes);
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id) {
                return Err(ConfigError::DuplicateNode(node.id));
            }
            validate_node(node)?;
        }

        let interval = require_duration("health.interval", &self.health.interval)?;
        let timeout = require_duration("health.timeout", &self.health.timeout)?;
        if timeout >= interval {
            return Err(ConfigError::ProbeTimeoutTooLong { timeout, interval });
        }
        require_duration("locks.timeout", &self.locks.timeout)?;
        require_duration("upstream.timeout", &self.upstream.timeout)?;
        if let Some(ref alert_interval) = self.alerts.interval {
            require_duration("alerts.interval", alert_interval)?;
        }

        if self.upstream.completion_marker.is_empty() {
            return Err(ConfigError::Invalid(
                "upstream.completion_marker must not be empty".to_string(),
            ));
        }

        let threshold = self.batch.merge_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "batch.merge_threshold must be in (0, 1], got {threshold}"
            )));
        }

        for rule in self.alert_rules() {
            if rule.id.is_empty() {
                return Err(ConfigError::InvalidRule {
                    id: rule.id.clone(),
                    reason: "empty id".to_string(),
                });
            }
            if !rule.threshold.is_finite() {
                return Err(ConfigError::InvalidRule {
                    id: rule.id.clone(),
                    reason: "threshold must be finite".to_string(),
                });
            }
            if parse_duration(&rule.cooldown).is_none_or(|d| d > MAX_DURATION) {
                return Err(ConfigError::InvalidRule {
                    id: rule.id.clone(),
                    reason: format!("invalid cooldown {:?}", rule.cooldown),
                });
            }
        }

        Ok(())
    }
}

fn validate_node(node: &NodeConfig) -> ConfigResult<()> {
    let invalid = |reason: String| ConfigError::InvalidNode {
        id: node.id,
        reason,
    };

    if node.name.trim().is_empty() {
        return Err(invalid("empty name".to_string()));
    }
    if !node.static_weight.is_finite() || node.static_weight < 0.0 {
        return Err(invalid(format!(
            "static_weight must be a non-negative number, got {}",
            node.static_weight
        )));
    }
    for (field, url) in [
        ("agent_url", &node.agent_url),
        ("inference_url", &node.inference_url),
    ] {
        let uri: http::Uri = url
            .parse()
            .map_err(|e| invalid(format!("{field} {url:?}: {e}")))?;
        if uri.scheme_str() != Some("http") || uri.authority().is_none() {
            return Err(invalid(format!(
                "{field} must be an absolute http:// URL, got {url:?}"
            )));
        }
    }
    Ok(())
}

/// Upper bound for every configured duration.
const MAX_DURATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

fn require_duration(field: &'static str, value: &str) -> ConfigResult<Duration> {
    match parse_duration(value) {
        Some(d) if !d.is_zero() && d <= MAX_DURATION => Ok(d),
        _ => Err(ConfigError::InvalidDuration {
            field,
            value: value.to_string(),
        }),
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
