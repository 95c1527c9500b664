//! Alert rules and metric lookup.

use std::time::Duration;

use inferops_core::{AlertLevel, AlertRuleConfig, MetricPath};
use inferops_state::NodeMetrics;

/// A threshold rule ready for evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRule {
    pub id: String,
    pub metric: MetricPath,
    pub threshold: f64,
    pub level: AlertLevel,
    /// Template; `{node}` and `{value}` are substituted.
    pub message: String,
    pub cooldown: Duration,
}

impl AlertRule {
    /// Render the message for one firing.
    pub fn render(&self, node: &str, value: f64) -> String {
        self.message
            .replace("{node}", node)
            .replace("{value}", &value.to_string())
    }

    /// True when `value` breaches this rule.
    pub fn breached(&self, value: f64) -> bool {
        value >= self.threshold
    }
}

impl From<&AlertRuleConfig> for AlertRule {
    fn from(cfg: &AlertRuleConfig) -> Self {
        Self {
            id: cfg.id.clone(),
            metric: cfg.metric,
            threshold: cfg.threshold,
            level: cfg.level,
            message: cfg.message.clone(),
            cooldown: cfg.cooldown(),
        }
    }
}

/// Read the metric a rule watches. `None` if the node did not report it.
pub fn metric_value(metrics: &NodeMetrics, path: MetricPath) -> Option<f64> {
    match path {
        MetricPath::GpuTemperature => metrics.gpu_temperature(),
        MetricPath::GpuUtilization => metrics.gpu_utilization(),
        MetricPath::GpuMemoryUsage => metrics.gpu_memory_usage(),
        MetricPath::MemoryPercent => metrics.memory_percent(),
        MetricPath::CpuUsage => metrics.cpu_usage_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inferops_testkit::metrics;

    #[test]
    fn default_rules_convert() {
        let rules: Vec<AlertRule> = AlertRuleConfig::defaults().iter().map(AlertRule::from).collect();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].metric, MetricPath::GpuTemperature);
        assert_eq!(rules[0].threshold, 85.0);
        assert_eq!(rules[0].cooldown, Duration::from_secs(300));
        assert_eq!(rules[1].metric, MetricPath::MemoryPercent);
    }

    #[test]
    fn message_template_substitution() {
        let rule = AlertRule {
            id: "hot".to_string(),
            metric: MetricPath::GpuTemperature,
            threshold: 85.0,
            level: AlertLevel::Critical,
            message: "{node} GPU at {value}°C".to_string(),
            cooldown: Duration::from_secs(1),
        };
        assert_eq!(rule.render("gpu-1", 91.5), "gpu-1 GPU at 91.5°C");
        assert_eq!(rule.render("gpu-1", 90.0), "gpu-1 GPU at 90°C");
    }

    #[test]
    fn threshold_is_inclusive() {
        let rule = AlertRule::from(&AlertRuleConfig::defaults()[0]);
        assert!(rule.breached(85.0));
        assert!(!rule.breached(84.9));
    }

    #[test]
    fn metric_paths_resolve() {
        let m = metrics(70.0, 96.0, 88.0, "llama");
        assert_eq!(metric_value(&m, MetricPath::GpuUtilization), Some(70.0));
        assert_eq!(metric_value(&m, MetricPath::MemoryPercent), Some(96.0));
        assert_eq!(metric_value(&m, MetricPath::GpuTemperature), Some(88.0));
        assert_eq!(metric_value(&m, MetricPath::GpuMemoryUsage), Some(20.0));
        assert_eq!(metric_value(&m, MetricPath::CpuUsage), Some(10.0));

        let bare = NodeMetrics::default();
        assert_eq!(metric_value(&bare, MetricPath::GpuTemperature), None);
    }
}
