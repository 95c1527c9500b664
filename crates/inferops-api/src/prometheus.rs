//! Prometheus text exposition format.
//!
//! Renders the node snapshot as gauges labelled by node id and name.
//! Gauges a node did not report are omitted rather than zero-filled.

use inferops_scheduler::dynamic_load;
use inferops_state::{Alert, NodeMetrics, NodeRecord};

type Extract = fn(&NodeMetrics) -> Option<f64>;

const METRIC_GAUGES: &[(&str, &str, Extract)] = &[
    (
        "inferops_node_locked",
        "Agent-reported reservation flag (1 = locked).",
        |m| Some(if m.locked { 1.0 } else { 0.0 }),
    ),
    (
        "inferops_gpu_utilization_percent",
        "GPU utilization percent.",
        |m| m.gpu_utilization(),
    ),
    (
        "inferops_gpu_memory_usage_percent",
        "GPU memory usage percent.",
        |m| m.gpu_memory_usage(),
    ),
    (
        "inferops_gpu_temperature_celsius",
        "GPU temperature in degrees Celsius.",
        |m| m.gpu_temperature(),
    ),
    (
        "inferops_memory_percent",
        "System memory usage percent.",
        |m| m.memory_percent(),
    ),
    (
        "inferops_cpu_usage_percent",
        "CPU usage percent.",
        |m| m.cpu_usage_percent,
    ),
    (
        "inferops_node_load",
        "Dynamic load factor used for scheduling.",
        |m| Some(dynamic_load(m)),
    ),
];

/// Render node gauges and the active alert count.
pub fn render_prometheus(nodes: &[NodeRecord], alerts: &[Alert]) -> String {
    let mut out = String::new();

    out.push_str("# HELP inferops_node_online Whether the last status probe succeeded.\n");
    out.push_str("# TYPE inferops_node_online gauge\n");
    for n in nodes {
        out.push_str(&format!(
            "inferops_node_online{{{}}} {}\n",
            labels(n),
            u8::from(n.online)
        ));
    }

    for (name, help, extract) in METRIC_GAUGES {
        out.push_str(&format!("# HELP {name} {help}\n"));
        out.push_str(&format!("# TYPE {name} gauge\n"));
        for n in nodes {
            let Some(value) = n.metrics.as_ref().and_then(extract) else {
                continue;
            };
            out.push_str(&format!("{name}{{{}}} {value:.2}\n", labels(n)));
        }
    }

    out.push_str("# HELP inferops_active_alerts Number of alerts fired in the last cycle.\n");
    out.push_str("# TYPE inferops_active_alerts gauge\n");
    out.push_str(&format!("inferops_active_alerts {}\n", alerts.len()));

    out
}

fn labels(n: &NodeRecord) -> String {
    format!(
        "node_id=\"{}\",node=\"{}\"",
        n.id,
        n.name.replace('\\', "\\\\").replace('"', "\\\"")
    )
}
