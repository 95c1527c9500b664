//! Pure node scoring.

use serde::Serialize;

use inferops_core::NodeConfig;
use inferops_state::{NodeMetrics, NodeRecord};

const GPU_UTIL_WEIGHT: f64 = 0.6;
const MEM_WEIGHT: f64 = 0.3;
const TEMP_WEIGHT: f64 = 0.1;

const DEFAULT_GPU_UTIL: f64 = 100.0;
const DEFAULT_MEM_PERCENT: f64 = 100.0;
const DEFAULT_GPU_TEMP: f64 = 80.0;

/// Keeps a fully idle node from dividing by zero.
const EPSILON: f64 = 1e-6;

/// The node chosen for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub node: NodeConfig,
    pub score: f64,
    pub load: f64,
    /// Model the node reported serving, if any.
    pub model_id: Option<String>,
}

/// Weighted load of a node; missing fields count as worst case.
pub fn dynamic_load(metrics: &NodeMetrics) -> f64 {
    let gpu = metrics.gpu_utilization().unwrap_or(DEFAULT_GPU_UTIL);
    let mem = metrics.memory_percent().unwrap_or(DEFAULT_MEM_PERCENT);
    let temp = metrics.gpu_temperature().unwrap_or(DEFAULT_GPU_TEMP);
    GPU_UTIL_WEIGHT * gpu + MEM_WEIGHT * mem + TEMP_WEIGHT * temp
}

/// Choose the eligible node with the greatest score.
///
/// Nodes are visited in `nodes` order and only a strictly greater score
/// replaces the current best, so exact ties go to the earlier node.
/// An empty `requested_model` is treated as no filter.
pub fn select_node(
    snapshot: &[NodeRecord],
    nodes: &[NodeConfig],
    requested_model: Option<&str>,
) -> Option<Selection> {
    let requested_model = requested_model.filter(|m| !m.is_empty());
    let mut best: Option<Selection> = None;

    for node in nodes {
        let Some(record) = snapshot.iter().find(|r| r.id == node.id) else {
            continue;
        };
        if !record.online {
            continue;
        }
        let Some(metrics) = record.metrics.as_ref() else {
            continue;
        };
        if metrics.locked {
            continue;
        }
        if let Some(model) = requested_model {
            if metrics.model_id.as_deref() != Some(model) {
                continue;
            }
        }

        let load = dynamic_load(metrics);
        let score = node.static_weight / (load + EPSILON);
        if best.as_ref().is_none_or(|b| score > b.score) {
            best = Some(Selection {
                node: node.clone(),
                score,
                load,
                model_id: metrics.model_id.clone(),
            });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use inferops_state::{GpuInfo, MemoryInfo};
    use inferops_testkit::{metrics, node_config};

    fn config(id: u32, weight: f64) -> NodeConfig {
        node_config(
            id,
            &format!("http://10.0.0.{id}:8001"),
            &format!("http://10.0.0.{id}:11434/api/chat"),
            weight,
        )
    }

    fn online(id: u32, m: NodeMetrics) -> NodeRecord {
        NodeRecord {
            id,
            name: format!("node-{id}"),
            online: true,
            metrics: Some(m),
        }
    }

    fn fleet() -> (Vec<NodeRecord>, Vec<NodeConfig>) {
        let snapshot = vec![
            online(1, metrics(10.0, 20.0, 60.0, "llama")),
            online(2, metrics(5.0, 10.0, 50.0, "llama")),
            online(3, metrics(80.0, 90.0, 85.0, "qwen")),
        ];
        let nodes = vec![config(1, 10.0), config(2, 5.0), config(3, 2.0)];
        (snapshot, nodes)
    }

    #[test]
    fn load_is_weighted_sum() {
        let (snapshot, _) = fleet();
        let loads: Vec<f64> = snapshot
            .iter()
            .map(|r| dynamic_load(r.metrics.as_ref().unwrap()))
            .collect();
        assert!((loads[0] - 18.0).abs() < 1e-9);
        assert!((loads[1] - 11.0).abs() < 1e-9);
        assert!((loads[2] - 83.5).abs() < 1e-9);
    }

    #[test]
    fn picks_highest_weight_to_load_ratio() {
        let (snapshot, nodes) = fleet();
        let sel = select_node(&snapshot, &nodes, None).unwrap();
        assert_eq!(sel.node.id, 1);
        assert!((sel.score - 10.0 / 18.0).abs() < 1e-4);
        assert_eq!(sel.model_id.as_deref(), Some("llama"));
    }

    #[test]
    fn missing_telemetry_is_worst_case_not_excluded() {
        let m = NodeMetrics::default();
        assert!((dynamic_load(&m) - (60.0 + 30.0 + 8.0)).abs() < 1e-9);

        let partial = NodeMetrics {
            gpu: Some(GpuInfo {
                utilization_percent: Some(0.0),
                ..Default::default()
            }),
            memory: Some(MemoryInfo::default()),
            ..Default::default()
        };
        assert!((dynamic_load(&partial) - (30.0 + 8.0)).abs() < 1e-9);

        let snapshot = vec![online(1, NodeMetrics::default())];
        let sel = select_node(&snapshot, &[config(1, 1.0)], None).unwrap();
        assert_eq!(sel.node.id, 1);
    }

    #[test]
    fn filters_offline_locked_and_metricless() {
        let (mut snapshot, nodes) = fleet();
        snapshot[0].online = false;
        snapshot[0].metrics = None;
        snapshot[1].metrics.as_mut().unwrap().locked = true;
        let sel = select_node(&snapshot, &nodes, None).unwrap();
        assert_eq!(sel.node.id, 3);

        snapshot[2].metrics = None;
        assert!(select_node(&snapshot, &nodes, None).is_none());
    }

    #[test]
    fn model_filter_excludes_mismatches() {
        let (snapshot, nodes) = fleet();
        let sel = select_node(&snapshot, &nodes, Some("qwen")).unwrap();
        assert_eq!(sel.node.id, 3);
        assert!(select_node(&snapshot, &nodes, Some("mistral")).is_none());
    }

    #[test]
    fn empty_model_means_no_filter() {
        let (snapshot, nodes) = fleet();
        let sel = select_node(&snapshot, &nodes, Some("")).unwrap();
        assert_eq!(sel.node.id, 1);
    }

    #[test]
    fn ties_go_to_first_in_config_order() {
        let snapshot = vec![
            online(7, metrics(10.0, 10.0, 50.0, "m")),
            online(2, metrics(10.0, 10.0, 50.0, "m")),
        ];
        let nodes = vec![config(7, 1.0), config(2, 1.0)];
        assert_eq!(select_node(&snapshot, &nodes, None).unwrap().node.id, 7);

        let reversed = vec![config(2, 1.0), config(7, 1.0)];
        assert_eq!(select_node(&snapshot, &reversed, None).unwrap().node.id, 2);
    }

    #[test]
    fn idle_node_does_not_divide_by_zero() {
        let snapshot = vec![online(1, metrics(0.0, 0.0, 0.0, "m"))];
        let sel = select_node(&snapshot, &[config(1, 1.0)], None).unwrap();
        assert!(sel.score.is_finite());
    }

    #[test]
    fn never_selects_an_ineligible_node() {
        let models = ["a", "b"];
        for mask in 0u32..64 {
            let snapshot: Vec<NodeRecord> = (0..3)
                .map(|i| {
                    let bit = |b: u32| mask & (1 << (i * 2 + b)) != 0;
                    let mut m = metrics(10.0 * i as f64, 20.0, 50.0, models[i as usize % 2]);
                    m.locked = bit(0);
                    NodeRecord {
                        id: i,
                        name: format!("n{i}"),
                        online: bit(1),
                        metrics: if bit(1) { Some(m) } else { None },
                    }
                })
                .collect();
            let nodes: Vec<NodeConfig> = (0..3).map(|i| config(i, 1.0)).collect();

            for requested in [None, Some("a"), Some("b")] {
                if let Some(sel) = select_node(&snapshot, &nodes, requested) {
                    let r = &snapshot[sel.node.id as usize];
                    let m = r.metrics.as_ref().unwrap();
                    assert!(r.online);
                    assert!(!m.locked);
                    if let Some(model) = requested {
                        assert_eq!(m.model_id.as_deref(), Some(model));
                    }
                }
            }
        }
    }
}
