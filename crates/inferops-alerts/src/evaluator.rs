//! Periodic alert rule evaluation with cooldown bookkeeping.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use inferops_core::NodeId;
use inferops_state::{Alert, NodeRecord, StateStore};

use crate::rules::{AlertRule, metric_value};

/// Evaluates rules against the state store and publishes active alerts.
///
/// Last-firing times live behind a mutex so one evaluator can be shared
/// between the background loop and anything else that triggers a cycle.
pub struct AlertEvaluator {
    state: StateStore,
    rules: Vec<AlertRule>,
    last_fired: Mutex<HashMap<(String, NodeId), Instant>>,
}

impl AlertEvaluator {
    pub fn new(state: StateStore, rules: Vec<AlertRule>) -> Self {
        Self {
            state,
            rules,
            last_fired: Mutex::new(HashMap::new()),
        }
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    /// Alerts that fire for `snapshot` at `now`. Only mutates cooldown state.
    pub fn evaluate_at(&self, snapshot: &[NodeRecord], now: Instant) -> Vec<Alert> {
        let mut last_fired = self
            .last_fired
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let timestamp = epoch_secs_f64();
        let mut alerts = Vec::new();

        for record in snapshot {
            if !record.online {
                continue;
            }
            let Some(metrics) = record.metrics.as_ref() else {
                continue;
            };

            for rule in &self.rules {
                let Some(value) = metric_value(metrics, rule.metric) else {
                    continue;
                };
                if !rule.breached(value) {
                    continue;
                }

                let key = (rule.id.clone(), record.id);
                let cooled = last_fired
                    .get(&key)
                    .is_none_or(|last| now.saturating_duration_since(*last) >= rule.cooldown);
                if !cooled {
                    debug!(rule = %rule.id, node_id = record.id, "alert suppressed by cooldown");
                    continue;
                }

                last_fired.insert(key, now);
                warn!(
                    rule = %rule.id,
                    node_id = record.id,
                    metric = %rule.metric,
                    value,
                    level = %rule.level,
                    "alert fired"
                );
                alerts.push(Alert {
                    id: format!("{}_{}", rule.id, record.id),
                    level: rule.level,
                    message: rule.render(&record.name, value),
                    timestamp,
                });
            }
        }

        alerts
    }

    /// Evaluate the current snapshot and replace the active-alert list.
    pub fn evaluate(&self) -> usize {
        let alerts = self.evaluate_at(&self.state.snapshot_all(), Instant::now());
        let count = alerts.len();
        self.state.set_alerts(alerts);
        count
    }

    /// Evaluate every `interval` until `shutdown` flips.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(?interval, rules = self.rules.len(), "alert evaluator started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let fired = self.evaluate();
                    debug!(fired, "alert cycle complete");
                }
                _ = shutdown.changed() => {
                    info!("alert evaluator shutting down");
                    break;
                }
            }
        }
    }
}

fn epoch_secs_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
