//! The gateway's single source of truth for node status.
//!
//! Node records are kept in configuration order so that every snapshot
//! iterates nodes the same way. The node list and the alert list are
//! guarded by independent locks; neither is ever held while awaiting.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use inferops_core::NodeConfig;

use crate::error::{StateError, StateResult};
use crate::types::*;

struct Inner {
    nodes: RwLock<Vec<NodeRecord>>,
    alerts: RwLock<Vec<Alert>>,
}

/// Thread-safe in-memory state store.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<Inner>,
}

impl StateStore {
    /// Create a store with one offline record per configured node.
    pub fn new(nodes: &[NodeConfig]) -> Self {
        let records = nodes
            .iter()
            .map(|n| NodeRecord::new(n.id, n.name.clone()))
            .collect::<Vec<_>>();
        debug!(nodes = records.len(), "state store initialized");
        Self {
            inner: Arc::new(Inner {
                nodes: RwLock::new(records),
                alerts: RwLock::new(Vec::new()),
            }),
        }
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Deep copy of every node record, in configuration order.
    pub fn snapshot_all(&self) -> Vec<NodeRecord> {
        self.inner
            .nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Copy of a single node record.
    pub fn node(&self, id: NodeId) -> Option<NodeRecord> {
        self.inner
            .nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Atomically replace a node's `online` flag and metrics.
    ///
    /// Metrics are dropped when `online` is false. Returns the previous
    /// `online` value so callers can detect transitions.
    pub fn update_node(
        &self,
        id: NodeId,
        online: bool,
        metrics: Option<NodeMetrics>,
    ) -> StateResult<bool> {
        let mut nodes = self
            .inner
            .nodes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let record = nodes
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StateError::NodeNotFound(id))?;

        let was_online = record.online;
        record.online = online;
        record.metrics = if online { metrics } else { None };
        Ok(was_online)
    }

    /// Sorted, de-duplicated model ids served by online nodes.
    pub fn available_models(&self) -> Vec<String> {
        let nodes = self
            .inner
            .nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        nodes
            .iter()
            .filter(|r| r.online)
            .filter_map(|r| r.metrics.as_ref()?.model_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    // ── Alerts ─────────────────────────────────────────────────────

    /// Replace the whole active-alerts list.
    pub fn set_alerts(&self, alerts: Vec<Alert>) {
        *self
            .inner
            .alerts
            .write()
            .unwrap_or_else(PoisonError::into_inner) = alerts;
    }

    /// Copy of the active-alerts list.
    pub fn get_alerts(&self) -> Vec<Alert> {
        self.inner
            .alerts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
