//! Snapshot the store and score it.

use std::sync::Arc;

use tracing::debug;

use inferops_core::NodeConfig;
use inferops_state::StateStore;

use crate::scorer::{Selection, select_node};

/// Reentrant selection entry point shared by chat sessions and batch jobs.
#[derive(Clone)]
pub struct Scheduler {
    nodes: Arc<[NodeConfig]>,
    state: StateStore,
}

impl Scheduler {
    pub fn new(nodes: Arc<[NodeConfig]>, state: StateStore) -> Self {
        Self { nodes, state }
    }

    /// Best node for `requested_model` in the current snapshot.
    pub fn pick(&self, requested_model: Option<&str>) -> Option<Selection> {
        let snapshot = self.state.snapshot_all();
        let selection = select_node(&snapshot, &self.nodes, requested_model);
        match &selection {
            Some(sel) => debug!(
                node_id = sel.node.id,
                score = sel.score,
                load = sel.load,
                model = ?requested_model,
                "node selected"
            ),
            None => debug!(model = ?requested_model, "no eligible node"),
        }
        selection
    }

    pub fn nodes(&self) -> &[NodeConfig] {
        &self.nodes
    }
}
