//! Background loop that refreshes node status.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use inferops_agent::AgentClient;
use inferops_core::NodeConfig;
use inferops_state::StateStore;

use crate::checker::{ProbeResult, probe};

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub online: usize,
    pub offline: usize,
}

/// Polls every node agent on a fixed interval.
pub struct HealthPoller {
    state: StateStore,
    nodes: Arc<[NodeConfig]>,
    client: AgentClient,
    interval: Duration,
    timeout: Duration,
}

impl HealthPoller {
    pub fn new(
        state: StateStore,
        nodes: Arc<[NodeConfig]>,
        client: AgentClient,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            state,
            nodes,
            client,
            interval,
            timeout,
        }
    }

    /// Probe every node concurrently and apply the results.
    ///
    /// Returns once every probe has resolved; a slow or dead node costs at
    /// most one probe timeout and never holds up the others.
    pub async fn poll_once(&self) -> CycleSummary {
        let results = join_all(self.nodes.iter().map(|node| async move {
            (node, probe(&self.client, node, self.timeout).await)
        }))
        .await;

        let mut summary = CycleSummary::default();
        for (node, result) in results {
            let online = result.is_healthy();
            let reason = match &result {
                ProbeResult::Healthy(_) => None,
                ProbeResult::Unhealthy(status) => Some(format!("status {status}")),
                ProbeResult::Failed(e) => Some(e.clone()),
            };

            let was_online = match self.state.update_node(node.id, online, result.into_metrics()) {
                Ok(prev) => prev,
                Err(e) => {
                    error!(node_id = node.id, error = %e, "failed to record probe result");
                    continue;
                }
            };

            match (was_online, online) {
                (false, true) => info!(node_id = node.id, node = %node.name, "node online"),
                (true, false) => warn!(
                    node_id = node.id,
                    node = %node.name,
                    reason = reason.as_deref().unwrap_or_default(),
                    "node offline"
                ),
                _ => {}
            }

            if online {
                summary.online += 1;
            } else {
                summary.offline += 1;
            }
        }
        summary
    }

    /// Poll until `shutdown` flips. The first cycle runs immediately.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            nodes = self.nodes.len(),
            interval = ?self.interval,
            timeout = ?self.timeout,
            "health poller started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    let summary = self.poll_once().await;
                    debug!(online = summary.online, offline = summary.offline, "poll cycle complete");
                }
                _ = shutdown.changed() => {
                    debug!("health poller shutting down");
                    break;
                }
            }
        }
    }
}
