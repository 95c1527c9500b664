//! Soft-lock reservation protocol.
//!
//! The agent owns the lock flag and is the only arbiter of mutual
//! exclusion. The gateway's cached `NodeMetrics::locked` is a hint that
//! can be stale between polls, so `lock` may conflict on a node the
//! scheduler believed free. `unlock` is idempotent on the agent side and
//! is safe to call from every failure path.

use std::time::Duration;

use futures_util::future::join_all;
use http::StatusCode;
use serde::Serialize;
use tracing::{debug, info, warn};

use inferops_core::{NodeConfig, NodeId};

use crate::client::AgentClient;

/// Result of a lock attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// The agent granted exclusive reservation.
    Acquired,
    /// The node was already reserved (409).
    Conflict,
    /// The agent answered with an unexpected status.
    Rejected(StatusCode),
    /// Transport failure or timeout.
    Unreachable,
}

impl LockOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, LockOutcome::Acquired)
    }
}

/// Which nodes a bulk unlock reached.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnlockReport {
    pub unlocked: Vec<NodeId>,
    pub failed: Vec<NodeId>,
}

impl UnlockReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drives lock/unlock RPCs against node agents.
#[derive(Clone)]
pub struct LockCoordinator {
    client: AgentClient,
    timeout: Duration,
}

impl LockCoordinator {
    pub fn new(client: AgentClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Ask the node's agent for exclusive reservation.
    pub async fn lock(&self, node: &NodeConfig) -> LockOutcome {
        match self.client.post(node, "/lock", self.timeout).await {
            Ok(StatusCode::OK) => {
                debug!(node_id = node.id, "node locked");
                LockOutcome::Acquired
            }
            Ok(StatusCode::CONFLICT) => {
                debug!(node_id = node.id, "node already locked");
                LockOutcome::Conflict
            }
            Ok(status) => {
                warn!(node_id = node.id, %status, "unexpected lock response");
                LockOutcome::Rejected(status)
            }
            Err(e) => {
                warn!(node_id = node.id, error = %e, "lock request failed");
                LockOutcome::Unreachable
            }
        }
    }

    /// Release the node's reservation. `true` iff the agent answered 200.
    pub async fn unlock(&self, node: &NodeConfig) -> bool {
        match self.client.post(node, "/unlock", self.timeout).await {
            Ok(StatusCode::OK) => {
                debug!(node_id = node.id, "node unlocked");
                true
            }
            Ok(status) => {
                warn!(node_id = node.id, %status, "unexpected unlock response");
                false
            }
            Err(e) => {
                warn!(node_id = node.id, error = %e, "unlock request failed");
                false
            }
        }
    }

    /// Send an unlock to every node concurrently.
    pub async fn unlock_all(&self, nodes: &[NodeConfig]) -> UnlockReport {
        let results = join_all(
            nodes
                .iter()
                .map(|node| async move { (node.id, self.unlock(node).await) }),
        )
        .await;

        let mut report = UnlockReport::default();
        for (id, ok) in results {
            if ok {
                report.unlocked.push(id);
            } else {
                report.failed.push(id);
            }
        }
        info!(
            unlocked = report.unlocked.len(),
            failed = report.failed.len(),
            "bulk unlock finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_acquired_counts_as_locked() {
        assert!(LockOutcome::Acquired.is_acquired());
        assert!(!LockOutcome::Conflict.is_acquired());
        assert!(!LockOutcome::Unreachable.is_acquired());
        assert!(!LockOutcome::Rejected(StatusCode::INTERNAL_SERVER_ERROR).is_acquired());
    }

    #[test]
    fn report_success_requires_no_failures() {
        let mut report = UnlockReport {
            unlocked: vec![1, 2],
            failed: vec![],
        };
        assert!(report.all_succeeded());
        report.failed.push(3);
        assert!(!report.all_succeeded());
    }
}
