//! The gateway's handle on a reservation it holds.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, error, warn};

use inferops_agent::{LockCoordinator, LockOutcome};
use inferops_core::NodeConfig;

/// A node locked on its agent by this process.
///
/// Call [`release`](Self::release) on every exit path. Dropping an
/// unreleased lease spawns the unlock on the current runtime, which
/// covers panics and aborted tasks.
pub struct NodeLease {
    node: NodeConfig,
    locks: Arc<LockCoordinator>,
    released: bool,
}

impl NodeLease {
    /// Lock `node`, or return the failed outcome.
    pub async fn acquire(
        node: NodeConfig,
        locks: Arc<LockCoordinator>,
    ) -> Result<Self, LockOutcome> {
        match locks.lock(&node).await {
            LockOutcome::Acquired => Ok(Self {
                node,
                locks,
                released: false,
            }),
            other => Err(other),
        }
    }

    pub fn node(&self) -> &NodeConfig {
        &self.node
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Unlock the node. Only the first call reaches the agent.
    pub async fn release(&mut self) -> bool {
        if self.released {
            return true;
        }
        let ok = self.locks.unlock(&self.node).await;
        self.released = true;
        debug!(node_id = self.node.id, ok, "lease released");
        ok
    }
}

impl Drop for NodeLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        warn!(node_id = self.node.id, "lease dropped unreleased, unlocking in background");

        let locks = self.locks.clone();
        let node = self.node.clone();
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    locks.unlock(&node).await;
                });
            }
            Err(_) => error!(node_id = node.id, "no runtime to release node lock"),
        }
    }
}
