//! Single-node status probe.

use std::time::Duration;

use http::StatusCode;
use tracing::debug;

use inferops_agent::{AgentClient, AgentError};
use inferops_core::NodeConfig;
use inferops_state::NodeMetrics;

/// Result of one status probe.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeResult {
    /// 200 with parseable telemetry.
    Healthy(NodeMetrics),
    /// The agent answered with a non-200 status.
    Unhealthy(StatusCode),
    /// Connection error, timeout, or malformed telemetry.
    Failed(String),
}

impl ProbeResult {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeResult::Healthy(_))
    }

    /// Metrics to store, `None` unless healthy.
    pub fn into_metrics(self) -> Option<NodeMetrics> {
        match self {
            ProbeResult::Healthy(m) => Some(m),
            _ => None,
        }
    }
}

/// Probe `GET {agent_url}/status` within `timeout`.
pub async fn probe(client: &AgentClient, node: &NodeConfig, timeout: Duration) -> ProbeResult {
    match client.fetch_status(node, timeout).await {
        Ok(metrics) => ProbeResult::Healthy(metrics),
        Err(AgentError::Status { status, .. }) => {
            debug!(node_id = node.id, %status, "status probe non-200");
            ProbeResult::Unhealthy(status)
        }
        Err(e) => {
            debug!(node_id = node.id, error = %e, "status probe failed");
            ProbeResult::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inferops_testkit::{FakeAgent, node_config, telemetry, unreachable_url};

    const TIMEOUT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn healthy_agent_yields_metrics() {
        let agent = FakeAgent::start(telemetry(25.0, 50.0, 60.0, "llama")).await;
        let node = node_config(1, &agent.url(), "http://127.0.0.1:1/api/chat", 1.0);

        let result = probe(&AgentClient::new(), &node, TIMEOUT).await;
        assert!(result.is_healthy());
        let m = result.into_metrics().unwrap();
        assert_eq!(m.gpu_utilization(), Some(25.0));
    }

    #[tokio::test]
    async fn non_200_is_unhealthy() {
        let agent = FakeAgent::start(telemetry(25.0, 50.0, 60.0, "llama")).await;
        agent.fail_status(Some(500));
        let node = node_config(1, &agent.url(), "http://127.0.0.1:1/api/chat", 1.0);

        let result = probe(&AgentClient::new(), &node, TIMEOUT).await;
        assert_eq!(result, ProbeResult::Unhealthy(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(result.into_metrics().is_none());
    }

    #[tokio::test]
    async fn refused_connection_fails() {
        let node = node_config(1, &unreachable_url().await, "http://127.0.0.1:1/api/chat", 1.0);
        let result = probe(&AgentClient::new(), &node, TIMEOUT).await;
        assert!(matches!(result, ProbeResult::Failed(_)));
    }

    #[tokio::test]
    async fn malformed_telemetry_fails() {
        let agent = FakeAgent::start(telemetry(25.0, 50.0, 60.0, "llama")).await;
        agent.malformed_status(true);
        let node = node_config(1, &agent.url(), "http://127.0.0.1:1/api/chat", 1.0);

        let result = probe(&AgentClient::new(), &node, TIMEOUT).await;
        assert!(matches!(result, ProbeResult::Failed(_)));
    }
}
