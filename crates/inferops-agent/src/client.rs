//! HTTP client for the node agent endpoints.
//!
//! One pooled hyper client is shared by every call; each call is bounded
//! by the timeout passed in by the caller (probe timeout for `/status`,
//! lock timeout for `/lock` and `/unlock`).

use std::time::Duration;

use bytes::Bytes;
use http::header::USER_AGENT;
use http::{Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

use inferops_core::NodeConfig;
use inferops_state::NodeMetrics;

use crate::error::{AgentError, AgentResult};

/// Pooled HTTP/1 client used for all outbound gateway traffic.
pub type HttpClient = Client<HttpConnector, Full<Bytes>>;

/// Build a pooled HTTP/1 client on the tokio executor.
pub fn http_client() -> HttpClient {
    Client::builder(TokioExecutor::new()).build_http()
}

/// Client for the node agent contract.
#[derive(Clone)]
pub struct AgentClient {
    http: HttpClient,
}

impl AgentClient {
    pub fn new() -> Self {
        Self {
            http: http_client(),
        }
    }

    /// `GET /status` and parse the telemetry.
    ///
    /// Anything other than a 200 with well-formed JSON is an error.
    pub async fn fetch_status(
        &self,
        node: &NodeConfig,
        timeout: Duration,
    ) -> AgentResult<NodeMetrics> {
        let url = node.agent_endpoint("/status");
        let (status, body) = self.call(Method::GET, &url, timeout).await?;
        if status != StatusCode::OK {
            return Err(AgentError::Status { url, status });
        }
        serde_json::from_slice(&body).map_err(|e| AgentError::Telemetry {
            url,
            reason: e.to_string(),
        })
    }

    /// `POST` to an agent control endpoint and return the response status.
    ///
    /// Non-2xx statuses are returned as values; only transport failures
    /// and timeouts are errors.
    pub async fn post(
        &self,
        node: &NodeConfig,
        path: &str,
        timeout: Duration,
    ) -> AgentResult<StatusCode> {
        let url = node.agent_endpoint(path);
        let (status, _) = self.call(Method::POST, &url, timeout).await?;
        Ok(status)
    }

    async fn call(
        &self,
        method: Method,
        url: &str,
        timeout: Duration,
    ) -> AgentResult<(StatusCode, Bytes)> {
        let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| AgentError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_AGENT, "inferops-gateway/0.1")
            .body(Full::new(Bytes::new()))
            .map_err(|e| AgentError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let transport = |reason: String| AgentError::Transport {
            url: url.to_string(),
            reason,
        };

        let exchange = async {
            let resp = self
                .http
                .request(req)
                .await
                .map_err(|e| transport(e.to_string()))?;
            let status = resp.status();
            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| transport(e.to_string()))?
                .to_bytes();
            Ok((status, body))
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                debug!(%url, ?timeout, "agent request timed out");
                Err(AgentError::Timeout {
                    url: url.to_string(),
                })
            }
        }
    }
}

impl Default for AgentClient {
    fn default() -> Self {
        Self::new()
    }
}
