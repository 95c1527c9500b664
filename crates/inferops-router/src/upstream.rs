//! Client for node inference endpoints.

use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, USER_AGENT};
use http::{Method, Request, Response, Uri};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use serde::Serialize;
use tracing::debug;

use inferops_agent::HttpClient;

use crate::error::UpstreamError;

/// POSTs chat payloads to inference servers.
///
/// `timeout` bounds the connect-and-headers phase and, for streamed
/// responses, each individual body read.
#[derive(Clone)]
pub struct UpstreamClient {
    http: HttpClient,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(http: HttpClient, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `payload` and return the response once headers arrive.
    /// Non-2xx statuses are errors.
    pub async fn send<T: Serialize>(
        &self,
        url: &str,
        payload: &T,
    ) -> Result<Response<Incoming>, UpstreamError> {
        let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| UpstreamError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let body = serde_json::to_vec(payload)?;
        let req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, "inferops-gateway/0.1")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| UpstreamError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let resp = match tokio::time::timeout(self.timeout, self.http.request(req)).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => return Err(UpstreamError::Transport(e.to_string())),
            Err(_) => {
                debug!(%url, "upstream connect timed out");
                return Err(UpstreamError::Timeout);
            }
        };

        if !resp.status().is_success() {
            return Err(UpstreamError::Status(resp.status()));
        }
        Ok(resp)
    }

    /// Send `payload` and collect the whole response body.
    pub async fn complete<T: Serialize>(
        &self,
        url: &str,
        payload: &T,
    ) -> Result<Bytes, UpstreamError> {
        let resp = self.send(url, payload).await?;
        match tokio::time::timeout(self.timeout, resp.into_body().collect()).await {
            Ok(Ok(collected)) => Ok(collected.to_bytes()),
            Ok(Err(e)) => Err(UpstreamError::Body(e.to_string())),
            Err(_) => Err(UpstreamError::Timeout),
        }
    }
}
