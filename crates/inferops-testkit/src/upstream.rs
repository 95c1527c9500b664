//! Fake inference upstream speaking newline-delimited JSON.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::stream;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

/// What the upstream does once a request arrives.
#[derive(Debug, Clone)]
pub enum UpstreamScript {
    /// Send every chunk, sleeping `delay` before each, then end the body.
    Chunks { chunks: Vec<String>, delay: Duration },
    /// Send the chunks, then abort the connection mid-body.
    FailAfter { chunks: Vec<String>, delay: Duration },
    /// Send the chunks, then hold the connection open without writing.
    Stall { chunks: Vec<String> },
    /// Answer with a bare status code.
    Status(u16),
}

impl UpstreamScript {
    /// A well-formed completion: one message line per word, then the
    /// terminal `"done":true` line.
    pub fn completion(words: &[&str]) -> Self {
        UpstreamScript::Chunks {
            chunks: completion_lines(words),
            delay: Duration::ZERO,
        }
    }
}

/// NDJSON lines for a completion streaming `words`.
pub fn completion_lines(words: &[&str]) -> Vec<String> {
    let mut lines: Vec<String> = words
        .iter()
        .map(|w| format!("{}\n", json!({"message": {"role": "assistant", "content": w}, "done": false})))
        .collect();
    lines.push("{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n".to_string());
    lines
}

enum Tail {
    End,
    Fail,
    Stall,
}

struct Shared {
    script: Mutex<UpstreamScript>,
    requests: Mutex<Vec<Value>>,
}

/// An in-process inference server listening on an ephemeral port.
pub struct FakeUpstream {
    addr: SocketAddr,
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

impl FakeUpstream {
    pub async fn start(script: UpstreamScript) -> Self {
        let shared = Arc::new(Shared {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/api/chat", post(chat))
            .with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake upstream");
        let addr = listener.local_addr().expect("fake upstream addr");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            shared,
            handle,
        }
    }

    /// Full inference URL, e.g. `http://127.0.0.1:41235/api/chat`.
    pub fn url(&self) -> String {
        format!("http://{}/api/chat", self.addr)
    }

    pub fn set_script(&self, script: UpstreamScript) {
        *self.shared.script.lock().unwrap() = script;
    }

    /// Every JSON body received so far, in arrival order.
    pub fn requests(&self) -> Vec<Value> {
        self.shared.requests.lock().unwrap().clone()
    }
}

impl Drop for FakeUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn chat(State(shared): State<Arc<Shared>>, Json(body): Json<Value>) -> Response {
    shared.requests.lock().unwrap().push(body);
    let script = shared.script.lock().unwrap().clone();

    let (chunks, delay, tail) = match script {
        UpstreamScript::Status(code) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return (status, "upstream error").into_response();
        }
        UpstreamScript::Chunks { chunks, delay } => (chunks, delay, Tail::End),
        UpstreamScript::FailAfter { chunks, delay } => (chunks, delay, Tail::Fail),
        UpstreamScript::Stall { chunks } => (chunks, Duration::ZERO, Tail::Stall),
    };

    let body = stream::unfold(
        (chunks.into_iter(), Some(tail)),
        move |(mut chunks, tail)| async move {
            if let Some(chunk) = chunks.next() {
                tokio::time::sleep(delay).await;
                return Some((Ok(Bytes::from(chunk)), (chunks, tail)));
            }
            match tail? {
                Tail::End => None,
                Tail::Fail => Some((
                    Err(std::io::Error::other("upstream aborted")),
                    (chunks, None),
                )),
                Tail::Stall => {
                    std::future::pending::<()>().await;
                    None
                }
            }
        },
    );

    Response::builder()
        .header("content-type", "application/x-ndjson")
        .body(Body::from_stream(body))
        .unwrap()
}
