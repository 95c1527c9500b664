//! Fake node agent.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{Json, Router};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

struct Control {
    telemetry: Value,
    status_code: Option<u16>,
    lock_code: Option<u16>,
    unlock_code: Option<u16>,
    malformed: bool,
    delay: Duration,
}

struct Shared {
    locked: AtomicBool,
    lock_calls: AtomicUsize,
    unlock_calls: AtomicUsize,
    status_calls: AtomicUsize,
    control: Mutex<Control>,
}

impl Shared {
    fn control<R>(&self, f: impl FnOnce(&mut Control) -> R) -> R {
        f(&mut self.control.lock().unwrap())
    }
}

/// An in-process node agent listening on an ephemeral port.
pub struct FakeAgent {
    addr: SocketAddr,
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

impl FakeAgent {
    /// Start an agent reporting `telemetry` from `GET /status`.
    pub async fn start(telemetry: Value) -> Self {
        let shared = Arc::new(Shared {
            locked: AtomicBool::new(false),
            lock_calls: AtomicUsize::new(0),
            unlock_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            control: Mutex::new(Control {
                telemetry,
                status_code: None,
                lock_code: None,
                unlock_code: None,
                malformed: false,
                delay: Duration::ZERO,
            }),
        });

        let app = Router::new()
            .route("/status", get(status))
            .route("/lock", post(lock))
            .route("/unlock", post(unlock))
            .with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake agent");
        let addr = listener.local_addr().expect("fake agent addr");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            shared,
            handle,
        }
    }

    /// Base URL, e.g. `http://127.0.0.1:41234`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn is_locked(&self) -> bool {
        self.shared.locked.load(Ordering::SeqCst)
    }

    /// Force the reservation flag, as if another gateway held the lock.
    pub fn set_locked(&self, locked: bool) {
        self.shared.locked.store(locked, Ordering::SeqCst);
    }

    pub fn lock_calls(&self) -> usize {
        self.shared.lock_calls.load(Ordering::SeqCst)
    }

    pub fn unlock_calls(&self) -> usize {
        self.shared.unlock_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.shared.status_calls.load(Ordering::SeqCst)
    }

    pub fn set_telemetry(&self, telemetry: Value) {
        self.shared.control(|c| c.telemetry = telemetry);
    }

    /// Make `GET /status` answer with `code` instead of telemetry.
    pub fn fail_status(&self, code: Option<u16>) {
        self.shared.control(|c| c.status_code = code);
    }

    /// Make `GET /status` answer 200 with a body that is not JSON.
    pub fn malformed_status(&self, malformed: bool) {
        self.shared.control(|c| c.malformed = malformed);
    }

    /// Make `POST /lock` answer with `code` regardless of lock state.
    pub fn fail_lock(&self, code: Option<u16>) {
        self.shared.control(|c| c.lock_code = code);
    }

    /// Make `POST /unlock` answer with `code` and leave the lock held.
    pub fn fail_unlock(&self, code: Option<u16>) {
        self.shared.control(|c| c.unlock_code = code);
    }

    /// Delay every response by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.shared.control(|c| c.delay = delay);
    }
}

impl Drop for FakeAgent {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn with_status(code: u16) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"error": "injected"}))).into_response()
}

async fn status(State(shared): State<Arc<Shared>>) -> Response {
    shared.status_calls.fetch_add(1, Ordering::SeqCst);
    let (delay, code, malformed, mut telemetry) = shared.control(|c| {
        (c.delay, c.status_code, c.malformed, c.telemetry.clone())
    });
    tokio::time::sleep(delay).await;

    if let Some(code) = code {
        return with_status(code);
    }
    if malformed {
        return (StatusCode::OK, "<html>not telemetry</html>").into_response();
    }
    if let Some(obj) = telemetry.as_object_mut() {
        obj.insert(
            "locked".to_string(),
            Value::Bool(shared.locked.load(Ordering::SeqCst)),
        );
    }
    Json(telemetry).into_response()
}

async fn lock(State(shared): State<Arc<Shared>>) -> Response {
    shared.lock_calls.fetch_add(1, Ordering::SeqCst);
    let (delay, code) = shared.control(|c| (c.delay, c.lock_code));
    tokio::time::sleep(delay).await;

    if let Some(code) = code {
        return with_status(code);
    }
    match shared
        .locked
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
    {
        Ok(_) => Json(json!({"status": "locked"})).into_response(),
        Err(_) => (StatusCode::CONFLICT, Json(json!({"detail": "Node is already locked"})))
            .into_response(),
    }
}

async fn unlock(State(shared): State<Arc<Shared>>) -> Response {
    shared.unlock_calls.fetch_add(1, Ordering::SeqCst);
    let (delay, code) = shared.control(|c| (c.delay, c.unlock_code));
    tokio::time::sleep(delay).await;

    if let Some(code) = code {
        return with_status(code);
    }
    shared.locked.store(false, Ordering::SeqCst);
    Json(json!({"status": "unlocked"})).into_response()
}
