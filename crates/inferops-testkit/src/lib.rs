//! inferops-testkit — in-process fakes for integration tests.
//!
//! [`FakeAgent`] serves the node agent contract (`/status`, `/lock`,
//! `/unlock`) with real 200/409 lock semantics and call counters.
//! [`FakeUpstream`] serves a scripted NDJSON inference stream. Both bind
//! an ephemeral port on 127.0.0.1 and shut down when dropped.

pub mod agent;
pub mod upstream;

use std::time::Duration;

use serde_json::{Value, json};

use inferops_core::{NodeConfig, NodeId};
use inferops_state::{GpuInfo, MemoryInfo, NodeMetrics};

pub use agent::FakeAgent;
pub use upstream::{FakeUpstream, UpstreamScript, completion_lines};

/// Node config pointing at the given agent and inference endpoints.
pub fn node_config(
    id: NodeId,
    agent_url: &str,
    inference_url: &str,
    static_weight: f64,
) -> NodeConfig {
    NodeConfig {
        id,
        name: format!("node-{id}"),
        agent_url: agent_url.to_string(),
        inference_url: inference_url.to_string(),
        static_weight,
    }
}

/// Agent telemetry JSON with the fields the scheduler and alerts read.
pub fn telemetry(gpu_util: f64, mem_percent: f64, gpu_temp: f64, model: &str) -> Value {
    json!({
        "locked": false,
        "model_id": model,
        "cpu_usage_percent": 10.0,
        "cpu_model": "testkit-cpu",
        "memory": {
            "total": 68_719_476_736u64,
            "available": 34_359_738_368u64,
            "percent": mem_percent,
            "used": 34_359_738_368u64,
            "free": 34_359_738_368u64
        },
        "gpu": {
            "name": "testkit-gpu",
            "utilization_percent": gpu_util,
            "memory_usage_percent": 20.0,
            "temperature_celsius": gpu_temp
        }
    })
}

/// Typed counterpart of [`telemetry`].
pub fn metrics(gpu_util: f64, mem_percent: f64, gpu_temp: f64, model: &str) -> NodeMetrics {
    NodeMetrics {
        locked: false,
        model_id: Some(model.to_string()),
        cpu_usage_percent: Some(10.0),
        cpu_model: Some("testkit-cpu".to_string()),
        memory: Some(MemoryInfo {
            percent: Some(mem_percent),
            ..Default::default()
        }),
        gpu: Some(GpuInfo {
            name: Some("testkit-gpu".to_string()),
            utilization_percent: Some(gpu_util),
            memory_usage_percent: Some(20.0),
            temperature_celsius: Some(gpu_temp),
        }),
    }
}

/// A base URL nothing is listening on.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

/// Poll `check` every 10ms until it returns true or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
