//! inferops-api — REST API for the InferOps gateway.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/chat/completions` | Stream a chat completion from the best node |
//! | GET | `/api/v1/status/all` | Cached status of every node |
//! | GET | `/api/v1/alerts` | Active alerts |
//! | GET | `/api/v1/models` | Models served by online nodes |
//! | POST | `/api/v1/unlock/all` | Force-unlock every node |
//! | POST | `/api/v1/dataset/jobs` | Create a batch job |
//! | GET | `/api/v1/dataset/jobs/{id}` | Batch job progress |
//! | GET | `/metrics` | Prometheus exposition |

pub mod chat;
pub mod handlers;
pub mod jobs;
pub mod prometheus;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use inferops_agent::{AgentClient, LockCoordinator, http_client};
use inferops_core::{GatewayConfig, NodeConfig};
use inferops_router::{StreamRouter, UpstreamClient};
use inferops_scheduler::Scheduler;
use inferops_state::StateStore;

pub use jobs::{DatasetJob, JobStatus, JobTable};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub router: StreamRouter,
    pub locks: Arc<LockCoordinator>,
    pub nodes: Arc<[NodeConfig]>,
    pub jobs: JobTable,
    pub merge_threshold: f64,
}

impl ApiState {
    /// Wire the router, lock coordinator and upstream client from config.
    pub fn from_config(config: &GatewayConfig, store: StateStore) -> Self {
        let nodes: Arc<[NodeConfig]> = config.nodes.clone().into();
        let locks = Arc::new(LockCoordinator::new(AgentClient::new(), config.lock_timeout()));
        let upstream = UpstreamClient::new(http_client(), config.upstream_timeout());
        let scheduler = Scheduler::new(nodes.clone(), store.clone());
        let router = StreamRouter::new(
            scheduler,
            locks.clone(),
            upstream,
            &config.upstream.completion_marker,
        );

        Self {
            store,
            router,
            locks,
            nodes,
            jobs: JobTable::default(),
            merge_threshold: config.batch.merge_threshold,
        }
    }
}

/// Build the complete API router (REST + metrics).
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/chat/completions", post(chat::chat_completions))
        .route("/status/all", get(handlers::status_all))
        .route("/alerts", get(handlers::list_alerts))
        .route("/models", get(handlers::list_models))
        .route("/unlock/all", post(handlers::unlock_all))
        .route("/dataset/jobs", post(jobs::create_job))
        .route("/dataset/jobs/{id}", get(jobs::get_job))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(state))
}
