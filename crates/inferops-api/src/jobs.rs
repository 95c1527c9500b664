//! Batch dataset jobs.
//!
//! A job walks its items one at a time. Each item is assigned a node
//! through the same assignment path as chat, sent as a non-streaming
//! inference request, and the lease is released before the next item.
//! Jobs live in memory only.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use inferops_router::{ChatMessage, UpstreamRequest};

use crate::ApiState;
use crate::handlers::{ApiResponse, error_response};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    /// No node could be obtained for an item.
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemResult {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetJob {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub total_items: usize,
    pub processed_items: usize,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub merge_triggered: bool,
    pub results: Vec<ItemResult>,
}

/// In-memory job table.
#[derive(Clone, Default)]
pub struct JobTable {
    inner: Arc<RwLock<HashMap<Uuid, DatasetJob>>>,
}

impl JobTable {
    pub fn insert(&self, job: DatasetJob) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job.job_id, job);
    }

    pub fn get(&self, id: &Uuid) -> Option<DatasetJob> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Mutate a job in place; `None` if it does not exist.
    pub fn update<R>(&self, id: &Uuid, f: impl FnOnce(&mut DatasetJob) -> R) -> Option<R> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(id)
            .map(f)
    }
}

/// Body of `POST /api/v1/dataset/jobs`.
#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub items: Vec<Value>,
    /// Keep only the first `limit` items when `0 < limit <= items.len()`.
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct JobCreated {
    job_id: Uuid,
    total_items: usize,
}

/// POST /api/v1/dataset/jobs
pub async fn create_job(
    State(state): State<ApiState>,
    payload: Result<Json<CreateJobRequest>, JsonRejection>,
) -> impl IntoResponse {
    let mut req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            return error_response(&rejection.body_text(), StatusCode::BAD_REQUEST).into_response();
        }
    };
    if let Some(limit) = req.limit {
        if limit > 0 && limit <= req.items.len() {
            req.items.truncate(limit);
        }
    }

    let job_id = Uuid::new_v4();
    let total_items = req.items.len();
    state.jobs.insert(DatasetJob {
        job_id,
        status: JobStatus::Queued,
        total_items,
        processed_items: 0,
        start_time: epoch_secs_f64(),
        end_time: None,
        merge_triggered: false,
        results: Vec::new(),
    });
    info!(%job_id, total_items, "dataset job created");

    tokio::spawn(run_job(state, job_id, req.items));

    (
        StatusCode::CREATED,
        ApiResponse::ok(JobCreated {
            job_id,
            total_items,
        }),
    )
        .into_response()
}

/// GET /api/v1/dataset/jobs/{id}
pub async fn get_job(State(state): State<ApiState>, Path(id): Path<String>) -> impl IntoResponse {
    let job = Uuid::parse_str(&id).ok().and_then(|id| state.jobs.get(&id));
    match job {
        Some(job) => ApiResponse::ok(job).into_response(),
        None => error_response("job not found", StatusCode::NOT_FOUND).into_response(),
    }
}

/// Process every item of a job in order.
pub async fn run_job(state: ApiState, job_id: Uuid, items: Vec<Value>) {
    state.jobs.update(&job_id, |job| job.status = JobStatus::Processing);
    let mut stopped = false;

    for (index, item) in items.into_iter().enumerate() {
        let (mut lease, selection) = match state.router.assign(None).await {
            Ok(assigned) => assigned,
            Err(e) => {
                warn!(%job_id, index, error = %e, "no node for dataset item, stopping job");
                stopped = true;
                break;
            }
        };

        let prompt = match item {
            Value::String(s) => s,
            other => other.to_string(),
        };
        let messages = [ChatMessage::user(prompt)];
        let payload = UpstreamRequest {
            messages: &messages,
            stream: false,
            model: selection.model_id.as_deref(),
        };
        let outcome = state
            .router
            .upstream()
            .complete(&selection.node.inference_url, &payload)
            .await;
        lease.release().await;

        let result = match outcome {
            Ok(body) => ItemResult {
                index,
                node: Some(selection.node.name.clone()),
                output: Some(completion_text(&body)),
                error: None,
            },
            Err(e) => {
                warn!(%job_id, index, node_id = selection.node.id, error = %e, "dataset item failed");
                ItemResult {
                    index,
                    node: Some(selection.node.name.clone()),
                    output: None,
                    error: Some(e.to_string()),
                }
            }
        };

        let threshold = state.merge_threshold;
        let merge_now = state.jobs.update(&job_id, |job| {
            job.processed_items = index + 1;
            job.results.push(result);
            let reached = job.processed_items as f64 >= job.total_items as f64 * threshold;
            if reached && !job.merge_triggered {
                job.merge_triggered = true;
                return true;
            }
            false
        });
        if merge_now == Some(true) {
            info!(%job_id, processed = index + 1, "incremental merge threshold reached");
        }
    }

    let status = if stopped {
        JobStatus::Stopped
    } else {
        JobStatus::Completed
    };
    state.jobs.update(&job_id, |job| {
        job.status = status;
        job.end_time = Some(epoch_secs_f64());
    });
    info!(%job_id, ?status, "dataset job finished");
}

/// `message.content` of a chat response, or the raw body.
fn completion_text(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/message/content")?.as_str().map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}

fn epoch_secs_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_text_prefers_message_content() {
        let body = br#"{"message": {"role": "assistant", "content": "42"}, "done": true}"#;
        assert_eq!(completion_text(body), "42");
    }

    #[test]
    fn completion_text_falls_back_to_raw_body() {
        assert_eq!(completion_text(b"plain text"), "plain text");
        assert_eq!(completion_text(br#"{"response": "x"}"#), r#"{"response": "x"}"#);
    }

    #[test]
    fn job_table_update_and_get() {
        let table = JobTable::default();
        let id = Uuid::new_v4();
        assert!(table.update(&id, |_| ()).is_none());

        table.insert(DatasetJob {
            job_id: id,
            status: JobStatus::Queued,
            total_items: 2,
            processed_items: 0,
            start_time: 0.0,
            end_time: None,
            merge_triggered: false,
            results: Vec::new(),
        });
        table.update(&id, |j| j.processed_items = 1);
        assert_eq!(table.get(&id).unwrap().processed_items, 1);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_value(JobStatus::Stopped).unwrap(), "stopped");
    }
}
