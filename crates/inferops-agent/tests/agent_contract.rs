//! Agent client and lock protocol against an in-process fake agent.

use std::time::Duration;

use http::StatusCode;
use inferops_agent::{AgentClient, AgentError, LockCoordinator, LockOutcome};
use inferops_testkit::{FakeAgent, node_config, telemetry, unreachable_url};

const TIMEOUT: Duration = Duration::from_secs(2);

fn coordinator() -> LockCoordinator {
    LockCoordinator::new(AgentClient::new(), TIMEOUT)
}

// ── Status ──────────────────────────────────────────────────────────

#[tokio::test]
async fn fetch_status_parses_telemetry() {
    let agent = FakeAgent::start(telemetry(30.0, 40.0, 55.0, "llama3:8b")).await;
    let node = node_config(1, &agent.url(), "http://127.0.0.1:1/api/chat", 1.0);

    let metrics = AgentClient::new().fetch_status(&node, TIMEOUT).await.unwrap();
    assert_eq!(metrics.model_id.as_deref(), Some("llama3:8b"));
    assert_eq!(metrics.gpu_utilization(), Some(30.0));
    assert_eq!(metrics.memory_percent(), Some(40.0));
    assert!(!metrics.locked);
    assert_eq!(agent.status_calls(), 1);
}

#[tokio::test]
async fn fetch_status_reflects_lock_flag() {
    let agent = FakeAgent::start(telemetry(0.0, 0.0, 40.0, "m")).await;
    agent.set_locked(true);
    let node = node_config(1, &agent.url(), "http://127.0.0.1:1/api/chat", 1.0);

    let metrics = AgentClient::new().fetch_status(&node, TIMEOUT).await.unwrap();
    assert!(metrics.locked);
}

#[tokio::test]
async fn fetch_status_non_200_is_an_error() {
    let agent = FakeAgent::start(telemetry(0.0, 0.0, 40.0, "m")).await;
    agent.fail_status(Some(503));
    let node = node_config(1, &agent.url(), "http://127.0.0.1:1/api/chat", 1.0);

    let err = AgentClient::new().fetch_status(&node, TIMEOUT).await.unwrap_err();
    assert!(matches!(
        err,
        AgentError::Status { status: StatusCode::SERVICE_UNAVAILABLE, .. }
    ));
}

#[tokio::test]
async fn fetch_status_malformed_body_is_an_error() {
    let agent = FakeAgent::start(telemetry(0.0, 0.0, 40.0, "m")).await;
    agent.malformed_status(true);
    let node = node_config(1, &agent.url(), "http://127.0.0.1:1/api/chat", 1.0);

    let err = AgentClient::new().fetch_status(&node, TIMEOUT).await.unwrap_err();
    assert!(matches!(err, AgentError::Telemetry { .. }));
}

#[tokio::test]
async fn fetch_status_times_out() {
    let agent = FakeAgent::start(telemetry(0.0, 0.0, 40.0, "m")).await;
    agent.set_delay(Duration::from_millis(500));
    let node = node_config(1, &agent.url(), "http://127.0.0.1:1/api/chat", 1.0);

    let err = AgentClient::new()
        .fetch_status(&node, Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Timeout { .. }));
}

#[tokio::test]
async fn fetch_status_connection_refused() {
    let url = unreachable_url().await;
    let node = node_config(1, &url, "http://127.0.0.1:1/api/chat", 1.0);

    let err = AgentClient::new().fetch_status(&node, TIMEOUT).await.unwrap_err();
    assert!(matches!(err, AgentError::Transport { .. }));
}

#[tokio::test]
async fn trailing_slash_in_agent_url_is_tolerated() {
    let agent = FakeAgent::start(telemetry(0.0, 0.0, 40.0, "m")).await;
    let node = node_config(1, &format!("{}/", agent.url()), "http://127.0.0.1:1/api/chat", 1.0);

    assert!(AgentClient::new().fetch_status(&node, TIMEOUT).await.is_ok());
}

// ── Locking ─────────────────────────────────────────────────────────

#[tokio::test]
async fn second_lock_conflicts_until_unlocked() {
    let agent = FakeAgent::start(telemetry(0.0, 0.0, 40.0, "m")).await;
    let node = node_config(1, &agent.url(), "http://127.0.0.1:1/api/chat", 1.0);
    let locks = coordinator();

    assert_eq!(locks.lock(&node).await, LockOutcome::Acquired);
    assert!(agent.is_locked());
    assert_eq!(locks.lock(&node).await, LockOutcome::Conflict);

    assert!(locks.unlock(&node).await);
    assert!(!agent.is_locked());
    assert_eq!(locks.lock(&node).await, LockOutcome::Acquired);
}

#[tokio::test]
async fn unlock_is_idempotent() {
    let agent = FakeAgent::start(telemetry(0.0, 0.0, 40.0, "m")).await;
    let node = node_config(1, &agent.url(), "http://127.0.0.1:1/api/chat", 1.0);
    let locks = coordinator();

    assert!(locks.unlock(&node).await);
    assert!(locks.unlock(&node).await);
    assert_eq!(agent.unlock_calls(), 2);
}

#[tokio::test]
async fn concurrent_locks_grant_exactly_one() {
    let agent = FakeAgent::start(telemetry(0.0, 0.0, 40.0, "m")).await;
    let node = node_config(1, &agent.url(), "http://127.0.0.1:1/api/chat", 1.0);
    let locks = coordinator();

    let outcomes = futures_util::future::join_all((0..8).map(|_| locks.lock(&node))).await;
    let acquired = outcomes.iter().filter(|o| o.is_acquired()).count();
    assert_eq!(acquired, 1);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, LockOutcome::Acquired | LockOutcome::Conflict)));
}

#[tokio::test]
async fn unexpected_lock_status_is_rejected() {
    let agent = FakeAgent::start(telemetry(0.0, 0.0, 40.0, "m")).await;
    agent.fail_lock(Some(500));
    let node = node_config(1, &agent.url(), "http://127.0.0.1:1/api/chat", 1.0);

    assert_eq!(
        coordinator().lock(&node).await,
        LockOutcome::Rejected(StatusCode::INTERNAL_SERVER_ERROR)
    );
}

#[tokio::test]
async fn lock_timeout_is_unreachable_and_not_undone() {
    let agent = FakeAgent::start(telemetry(0.0, 0.0, 40.0, "m")).await;
    agent.set_delay(Duration::from_millis(300));
    let node = node_config(1, &agent.url(), "http://127.0.0.1:1/api/chat", 1.0);
    let locks = LockCoordinator::new(AgentClient::new(), Duration::from_millis(50));

    assert_eq!(locks.lock(&node).await, LockOutcome::Unreachable);
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(agent.unlock_calls(), 0);
}

#[tokio::test]
async fn unlock_all_reports_per_node_result() {
    let good = FakeAgent::start(telemetry(0.0, 0.0, 40.0, "m")).await;
    let bad = FakeAgent::start(telemetry(0.0, 0.0, 40.0, "m")).await;
    bad.fail_unlock(Some(500));
    let down = unreachable_url().await;
    good.set_locked(true);

    let nodes = vec![
        node_config(1, &good.url(), "http://127.0.0.1:1/api/chat", 1.0),
        node_config(2, &bad.url(), "http://127.0.0.1:1/api/chat", 1.0),
        node_config(3, &down, "http://127.0.0.1:1/api/chat", 1.0),
    ];

    let report = coordinator().unlock_all(&nodes).await;
    assert_eq!(report.unlocked, vec![1]);
    assert_eq!(report.failed, vec![2, 3]);
    assert!(!report.all_succeeded());
    assert!(!good.is_locked());
}
