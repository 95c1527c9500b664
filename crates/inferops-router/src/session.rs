//! Assignment, locking and the per-request session task.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::Stream;
use futures_util::stream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use inferops_agent::LockCoordinator;
use inferops_scheduler::{Scheduler, Selection};

use crate::error::RouteError;
use crate::lease::NodeLease;
use crate::relay::{ERROR_EVENT, RelayOutcome, node_assigned_event, relay};
use crate::request::ChatRequest;
use crate::upstream::UpstreamClient;

/// Chunks buffered between the session task and the HTTP response.
const CHANNEL_CAPACITY: usize = 32;

/// Where a session is in its lifecycle. Traced at `debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Assigning,
    Locking,
    Streaming,
    Released,
    Failed,
}

/// Routes chat requests onto nodes.
#[derive(Clone)]
pub struct StreamRouter {
    scheduler: Scheduler,
    locks: Arc<LockCoordinator>,
    upstream: UpstreamClient,
    marker: Arc<str>,
}

impl StreamRouter {
    pub fn new(
        scheduler: Scheduler,
        locks: Arc<LockCoordinator>,
        upstream: UpstreamClient,
        completion_marker: &str,
    ) -> Self {
        Self {
            scheduler,
            locks,
            upstream,
            marker: Arc::from(completion_marker),
        }
    }

    pub fn upstream(&self) -> &UpstreamClient {
        &self.upstream
    }

    /// Pick and lock a node.
    ///
    /// If nothing matches `requested_model`, or the chosen node refuses the
    /// lock, one more attempt is made with no model filter.
    ///
    /// The retry reads the same cached snapshot. Without a model filter it
    /// picks the node that just refused again, so a 409 on the best node
    /// ends in `NoNodeAvailable` until the next health poll marks it locked.
    pub async fn assign(
        &self,
        requested_model: Option<&str>,
    ) -> Result<(NodeLease, Selection), RouteError> {
        if let Some(assigned) = self.try_assign(requested_model).await {
            return Ok(assigned);
        }

        info!(model = ?requested_model, "retrying assignment without model filter");
        if let Some(assigned) = self.try_assign(None).await {
            return Ok(assigned);
        }

        warn!(model = ?requested_model, "no node available");
        Err(RouteError::NoNodeAvailable)
    }

    async fn try_assign(&self, requested_model: Option<&str>) -> Option<(NodeLease, Selection)> {
        debug!(state = ?SessionState::Assigning, model = ?requested_model, "session state");
        let selection = self.scheduler.pick(requested_model)?;

        debug!(state = ?SessionState::Locking, node_id = selection.node.id, "session state");
        match NodeLease::acquire(selection.node.clone(), self.locks.clone()).await {
            Ok(lease) => Some((lease, selection)),
            Err(outcome) => {
                info!(node_id = selection.node.id, ?outcome, "lock attempt failed");
                None
            }
        }
    }

    /// Start a session for `request`.
    ///
    /// Resolves once a node is locked (or assignment failed). The returned
    /// stream yields the `node_assigned` event, the upstream bytes and, on
    /// failure, one inline error event.
    pub async fn open(&self, request: ChatRequest) -> Result<SessionStream, RouteError> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let router = self.clone();
        tokio::spawn(async move { router.run_session(request, ready_tx, tx).await });

        match ready_rx.await {
            Ok(Ok(node_name)) => Ok(SessionStream { node_name, rx }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RouteError::Aborted),
        }
    }

    async fn run_session(
        self,
        request: ChatRequest,
        ready: oneshot::Sender<Result<String, RouteError>>,
        tx: mpsc::Sender<Bytes>,
    ) {
        let (mut lease, selection) = match self.assign(request.requested_model()).await {
            Ok(assigned) => assigned,
            Err(e) => {
                debug!(state = ?SessionState::Failed, "assignment failed");
                let _ = ready.send(Err(e));
                return;
            }
        };
        let node_id = selection.node.id;

        if ready.send(Ok(selection.node.name.clone())).is_err() {
            debug!(node_id, "caller left during assignment");
            lease.release().await;
            return;
        }

        debug!(state = ?SessionState::Streaming, node_id, "session state");
        let outcome = if tx.send(node_assigned_event(&selection.node.name)).await.is_err() {
            RelayOutcome::CallerGone
        } else {
            let payload = request.upstream(selection.model_id.as_deref());
            relay(
                &self.upstream,
                &selection.node.inference_url,
                &payload,
                &tx,
                &mut lease,
                &self.marker,
            )
            .await
        };

        match outcome {
            RelayOutcome::Completed => {}
            RelayOutcome::CallerGone => info!(node_id, "caller disconnected"),
            RelayOutcome::Failed(reason) => {
                warn!(node_id, %reason, "upstream failed during request");
                debug!(state = ?SessionState::Failed, node_id, "session state");
                let _ = tx.send(Bytes::from_static(ERROR_EVENT)).await;
            }
        }

        lease.release().await;
        debug!(state = ?SessionState::Released, node_id, "session state");
    }
}

/// The caller's end of a session.
#[derive(Debug)]
pub struct SessionStream {
    node_name: String,
    rx: mpsc::Receiver<Bytes>,
}

impl SessionStream {
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Next chunk, `None` once the session is over.
    pub async fn next_chunk(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Body stream for an HTTP response. Dropping it ends the session.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        stream::unfold(self.rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (Ok(chunk), rx))
        })
    }
}
