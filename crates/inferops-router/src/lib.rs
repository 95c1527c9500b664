//! inferops-router — one chat request from assignment to release.
//!
//! A session walks `Assigning → Locking → Streaming → Released`, with
//! `Failed` reachable from anywhere:
//!
//! ```text
//! StreamRouter::open
//!   ├── Scheduler::pick(model)        ─┐ one retry without the
//!   ├── NodeLease::acquire (POST /lock)─┘ model filter, then 503
//!   └── spawned session task
//!         ├── event: node_assigned
//!         ├── POST inference_url → relay bytes over a bounded channel
//!         │     └── completion marker seen → release early
//!         └── NodeLease::release (every exit path; Drop as fallback)
//! ```
//!
//! The HTTP handler only sees a [`SessionStream`]; the session task owns
//! the lease, so a client disconnect closes the channel and the task
//! releases the node on its way out.

pub mod error;
pub mod lease;
pub mod relay;
pub mod request;
pub mod session;
pub mod upstream;

pub use error::{RouteError, UpstreamError};
pub use lease::NodeLease;
pub use relay::{ERROR_EVENT, MarkerScanner, node_assigned_event};
pub use request::{ChatMessage, ChatRequest, UpstreamRequest};
pub use session::{SessionState, SessionStream, StreamRouter};
pub use upstream::UpstreamClient;
