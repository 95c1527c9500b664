//! inferops-agent — client side of the node agent contract.
//!
//! Every compute node runs an agent exposing three endpoints:
//!
//! ```text
//! GET  /status  → 200 + JSON telemetry (NodeMetrics)
//! POST /lock    → 200 reserved, 409 already reserved
//! POST /unlock  → 200 always (idempotent)
//! ```
//!
//! [`AgentClient`] speaks that contract over a pooled hyper client with a
//! per-call timeout. [`LockCoordinator`] builds the reservation protocol
//! on top of it: lock can conflict, unlock cannot, and neither ever
//! returns a transport error to the caller.

pub mod client;
pub mod error;
pub mod lock;

pub use client::{AgentClient, HttpClient, http_client};
pub use error::{AgentError, AgentResult};
pub use lock::{LockCoordinator, LockOutcome, UnlockReport};
