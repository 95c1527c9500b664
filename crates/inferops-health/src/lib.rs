//! inferops-health — keeps the state store fresh.
//!
//! Every interval the [`HealthPoller`] probes each node agent's `/status`
//! concurrently with a bounded timeout. A successful probe replaces the
//! node's metrics wholesale and marks it online; any failure marks it
//! offline immediately and drops its metrics. There is no grace period:
//! eligibility is re-derived on the next cycle.

pub mod checker;
pub mod poller;

pub use checker::{ProbeResult, probe};
pub use poller::{CycleSummary, HealthPoller};
