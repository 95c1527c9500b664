//! inferops-scheduler — pick the least-loaded eligible node.
//!
//! Scoring is a pure function over a `StateStore` snapshot:
//!
//! ```text
//! dynamic_load = 0.6 * gpu_util + 0.3 * mem_percent + 0.1 * gpu_temp
//! score        = static_weight / (dynamic_load + 1e-6)
//! ```
//!
//! Missing telemetry counts as worst-case load (100 / 100 / 80), never as
//! exclusion. Offline, metric-less, locked and model-mismatched nodes are
//! filtered out before scoring.

pub mod scheduler;
pub mod scorer;

pub use scheduler::Scheduler;
pub use scorer::{Selection, dynamic_load, select_node};
