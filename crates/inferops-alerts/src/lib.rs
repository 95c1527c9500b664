//! inferops-alerts — threshold alerts derived from node telemetry.
//!
//! On its own cadence the [`AlertEvaluator`] walks every online node with
//! metrics against every rule:
//!
//! ```text
//! value  = metric at rule.metric (skip if absent)
//! fire  if value >= rule.threshold
//!       and (never fired for (rule, node) or now - last >= rule.cooldown)
//! ```
//!
//! The active-alert list in the state store is replaced wholesale with the
//! alerts fired in this cycle. Alerts are a snapshot, not a history: a
//! breach still inside its cooldown window does not appear again.

pub mod evaluator;
pub mod rules;

pub use evaluator::AlertEvaluator;
pub use rules::{AlertRule, metric_value};
