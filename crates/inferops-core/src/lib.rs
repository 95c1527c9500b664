//! inferops-core — shared types and `inferops.toml` configuration.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    AlertRuleConfig, AlertsSection, BatchSection, GatewayConfig, GatewaySection, HealthSection,
    LocksSection, NodeConfig, UpstreamSection, parse_duration,
};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
