//! inferops-state — in-memory state cache for the InferOps gateway.
//!
//! Holds one `NodeRecord` per configured node (in configuration order)
//! and the list of currently active alerts.
//!
//! # Concurrency
//!
//! The node list and the alert list live behind two separate locks.
//! Readers never get a live reference: every accessor returns an owned
//! copy, so no lock is held across an `.await` anywhere in the gateway.
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc`) and can
//! be shared across async tasks.

pub mod error;
pub mod store;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
