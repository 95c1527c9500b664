//! Restart-on-panic supervision for background loops.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Spawn `factory()` and keep it running.
///
/// A panic is logged and the task is started again from a fresh future
/// after `restart_delay`. A clean return, a cancellation or the shutdown
/// flag ends supervision.
pub fn spawn_supervised<F, Fut>(
    name: &'static str,
    mut shutdown: watch::Receiver<bool>,
    restart_delay: Duration,
    factory: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut restarts = 0u32;
        loop {
            match tokio::spawn(factory()).await {
                Ok(()) => {
                    info!(task = name, "task exited");
                    break;
                }
                Err(e) if e.is_panic() => {
                    restarts += 1;
                    error!(task = name, restarts, "task panicked, restarting");
                }
                Err(e) => {
                    warn!(task = name, error = %e, "task cancelled");
                    break;
                }
            }

            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(restart_delay) => {}
                _ = shutdown.changed() => break,
            }
        }
    })
}
