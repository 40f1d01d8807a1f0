use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::state::SharedState;

/// Periodically drop expired reset tokens and stale rate limiter entries.
pub fn spawn(
    state: SharedState,
    mut shutdown: watch::Receiver<bool>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!("Maintenance task started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            run_once(&state).await;

            tokio::select! {
                _ = tokio::time::sleep(every) => {}
                _ = shutdown.changed() => {}
            }
        }

        tracing::debug!("Maintenance task stopped");
    })
}

pub async fn run_once(state: &SharedState) {
    match state.broker.prune_expired().await {
        Ok(0) => {}
        Ok(n) => tracing::info!("Pruned {n} expired password reset tokens"),
        Err(e) => tracing::error!("Failed to prune password reset tokens: {e}"),
    }
    state.throttle.cleanup();
    state.gate.limiter().cleanup();
}
