//! Periodic health loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::broadcaster::Broadcaster;

/// Background task that runs a health cycle on every tick and broadcasts the
/// resulting status map. The first cycle runs immediately.
pub struct HealthLoop {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl HealthLoop {
    pub fn spawn(broadcaster: Arc<Broadcaster>, interval: Duration) -> Self {
        let (shutdown, mut rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!("Health loop started ({}ms interval)", interval.as_millis());
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = rx.changed() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    _ = rx.changed() => break,
                    report = broadcaster.refresh_health() => {
                        if report.is_degraded() {
                            warn!("No models are currently available");
                        }
                    }
                }
            }
            info!("Health loop stopped");
        });

        Self { shutdown, handle }
    }

    /// Signal the loop and wait for it to exit. A cycle in flight is dropped.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
