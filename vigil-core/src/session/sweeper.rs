use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::registry::SessionRegistry;

/// Default gap between sweeps
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Spawn the periodic expired-session sweep
/// Runs until `shutdown` is cancelled; the first sweep happens one `period` after start
pub fn spawn_sweeper(
    registry: Arc<SessionRegistry>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("session sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = registry.sweep().await;
                    if removed > 0 {
                        info!(removed, "swept expired sessions");
                    }
                }
            }
        }
    })
}
