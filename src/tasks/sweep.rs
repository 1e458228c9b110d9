//! TTL Sweep Task
//!
//! Background task that periodically removes expired cache entries so cold
//! keys do not accumulate between reads.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::WeakCacheStore;
use crate::tasks::StopFlag;

/// Spawns a background task that periodically sweeps expired entries.
///
/// The task sleeps for `interval` between sweeps and exits when `stop` is set,
/// when the store has been dropped, or when the store stops answering.
///
/// # Example
/// ```ignore
/// let stop = StopFlag::new();
/// let handle = spawn_sweep_task(store.downgrade(), Duration::from_secs(30), stop.clone());
/// // Later, during shutdown:
/// stop.stop();
/// ```
pub fn spawn_sweep_task(store: WeakCacheStore, interval: Duration, stop: StopFlag) -> JoinHandle<()> {
    let interval = interval.max(Duration::from_millis(1));

    tokio::spawn(async move {
        debug!("Starting TTL sweep task with interval of {}ms", interval.as_millis());

        loop {
            tokio::time::sleep(interval).await;

            if stop.is_stopped() {
                debug!("TTL sweep task stopped");
                break;
            }
            let Some(store) = store.upgrade() else {
                debug!("TTL sweep task exiting, store dropped");
                break;
            };

            match store.sweep_expired().await {
                Ok(removed) if removed > 0 => {
                    info!(store = store.name(), "TTL sweep: removed {} expired entries", removed);
                }
                Ok(_) => debug!(store = store.name(), "TTL sweep: no expired entries found"),
                Err(err) => {
                    debug!(store = store.name(), error = %err, "TTL sweep task exiting");
                    break;
                }
            }
        }
    })
}
