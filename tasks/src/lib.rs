//! Background reconcilers.
//!
//! Three independent loops: plan regeneration, pool refill, and the daily
//! counter reset. Each tick stands alone: a missed or failed tick is
//! recovered by the next one. The contract is "run, sleep until the next
//! firing, repeat", with one stop signal fanning out to all loops.

pub mod daily_reset;
pub mod plan_reset;
pub mod pool_refill;

use std::sync::Arc;
use std::time::Duration;

use chrono::FixedOffset;
use tokio::sync::watch;

use engine::AdminOps;
use repo::Repos;
use store::SharedKv;

pub const PLAN_RESET_PERIOD: Duration = Duration::from_secs(5 * 60);
pub const POOL_REFILL_PERIOD: Duration = Duration::from_secs(60);

/// Handle over the spawned reconcilers; dropping it does not stop them,
/// calling [`TaskSet::stop`] does.
pub struct TaskSet {
    stop: watch::Sender<bool>,
}

impl TaskSet {
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }
}

pub fn spawn_all(
    kv: SharedKv,
    repos: Repos,
    admin: Arc<AdminOps>,
    day_offset: FixedOffset,
) -> TaskSet {
    let (stop_tx, stop_rx) = watch::channel(false);

    plan_reset::spawn(repos.clone(), admin, stop_rx.clone());
    pool_refill::spawn(repos, stop_rx.clone());
    daily_reset::spawn(kv, day_offset, stop_rx);

    TaskSet { stop: stop_tx }
}
