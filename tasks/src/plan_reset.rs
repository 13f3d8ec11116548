//! Plan regeneration: every five minutes, any scheduled prize whose plan is
//! missing or whose delivery window has lapsed gets a fresh one.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use common::time::now_unix;
use engine::AdminOps;
use repo::Repos;

pub async fn run_once(repos: &Repos, admin: &AdminOps) -> anyhow::Result<usize> {
    let now = now_unix();
    let prizes = repos.prizes.get_all().await?;

    let mut reset = 0usize;
    for prize in &prizes {
        if prize.prize_time > 0 && (prize.prize_plan.is_empty() || prize.prize_end < now) {
            if let Err(e) = admin.reset_plan_for(prize).await {
                error!(prize_id = prize.id, error = %e, "plan reset failed");
                continue;
            }
            reset += 1;
        }
    }

    // Warm the snapshot the next draws will read.
    repos.prizes.get_all_cached().await?;
    Ok(reset)
}

pub(crate) fn spawn(repos: Repos, admin: Arc<AdminOps>, mut stop: watch::Receiver<bool>) {
    tokio::spawn(async move {
        loop {
            match run_once(&repos, &admin).await {
                Ok(n) if n > 0 => info!(reset = n, "prize plans regenerated"),
                Ok(_) => {}
                Err(e) => error!(error = %e, "plan reset tick failed"),
            }

            tokio::select! {
                _ = stop.changed() => return,
                _ = tokio::time::sleep(crate::PLAN_RESET_PERIOD) => {}
            }
        }
    });
}
