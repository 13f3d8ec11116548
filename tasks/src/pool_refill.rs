//! Pool refill: every minute, release all plan entries that have come due
//! into the prize pool and write the truncated plan back.

use tokio::sync::watch;
use tracing::{error, info};

use common::time::now_unix;
use repo::Repos;
use repo::model::{PlanSlot, PrizeStatus};

/// Returns the total quantity credited across all prizes this tick.
pub async fn run_once(repos: &Repos) -> anyhow::Result<i64> {
    let now = now_unix();
    let prizes = repos.prizes.get_all().await?;

    let mut total = 0i64;
    for prize in &prizes {
        if prize.status != PrizeStatus::Active || prize.prize_num <= 0 {
            continue;
        }
        if prize.begin_time > now || prize.end_time < now {
            continue;
        }

        let slots = match PlanSlot::parse_list(&prize.prize_plan) {
            Ok(s) => s,
            Err(e) => {
                error!(prize_id = prize.id, error = %e, "unreadable prize plan, skipping");
                continue;
            }
        };
        if slots.is_empty() {
            continue;
        }

        let due = slots.iter().take_while(|s| s.time <= now).count();
        if due == 0 {
            continue;
        }

        let delta: i64 = slots[..due].iter().map(|s| s.num).sum();
        if delta > 0 {
            repos.prizes.credit_pool(prize.id, delta).await?;
            total += delta;
        }

        let rest = serde_json::to_string(&slots[due..])?;
        repos.prizes.truncate_plan(prize.id, &rest, now).await?;
    }

    if total > 0 {
        repos.prizes.get_all_cached().await?;
    }
    Ok(total)
}

pub(crate) fn spawn(repos: Repos, mut stop: watch::Receiver<bool>) {
    tokio::spawn(async move {
        loop {
            match run_once(&repos).await {
                Ok(n) if n > 0 => info!(credited = n, "prize pool refilled"),
                Ok(_) => {}
                Err(e) => error!(error = %e, "pool refill tick failed"),
            }

            tokio::select! {
                _ = stop.changed() => return,
                _ = tokio::time::sleep(crate::POOL_REFILL_PERIOD) => {}
            }
        }
    });
}
