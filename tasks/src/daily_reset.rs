//! Daily counter reset: at every local midnight, drop all user and IP
//! counter shards so quotas start from zero.

use chrono::FixedOffset;
use tokio::sync::watch;
use tracing::{error, info};

use common::consts::{IP_SHARD, USER_SHARD};
use common::time::{now_unix, until_next_midnight};
use repo::counters::{ip_shard_key, user_shard_key};
use store::{Kv as _, SharedKv};

pub async fn run_once(kv: &SharedKv) -> anyhow::Result<()> {
    for shard in 0..USER_SHARD {
        kv.del(&user_shard_key(shard)).await?;
    }
    for shard in 0..IP_SHARD {
        kv.del(&ip_shard_key(shard)).await?;
    }
    Ok(())
}

pub(crate) fn spawn(kv: SharedKv, day_offset: FixedOffset, mut stop: watch::Receiver<bool>) {
    tokio::spawn(async move {
        loop {
            let wait = until_next_midnight(now_unix(), day_offset);
            tokio::select! {
                _ = stop.changed() => return,
                _ = tokio::time::sleep(wait) => {}
            }

            match run_once(&kv).await {
                Ok(()) => info!("daily draw counters reset"),
                Err(e) => error!(error = %e, "daily counter reset failed"),
            }
        }
    });
}
