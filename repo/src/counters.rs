//! Per-user and per-IP daily draw counters.
//!
//! The hot path is a sharded KV hash increment; the durable `lottery_times`
//! row is the slower authority consulted after the cheap check passes. The
//! hash count may run ahead of the database by in-flight draws; reseeding
//! from the database bounds the divergence.

use sqlx::Row;
use store::{Db, Kv as _, SharedKv};

use common::consts::{IP_DAY_NUM_KEY_PREFIX, IP_SHARD, USER_DAY_NUM_KEY_PREFIX, USER_SHARD};
use common::time::ipv4_to_int;

use crate::model::LotteryTimes;

/// Counter shard key for a user-id shard index.
pub fn user_shard_key(shard: u64) -> String {
    format!("{USER_DAY_NUM_KEY_PREFIX}{shard}")
}

/// Counter shard key for an IP shard index.
pub fn ip_shard_key(shard: u64) -> String {
    format!("{IP_DAY_NUM_KEY_PREFIX}{shard}")
}

/// Outcome of consuming one unit of the durable daily quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayQuota {
    /// The database row now reads `db_num` after this draw was counted.
    Allowed { db_num: i64 },
    /// The row already met the ceiling; nothing was consumed.
    Exhausted { db_num: i64 },
}

pub struct CounterRepo {
    db: Db,
    kv: SharedKv,
}

impl CounterRepo {
    pub fn new(db: Db, kv: SharedKv) -> Self {
        Self { db, kv }
    }

    /// Bump the cached per-user counter; returns the post-value.
    pub async fn incr_user_day(&self, user_id: u64) -> anyhow::Result<i64> {
        let key = user_shard_key(user_id % USER_SHARD);
        self.kv.hincrby(&key, &user_id.to_string(), 1).await
    }

    /// Overwrite the cached counter from an authoritative count. Counts of
    /// one or less are already covered by the increment itself.
    pub async fn seed_user_day(&self, user_id: u64, num: i64) -> anyhow::Result<()> {
        if num <= 1 {
            return Ok(());
        }
        let key = user_shard_key(user_id % USER_SHARD);
        self.kv
            .hset(&key, &user_id.to_string(), &num.to_string())
            .await
    }

    pub async fn cached_user_day(&self, user_id: u64) -> anyhow::Result<i64> {
        let key = user_shard_key(user_id % USER_SHARD);
        let v = self.kv.hget(&key, &user_id.to_string()).await?;
        Ok(v.and_then(|s| s.parse().ok()).unwrap_or(0))
    }

    /// Bump the cached per-IP counter; returns the post-value.
    pub async fn incr_ip_day(&self, ip: &str) -> anyhow::Result<i64> {
        let key = ip_shard_key(ipv4_to_int(ip) % IP_SHARD);
        self.kv.hincrby(&key, ip, 1).await
    }

    pub async fn get_times(&self, user_id: u64, day: u32) -> anyhow::Result<Option<LotteryTimes>> {
        let row = sqlx::query("SELECT * FROM lottery_times WHERE user_id = ? AND day = ?")
            .bind(user_id as i64)
            .bind(day as i64)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(|r| LotteryTimes {
            id: r.get::<i64, _>("id") as u64,
            user_id: r.get::<i64, _>("user_id") as u64,
            day: r.get::<i64, _>("day") as u32,
            num: r.get("num"),
        }))
    }

    /// Read-modify-write of the durable counter in one transaction: count
    /// this draw unless the row already reads `max`.
    pub async fn consume_day_quota(
        &self,
        user_id: u64,
        day: u32,
        max: i64,
        now: i64,
    ) -> anyhow::Result<DayQuota> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query("SELECT num FROM lottery_times WHERE user_id = ? AND day = ?")
            .bind(user_id as i64)
            .bind(day as i64)
            .fetch_optional(&mut *tx)
            .await?;

        let quota = match row {
            Some(r) => {
                let num: i64 = r.get("num");
                if num >= max {
                    DayQuota::Exhausted { db_num: num }
                } else {
                    sqlx::query(
                        "UPDATE lottery_times SET num = ?, updated_at = ? WHERE user_id = ? AND day = ?",
                    )
                    .bind(num + 1)
                    .bind(now)
                    .bind(user_id as i64)
                    .bind(day as i64)
                    .execute(&mut *tx)
                    .await?;
                    DayQuota::Allowed { db_num: num + 1 }
                }
            }
            None => {
                sqlx::query(
                    "INSERT INTO lottery_times (user_id, day, num, created_at, updated_at) VALUES (?, ?, 1, ?, ?)",
                )
                .bind(user_id as i64)
                .bind(day as i64)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                DayQuota::Allowed { db_num: 1 }
            }
        };

        tx.commit().await?;
        Ok(quota)
    }
}
