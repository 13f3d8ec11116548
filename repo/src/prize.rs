//! Prize catalog repository.
//!
//! Reads go through a full-catalog JSON snapshot in the KV store; the
//! catalog is small, so granular per-prize caching is not worth the key
//! churn. Every write deletes the snapshot *before* touching the database,
//! so a failed write leaves the cache colder, never staler. The prize pool
//! (the per-prize credit bucket fed by the refill task) lives in a single
//! hash whose fields are only ever touched with atomic increments.

use anyhow::Context;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use store::{Db, Kv as _, SharedKv};
use tracing::{info, warn};

use common::consts::{ALL_PRIZE_KEY, ALL_PRIZE_TTL_SECS, CODE_MAX, PRIZE_POOL_KEY};

use crate::model::{ActivePrize, Prize, PrizeKind, PrizeStatus};

pub struct PrizeRepo {
    db: Db,
    kv: SharedKv,
}

impl PrizeRepo {
    pub fn new(db: Db, kv: SharedKv) -> Self {
        Self { db, kv }
    }

    /// Drop the catalog snapshot. Must run before any catalog write.
    async fn invalidate(&self) -> anyhow::Result<()> {
        self.kv.del(ALL_PRIZE_KEY).await?;
        Ok(())
    }

    pub async fn get(&self, id: u64) -> anyhow::Result<Option<Prize>> {
        let row = sqlx::query("SELECT * FROM prize WHERE id = ?")
            .bind(id as i64)
            .fetch_optional(self.db.pool())
            .await?;

        match row {
            Some(r) => Ok(Some(row_to_prize(&r)?)),
            None => Ok(None),
        }
    }

    pub async fn get_all(&self) -> anyhow::Result<Vec<Prize>> {
        let rows = sqlx::query("SELECT * FROM prize ORDER BY id")
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(row_to_prize).collect()
    }

    /// Catalog read through the snapshot; on a miss the full table is loaded
    /// and the snapshot repopulated.
    pub async fn get_all_cached(&self) -> anyhow::Result<Vec<Prize>> {
        if let Some(json) = self.kv.get(ALL_PRIZE_KEY).await? {
            let list: Vec<Prize> =
                serde_json::from_str(&json).context("corrupt catalog snapshot")?;
            return Ok(list);
        }

        let list = self.get_all().await?;
        let json = serde_json::to_string(&list)?;
        self.kv
            .set(
                ALL_PRIZE_KEY,
                &json,
                Some(std::time::Duration::from_secs(ALL_PRIZE_TTL_SECS)),
            )
            .await?;
        Ok(list)
    }

    pub async fn get_cached(&self, id: u64) -> anyhow::Result<Option<Prize>> {
        let list = self.get_all_cached().await?;
        Ok(list.into_iter().find(|p| p.id == id))
    }

    /// Prizes a draw may currently select from: active, limited-or-unlimited
    /// inventory, inside their delivery window, with a well-formed winning
    /// range. Rows with malformed or out-of-space ranges are dropped, not
    /// errored. Sorted the way operators order the carousel: most recently
    /// updated first, then display order.
    pub async fn useful_prizes(&self, now: i64) -> anyhow::Result<Vec<ActivePrize>> {
        let mut list: Vec<Prize> = self
            .get_all_cached()
            .await?
            .into_iter()
            .filter(|p| {
                p.id > 0
                    && p.status == PrizeStatus::Active
                    && p.prize_num > 0
                    && p.begin_time <= now
                    && now <= p.end_time
            })
            .collect();

        list.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then(a.display_order.cmp(&b.display_order))
        });

        let mut out = Vec::with_capacity(list.len());
        for p in list {
            match parse_code_range(&p.prize_code) {
                Some((low, high)) => out.push(ActivePrize {
                    id: p.id,
                    title: p.title,
                    prize_num: p.prize_num,
                    left_num: p.left_num,
                    code_low: low,
                    code_high: high,
                    img: p.img,
                    display_order: p.display_order,
                    prize_type: p.prize_type,
                    prize_profile: p.prize_profile,
                }),
                None => {
                    warn!(prize_id = p.id, prize_code = %p.prize_code, "dropping prize with malformed code range");
                }
            }
        }
        Ok(out)
    }

    /// Insert a new catalog row; returns the assigned id.
    pub async fn create(&self, prize: &Prize) -> anyhow::Result<u64> {
        self.invalidate().await?;

        let res = sqlx::query(
            r#"
INSERT INTO prize (
  title, prize_num, left_num, prize_code, prize_time,
  img, display_order, prize_type, prize_profile,
  begin_time, end_time, prize_plan, prize_begin, prize_end,
  status, created_at, updated_at, op_ip
)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(&prize.title)
        .bind(prize.prize_num)
        .bind(prize.left_num)
        .bind(&prize.prize_code)
        .bind(prize.prize_time as i64)
        .bind(&prize.img)
        .bind(prize.display_order as i64)
        .bind(prize.prize_type.as_i64())
        .bind(&prize.prize_profile)
        .bind(prize.begin_time)
        .bind(prize.end_time)
        .bind(&prize.prize_plan)
        .bind(prize.prize_begin)
        .bind(prize.prize_end)
        .bind(prize.status.as_i64())
        .bind(prize.created_at)
        .bind(prize.updated_at)
        .bind(&prize.op_ip)
        .execute(self.db.pool())
        .await?;

        Ok(res.last_insert_rowid() as u64)
    }

    /// Admin update of the operator-editable columns.
    pub async fn update_info(&self, prize: &Prize, now: i64) -> anyhow::Result<()> {
        self.invalidate().await?;

        sqlx::query(
            r#"
UPDATE prize
SET title = ?, prize_num = ?, left_num = ?, prize_code = ?, prize_time = ?,
    img = ?, display_order = ?, prize_type = ?, prize_profile = ?,
    begin_time = ?, end_time = ?, prize_plan = ?, status = ?, updated_at = ?
WHERE id = ?;
"#,
        )
        .bind(&prize.title)
        .bind(prize.prize_num)
        .bind(prize.left_num)
        .bind(&prize.prize_code)
        .bind(prize.prize_time as i64)
        .bind(&prize.img)
        .bind(prize.display_order as i64)
        .bind(prize.prize_type.as_i64())
        .bind(&prize.prize_profile)
        .bind(prize.begin_time)
        .bind(prize.end_time)
        .bind(&prize.prize_plan)
        .bind(prize.status.as_i64())
        .bind(now)
        .bind(prize.id as i64)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    /// Soft-delete: the row stays for result history, the draw filter skips
    /// it.
    pub async fn mark_deleted(&self, id: u64, now: i64) -> anyhow::Result<()> {
        self.invalidate().await?;

        sqlx::query("UPDATE prize SET status = ?, updated_at = ? WHERE id = ?")
            .bind(PrizeStatus::Deleted.as_i64())
            .bind(now)
            .bind(id as i64)
            .execute(self.db.pool())
            .await?;

        Ok(())
    }

    /// Persist a freshly generated plan together with its window, restocking
    /// `left_num` to the full prize count.
    pub async fn reset_plan(
        &self,
        id: u64,
        plan_json: &str,
        prize_begin: i64,
        prize_end: i64,
        left_num: i64,
        now: i64,
    ) -> anyhow::Result<()> {
        self.invalidate().await?;

        sqlx::query(
            r#"
UPDATE prize
SET prize_plan = ?, prize_begin = ?, prize_end = ?, left_num = ?, updated_at = ?
WHERE id = ?;
"#,
        )
        .bind(plan_json)
        .bind(prize_begin)
        .bind(prize_end)
        .bind(left_num)
        .bind(now)
        .bind(id as i64)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    /// Write back a plan whose released head entries were consumed.
    pub async fn truncate_plan(&self, id: u64, plan_json: &str, now: i64) -> anyhow::Result<()> {
        self.invalidate().await?;

        sqlx::query("UPDATE prize SET prize_plan = ?, updated_at = ? WHERE id = ?")
            .bind(plan_json)
            .bind(now)
            .bind(id as i64)
            .execute(self.db.pool())
            .await?;

        Ok(())
    }

    /// Conditional inventory decrement. Returns false when the remaining
    /// count could not cover `n`; nothing is changed in that case.
    pub async fn decr_left_num(&self, id: u64, n: i64) -> anyhow::Result<bool> {
        self.invalidate().await?;

        let res = sqlx::query(
            "UPDATE prize SET left_num = left_num - ? WHERE id = ? AND left_num >= ?",
        )
        .bind(n)
        .bind(id as i64)
        .bind(n)
        .execute(self.db.pool())
        .await?;

        Ok(res.rows_affected() > 0)
    }

    /// Take one credit from the pool; returns the post-value. A negative
    /// result means the plan has not dripped this slot yet; the caller
    /// rejects the draw and leaves the marker in place for the next refill
    /// to absorb.
    pub async fn decr_pool(&self, id: u64) -> anyhow::Result<i64> {
        Ok(self
            .kv
            .hincrby(PRIZE_POOL_KEY, &id.to_string(), -1)
            .await?)
    }

    /// Add `n` credits to the pool. When the post-value comes back below the
    /// credited amount the field had gone negative from rejected draws; one
    /// corrective increment tops the shortfall back up.
    pub async fn credit_pool(&self, id: u64, n: i64) -> anyhow::Result<i64> {
        let field = id.to_string();
        let mut cnt = self.kv.hincrby(PRIZE_POOL_KEY, &field, n).await?;
        if cnt < n {
            info!(prize_id = id, credited = n, post = cnt, "pool was in deficit, crediting again");
            let shortfall = n - cnt;
            cnt = self.kv.hincrby(PRIZE_POOL_KEY, &field, shortfall).await?;
        }
        Ok(cnt)
    }

    pub async fn pool_num(&self, id: u64) -> anyhow::Result<i64> {
        let v = self.kv.hget(PRIZE_POOL_KEY, &id.to_string()).await?;
        match v {
            Some(s) => Ok(s.parse().context("pool field is not an integer")?),
            None => Ok(0),
        }
    }

    pub async fn set_pool(&self, id: u64, n: i64) -> anyhow::Result<()> {
        self.kv
            .hset(PRIZE_POOL_KEY, &id.to_string(), &n.to_string())
            .await?;
        Ok(())
    }
}

/// Parse `"low-high"`; both bounds inclusive, inside `[0, CODE_MAX)`.
fn parse_code_range(code: &str) -> Option<(i64, i64)> {
    let (low, high) = code.split_once('-')?;
    let low: i64 = low.trim().parse().ok()?;
    let high: i64 = high.trim().parse().ok()?;
    (0 <= low && low <= high && high < CODE_MAX).then_some((low, high))
}

fn row_to_prize(row: &SqliteRow) -> anyhow::Result<Prize> {
    Ok(Prize {
        id: row.get::<i64, _>("id") as u64,
        title: row.get("title"),
        prize_num: row.get("prize_num"),
        left_num: row.get("left_num"),
        prize_code: row.get("prize_code"),
        prize_time: row.get::<i64, _>("prize_time") as u32,
        img: row.get("img"),
        display_order: row.get::<i64, _>("display_order") as u32,
        prize_type: PrizeKind::from_i64(row.get("prize_type"))?,
        prize_profile: row.get("prize_profile"),
        begin_time: row.get("begin_time"),
        end_time: row.get("end_time"),
        prize_plan: row.get("prize_plan"),
        prize_begin: row.get("prize_begin"),
        prize_end: row.get("prize_end"),
        status: PrizeStatus::from_i64(row.get("status"))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        op_ip: row.get("op_ip"),
    })
}

#[cfg(test)]
mod tests {
    use super::parse_code_range;

    #[test]
    fn code_range_parsing() {
        assert_eq!(parse_code_range("0-9999"), Some((0, 9999)));
        assert_eq!(parse_code_range("0-0"), Some((0, 0)));
        assert_eq!(parse_code_range("10-5"), None);
        assert_eq!(parse_code_range("0-10000"), None);
        assert_eq!(parse_code_range("-1-5"), None);
        assert_eq!(parse_code_range("abc"), None);
        assert_eq!(parse_code_range(""), None);
    }
}
