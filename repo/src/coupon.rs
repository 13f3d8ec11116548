//! Unique-coupon reservoir.
//!
//! For every prize issuing distinct codes, the set `prize_coupon_<prize_id>`
//! holds the codes still issuable. Issuance pops one arbitrary member
//! atomically; the database row is flipped to Issued afterwards. The
//! database stays authoritative, and `rebuild` re-derives the set from it.

use anyhow::Context;
use sqlx::Row;
use store::{Db, Kv as _, SharedKv};
use tracing::{info, warn};

use common::consts::PRIZE_COUPON_KEY_PREFIX;

use crate::model::{Coupon, CouponStatus};

pub struct CouponRepo {
    db: Db,
    kv: SharedKv,
}

fn reservoir_key(prize_id: u64) -> String {
    format!("{PRIZE_COUPON_KEY_PREFIX}{prize_id}")
}

impl CouponRepo {
    pub fn new(db: Db, kv: SharedKv) -> Self {
        Self { db, kv }
    }

    /// Import newline-separated codes. Each code is inserted as Available
    /// and then added to the reservoir; a database failure (duplicate code
    /// included) or an already-present set member counts as a failure.
    /// Returns `(success, fail)`.
    pub async fn import(&self, prize_id: u64, codes: &str, now: i64) -> anyhow::Result<(u64, u64)> {
        let key = reservoir_key(prize_id);
        let mut success = 0u64;
        let mut fail = 0u64;

        for code in codes.lines() {
            let code = code.trim();
            if code.is_empty() {
                continue;
            }

            let inserted = sqlx::query(
                "INSERT INTO coupon (prize_id, code, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(prize_id as i64)
            .bind(code)
            .bind(CouponStatus::Available.as_i64())
            .bind(now)
            .bind(now)
            .execute(self.db.pool())
            .await;

            match inserted {
                Err(e) => {
                    warn!(prize_id, code, error = %e, "coupon insert failed");
                    fail += 1;
                }
                Ok(_) => {
                    if self.kv.sadd(&key, code).await? == 0 {
                        fail += 1;
                    } else {
                        success += 1;
                    }
                }
            }
        }

        Ok((success, fail))
    }

    /// Pop one issuable code, or None when the reservoir is dry.
    pub async fn issue(&self, prize_id: u64) -> anyhow::Result<Option<String>> {
        let code = self.kv.spop(&reservoir_key(prize_id)).await?;
        if code.is_none() {
            info!(prize_id, "coupon reservoir is empty");
        }
        Ok(code)
    }

    /// Flip an Available row to Issued. Returns false when the row was
    /// already issued or voided; the reservoir had stale state in that case.
    pub async fn mark_issued(&self, code: &str, now: i64) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE coupon SET status = ?, updated_at = ? WHERE code = ? AND status = ?")
            .bind(CouponStatus::Issued.as_i64())
            .bind(now)
            .bind(code)
            .bind(CouponStatus::Available.as_i64())
            .execute(self.db.pool())
            .await?;

        Ok(res.rows_affected() > 0)
    }

    /// Rebuild the reservoir from the database. The fresh membership is
    /// staged under a temporary key and renamed over the live one, so the
    /// live set never transiently empties. With nothing issuable the live
    /// key is deleted instead (renaming a missing key is an error on real
    /// backends). Returns `(added, skipped)`.
    pub async fn rebuild(&self, prize_id: u64) -> anyhow::Result<(u64, u64)> {
        let key = reservoir_key(prize_id);
        let tmp_key = format!("tmp_{key}");

        let rows = sqlx::query("SELECT code FROM coupon WHERE prize_id = ? AND status = ?")
            .bind(prize_id as i64)
            .bind(CouponStatus::Available.as_i64())
            .fetch_all(self.db.pool())
            .await?;

        let mut added = 0u64;
        let mut skipped = 0u64;
        for row in &rows {
            let code: String = row.get("code");
            if self.kv.sadd(&tmp_key, &code).await? > 0 {
                added += 1;
            } else {
                skipped += 1;
            }
        }

        if added == 0 {
            self.kv.del(&tmp_key).await?;
            self.kv.del(&key).await?;
            return Ok((0, skipped));
        }

        self.kv.rename(&tmp_key, &key).await?;
        Ok((added, skipped))
    }

    /// `(database available, reservoir size)`; operators rebuild when the
    /// two diverge.
    pub async fn counts(&self, prize_id: u64) -> anyhow::Result<(i64, u64)> {
        let db_available: i64 =
            sqlx::query("SELECT COUNT(*) AS n FROM coupon WHERE prize_id = ? AND status = ?")
                .bind(prize_id as i64)
                .bind(CouponStatus::Available.as_i64())
                .fetch_one(self.db.pool())
                .await?
                .get("n");

        let set_size = self.kv.scard(&reservoir_key(prize_id)).await?;
        Ok((db_available, set_size))
    }

    pub async fn list(&self, prize_id: u64) -> anyhow::Result<Vec<Coupon>> {
        let rows = sqlx::query("SELECT * FROM coupon WHERE prize_id = ? ORDER BY id DESC")
            .bind(prize_id as i64)
            .fetch_all(self.db.pool())
            .await?;

        rows.iter()
            .map(|row| {
                Ok(Coupon {
                    id: row.get::<i64, _>("id") as u64,
                    prize_id: row.get::<i64, _>("prize_id") as u64,
                    code: row.get("code"),
                    status: CouponStatus::from_i64(row.get("status"))
                        .context("coupon row with unknown status")?,
                    created_at: row.get("created_at"),
                    updated_at: row.get("updated_at"),
                })
            })
            .collect()
    }
}
