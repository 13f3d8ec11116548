//! Operator-facing catalog and coupon management.

use chrono::FixedOffset;
use rand::thread_rng;
use tracing::{info, warn};

use common::consts::COUPON_DIFF_LOCK_OFFSET;
use common::time::{hour_of_day, now_unix};
use lock::DistLock;
use repo::Repos;
use repo::model::{Coupon, Prize, PrizeKind, PrizeStatus};
use store::SharedKv;

use crate::plan::build_plan;

/// Operator's view of a catalog row; storage bookkeeping columns stay
/// internal.
#[derive(Debug, Clone)]
pub struct ViewPrize {
    pub id: u64,
    pub title: String,
    pub img: String,
    pub prize_num: i64,
    pub left_num: i64,
    pub prize_code: String,
    pub prize_time: u32,
    pub prize_type: PrizeKind,
    pub prize_profile: String,
    pub begin_time: i64,
    pub end_time: i64,
    pub display_order: u32,
    pub status: PrizeStatus,
}

pub struct AdminOps {
    kv: SharedKv,
    repos: Repos,
    day_offset: FixedOffset,
}

impl AdminOps {
    pub fn new(kv: SharedKv, repos: Repos, day_offset: FixedOffset) -> Self {
        Self {
            kv,
            repos,
            day_offset,
        }
    }

    /// Create a prize with a full stock and schedule its first plan.
    pub async fn add_prize(&self, view: ViewPrize) -> anyhow::Result<u64> {
        let now = now_unix();
        let mut prize = Prize {
            id: 0,
            title: view.title,
            prize_num: view.prize_num,
            left_num: view.prize_num,
            prize_code: view.prize_code,
            prize_time: view.prize_time,
            img: view.img,
            display_order: view.display_order,
            prize_type: view.prize_type,
            prize_profile: view.prize_profile,
            begin_time: view.begin_time,
            end_time: view.end_time,
            prize_plan: String::new(),
            prize_begin: 0,
            prize_end: 0,
            status: PrizeStatus::Active,
            created_at: now,
            updated_at: now,
            op_ip: String::new(),
        };

        let id = self.repos.prizes.create(&prize).await?;
        prize.id = id;
        self.reset_plan_for(&prize).await?;
        Ok(id)
    }

    pub async fn update_prize(&self, view: ViewPrize) -> anyhow::Result<()> {
        if view.id == 0 {
            anyhow::bail!("update_prize: missing prize id");
        }
        let old = self
            .repos
            .prizes
            .get(view.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("update_prize: no prize with id {}", view.id))?;

        let now = now_unix();
        let mut prize = old.clone();
        prize.title = view.title;
        prize.prize_num = view.prize_num.max(0);
        prize.left_num = view.left_num.max(0);
        prize.prize_code = view.prize_code;
        prize.prize_time = view.prize_time;
        prize.img = view.img;
        prize.display_order = view.display_order;
        prize.prize_type = view.prize_type;
        prize.prize_profile = view.prize_profile;
        prize.begin_time = view.begin_time;
        prize.end_time = view.end_time;
        prize.status = view.status;
        prize.updated_at = now;

        self.repos.prizes.update_info(&prize, now).await?;

        // A changed stock or delivery period invalidates the running plan.
        if prize.prize_num != old.prize_num || prize.prize_time != old.prize_time {
            self.reset_plan_for(&prize).await?;
        }
        Ok(())
    }

    /// Soft-delete and stop scheduling: clear the plan and zero the pool
    /// slot so the prize cannot be drawn from stale credits.
    pub async fn delete_prize(&self, id: u64) -> anyhow::Result<()> {
        let now = now_unix();
        self.repos.prizes.mark_deleted(id, now).await?;
        self.repos.prizes.truncate_plan(id, "", now).await?;
        self.repos.prizes.set_pool(id, 0).await?;
        Ok(())
    }

    pub async fn list_prizes(&self) -> anyhow::Result<Vec<Prize>> {
        let list = self.repos.prizes.get_all_cached().await?;
        Ok(list
            .into_iter()
            .filter(|p| p.status == PrizeStatus::Active)
            .collect())
    }

    pub async fn reset_plan(&self, id: u64) -> anyhow::Result<()> {
        let prize = self
            .repos
            .prizes
            .get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("reset_plan: no prize with id {id}"))?;
        self.reset_plan_for(&prize).await
    }

    /// Regenerate a prize's drip schedule.
    ///
    /// Prizes that cannot currently deliver (deleted, outside their window,
    /// drained) get their plan cleared and their pool slot zeroed instead.
    /// An unscheduled prize (`prize_time == 0`) skips planning and puts its
    /// whole remaining stock into the pool at once.
    pub async fn reset_plan_for(&self, prize: &Prize) -> anyhow::Result<()> {
        let now = now_unix();

        let deliverable = prize.status == PrizeStatus::Active
            && prize.begin_time <= now
            && now <= prize.end_time
            && prize.left_num > 0
            && prize.prize_num > 0;
        if !deliverable {
            if !prize.prize_plan.is_empty() {
                self.repos.prizes.truncate_plan(prize.id, "", now).await?;
                self.repos.prizes.set_pool(prize.id, 0).await?;
            }
            info!(prize_id = prize.id, "prize cannot be scheduled right now");
            return Ok(());
        }

        if prize.prize_time == 0 {
            self.repos.prizes.set_pool(prize.id, prize.left_num).await?;
            return Ok(());
        }

        // Planning restarts the delivery window, so drop any stale credits
        // before the refill task starts consuming the new plan.
        self.repos.prizes.set_pool(prize.id, 0).await?;

        let now_hour = hour_of_day(now, self.day_offset);
        let slots = {
            let mut rng = thread_rng();
            build_plan(prize.prize_num, prize.prize_time, now, now_hour, &mut rng)
        };
        let plan_json = serde_json::to_string(&slots)?;
        let prize_end = now + prize.prize_time as i64 * 86_400;

        self.repos
            .prizes
            .reset_plan(prize.id, &plan_json, now, prize_end, prize.prize_num, now)
            .await?;
        Ok(())
    }

    /// Import newline-separated coupon codes for a distinct-code prize.
    /// Returns `(success, fail)` counts.
    pub async fn import_coupons(&self, prize_id: u64, codes: &str) -> anyhow::Result<(u64, u64)> {
        let prize = self
            .repos
            .prizes
            .get_cached(prize_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("import_coupons: no prize with id {prize_id}"))?;
        if prize.prize_type != PrizeKind::CouponDiff {
            anyhow::bail!("import_coupons: prize {prize_id} does not issue distinct coupons");
        }

        let now = now_unix();
        self.repos.coupons.import(prize_id, codes, now).await
    }

    /// Coupon rows plus the `(database, reservoir)` counts operators compare
    /// to spot divergence.
    pub async fn list_coupons(&self, prize_id: u64) -> anyhow::Result<(Vec<Coupon>, i64, u64)> {
        let rows = self.repos.coupons.list(prize_id).await?;
        let (db_n, cache_n) = self.repos.coupons.counts(prize_id).await?;
        Ok((rows, db_n, cache_n))
    }

    /// Rebuild the coupon reservoir from the database, serialized by a lock
    /// so two operators cannot interleave rebuilds of the same prize.
    pub async fn rebuild_coupons(&self, prize_id: u64) -> anyhow::Result<(u64, u64)> {
        let lock_name = (-((prize_id + COUPON_DIFF_LOCK_OFFSET) as i64)).to_string();
        let mut lock = DistLock::new(self.kv.clone(), &lock_name)
            .with_ttl_secs(5)
            .with_watchdog();
        lock.acquire()
            .await
            .map_err(|e| anyhow::anyhow!("coupon rebuild already running: {e}"))?;

        let result = self.repos.coupons.rebuild(prize_id).await;

        if let Err(e) = lock.release().await {
            warn!(prize_id, error = %e, "coupon rebuild lock release failed");
        }
        result
    }
}
