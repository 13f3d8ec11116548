//! The draw pipeline.
//!
//! Per call: take the user's lock, run admission, pick a candidate by random
//! code, reserve inventory (pool first, then catalog), issue a coupon when
//! the prize carries distinct codes, log the result, and blacklist the
//! winner on a large physical prize. Every failure short-circuits; the lock
//! is released on every exit path.

use chrono::FixedOffset;
use rand::Rng;
use tracing::{error, info, warn};

use common::consts::{CODE_MAX, DEFAULT_BLACK_TIME_SECS, LUCKY_LOCK_KEY_PREFIX};
use common::time::now_unix;
use lock::DistLock;
use repo::Repos;
use repo::model::{BlackUser, DrawRecord, PrizeKind};
use store::SharedKv;

use crate::admission::{Admission, AdmissionGate, Limits};
use crate::outcome::{DenyReason, EngineError, Outcome, WonPrize};

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub limits: Limits,
    /// Lease on the per-user draw lock.
    pub lock_ttl_secs: u64,
    /// How long a caller queues behind another draw of the same user.
    pub lock_wait_secs: u64,
    /// Offset defining the calendar day for quotas and plans.
    pub utc_offset_hours: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            lock_ttl_secs: 5,
            lock_wait_secs: 5,
            utc_offset_hours: 8,
        }
    }
}

impl EngineConfig {
    pub fn day_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3_600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
    }
}

#[derive(Debug, Clone)]
pub struct Entrant {
    pub user_id: u64,
    pub user_name: String,
    pub ip: String,
}

pub struct LotteryEngine {
    kv: SharedKv,
    repos: Repos,
    gate: AdmissionGate,
    cfg: EngineConfig,
}

impl LotteryEngine {
    pub fn new(kv: SharedKv, repos: Repos, cfg: EngineConfig) -> Self {
        let gate = AdmissionGate::new(repos.clone(), cfg.limits, cfg.day_offset());
        Self {
            kv,
            repos,
            gate,
            cfg,
        }
    }

    /// Run one draw with a freshly sampled prize code.
    pub async fn draw(&self, entrant: &Entrant) -> Result<Outcome, EngineError> {
        let code = rand::thread_rng().gen_range(0..CODE_MAX);
        self.draw_with_code(entrant, code).await
    }

    /// Deterministic entry point: the caller supplies the prize code.
    pub async fn draw_with_code(
        &self,
        entrant: &Entrant,
        code: i64,
    ) -> Result<Outcome, EngineError> {
        let mut lock = DistLock::new(
            self.kv.clone(),
            &format!("{LUCKY_LOCK_KEY_PREFIX}{}", entrant.user_id),
        )
        .with_ttl_secs(self.cfg.lock_ttl_secs)
        .blocking()
        .with_max_wait_secs(self.cfg.lock_wait_secs)
        .with_watchdog();

        lock.acquire().await?;
        let outcome = self.run_locked(entrant, code).await;

        if let Err(e) = lock.release().await {
            // The critical section may have been interrupted; surface the
            // signal but keep the draw's outcome.
            warn!(user_id = entrant.user_id, error = %e, "draw lock release failed");
        }
        outcome
    }

    async fn run_locked(&self, entrant: &Entrant, code: i64) -> Result<Outcome, EngineError> {
        let now = now_unix();

        match self.gate.admit(entrant.user_id, &entrant.ip, now).await? {
            Admission::Refused(reason) => return Ok(Outcome::Denied(reason)),
            Admission::Granted => {}
        }

        // Selection: first active prize whose range covers the code.
        let candidates = self.repos.prizes.useful_prizes(now).await?;
        let Some(prize) = candidates.into_iter().find(|p| p.covers(code)) else {
            return Ok(Outcome::Missed);
        };

        // prize_num == 0 means unlimited inventory; negative means no prize.
        if prize.prize_num < 0 || (prize.prize_num > 0 && prize.left_num <= 0) {
            return Ok(Outcome::Missed);
        }

        if prize.prize_num > 0 {
            let post = self.repos.prizes.decr_pool(prize.id).await?;
            if post < 0 {
                // The plan has not dripped this slot yet; the negative value
                // stays as back-pressure for the next refill.
                info!(prize_id = prize.id, pool = post, "pool exhausted for this slot");
                return Ok(Outcome::Missed);
            }

            if !self.repos.prizes.decr_left_num(prize.id, 1).await? {
                return Ok(Outcome::Denied(DenyReason::PrizeNotEnough));
            }
        }

        let mut coupon_code = None;
        if prize.prize_type == PrizeKind::CouponDiff {
            // left_num is already decremented; an empty reservoir leaves it
            // that way and operators reconcile from the coupon counts.
            match self.repos.coupons.issue(prize.id).await? {
                None => return Ok(Outcome::Missed),
                Some(code_str) => {
                    if !self.repos.coupons.mark_issued(&code_str, now).await? {
                        warn!(prize_id = prize.id, code = %code_str, "popped coupon was not available in the database");
                    }
                    coupon_code = Some(code_str);
                }
            }
        }

        let record = DrawRecord {
            id: 0,
            prize_id: prize.id,
            prize_name: prize.title.clone(),
            prize_type: prize.prize_type,
            user_id: entrant.user_id,
            user_name: entrant.user_name.clone(),
            prize_code: code,
            prize_data: prize.prize_profile.clone(),
            ip: entrant.ip.clone(),
            created_at: now,
        };
        if let Err(e) = self.repos.results.create(&record).await {
            // Inventory stays decremented; there is no rollback.
            error!(user_id = entrant.user_id, prize_id = prize.id, error = %e, "lost-result: reserved prize has no result row");
            return Err(EngineError::Store(e));
        }

        if prize.prize_type == PrizeKind::EntityLarge {
            self.blacklist_winner(entrant, now).await?;
        }

        Ok(Outcome::Won(WonPrize {
            id: prize.id,
            title: prize.title,
            img: prize.img,
            display_order: prize.display_order,
            prize_type: prize.prize_type,
            prize_profile: prize.prize_profile,
            coupon_code,
        }))
    }

    /// A large physical prize sidelines both the user and the source IP for
    /// a while so one participant cannot farm them.
    async fn blacklist_winner(&self, entrant: &Entrant, now: i64) -> anyhow::Result<()> {
        let black_time = now + DEFAULT_BLACK_TIME_SECS;

        let user = BlackUser {
            id: 0,
            user_id: entrant.user_id,
            user_name: entrant.user_name.clone(),
            black_time,
            real_name: String::new(),
            mobile: String::new(),
            address: String::new(),
            op_ip: entrant.ip.clone(),
            created_at: now,
            updated_at: now,
        };
        self.repos.black_users.upsert(&user, now).await?;
        self.repos
            .black_ips
            .upsert(&entrant.ip, black_time, now)
            .await?;
        Ok(())
    }
}
