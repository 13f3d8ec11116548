//! Admission pipeline run before any prize selection: per-user daily quota,
//! per-IP quota, then the two blacklists.

use chrono::FixedOffset;
use tracing::{info, warn};

use common::consts::{IP_HARD_MAX, IP_SOFT_MAX, USER_DAILY_MAX};
use common::time::day_stamp;
use repo::{DayQuota, Repos};

use crate::outcome::DenyReason;

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub user_daily_max: i64,
    pub ip_soft_max: i64,
    pub ip_hard_max: i64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            user_daily_max: USER_DAILY_MAX,
            ip_soft_max: IP_SOFT_MAX,
            ip_hard_max: IP_HARD_MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Granted,
    Refused(DenyReason),
}

pub struct AdmissionGate {
    repos: Repos,
    limits: Limits,
    day_offset: FixedOffset,
}

impl AdmissionGate {
    pub fn new(repos: Repos, limits: Limits, day_offset: FixedOffset) -> Self {
        Self {
            repos,
            limits,
            day_offset,
        }
    }

    pub async fn admit(&self, user_id: u64, ip: &str, now: i64) -> anyhow::Result<Admission> {
        if let Some(reason) = self.check_user_quota(user_id, now).await? {
            return Ok(Admission::Refused(reason));
        }
        if let Some(reason) = self.check_ip_quota(ip).await? {
            return Ok(Admission::Refused(reason));
        }
        if let Some(reason) = self.check_blacklists(user_id, ip, now).await? {
            return Ok(Admission::Refused(reason));
        }
        Ok(Admission::Granted)
    }

    /// Cheap cached count first, then the durable row. The cached count may
    /// overcount by in-flight draws; whenever the database reads higher it
    /// reseeds the cache so recovery from cache loss converges.
    async fn check_user_quota(&self, user_id: u64, now: i64) -> anyhow::Result<Option<DenyReason>> {
        let max = self.limits.user_daily_max;

        let cached = self.repos.counters.incr_user_day(user_id).await?;
        if cached > max {
            return Ok(Some(DenyReason::UserLimit));
        }

        let day = day_stamp(now, self.day_offset);
        match self
            .repos
            .counters
            .consume_day_quota(user_id, day, max, now)
            .await?
        {
            DayQuota::Exhausted { db_num } => {
                if db_num > cached {
                    self.repos.counters.seed_user_day(user_id, db_num).await?;
                }
                Ok(Some(DenyReason::UserLimit))
            }
            DayQuota::Allowed { db_num } => {
                if db_num > cached {
                    self.repos.counters.seed_user_day(user_id, db_num).await?;
                }
                Ok(None)
            }
        }
    }

    async fn check_ip_quota(&self, ip: &str) -> anyhow::Result<Option<DenyReason>> {
        let count = self.repos.counters.incr_ip_day(ip).await?;
        if count > self.limits.ip_hard_max {
            return Ok(Some(DenyReason::IpLimit));
        }
        if count > self.limits.ip_soft_max {
            warn!(ip, count, "ip draw count above the soft ceiling");
        }
        Ok(None)
    }

    async fn check_blacklists(
        &self,
        user_id: u64,
        ip: &str,
        now: i64,
    ) -> anyhow::Result<Option<DenyReason>> {
        let (black_ip, black_user) = tokio::join!(
            self.repos.black_ips.get(ip),
            self.repos.black_users.get(user_id),
        );

        if let Some(entry) = black_ip? {
            if entry.is_active(now) {
                info!(ip, until = entry.black_time, "ip is blacklisted");
                return Ok(Some(DenyReason::BlackedIp));
            }
        }
        if let Some(entry) = black_user? {
            if entry.is_active(now) {
                info!(user_id, until = entry.black_time, "user is blacklisted");
                return Ok(Some(DenyReason::BlackedUser));
            }
        }
        Ok(None)
    }
}
