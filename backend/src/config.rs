use engine::{EngineConfig, Limits};

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    /// Draws a user may make per day.
    pub user_daily_max: i64,
    /// Per-IP daily count that triggers warnings.
    pub ip_soft_max: i64,
    /// Per-IP daily count that denies further draws.
    pub ip_hard_max: i64,

    /// Lease on the per-user draw lock, seconds.
    pub lock_ttl_secs: u64,
    /// How long a caller queues behind a concurrent draw, seconds.
    pub lock_wait_secs: u64,

    /// UTC offset (hours) defining the service's calendar day; quotas reset
    /// and plans align to midnight in this offset.
    pub utc_offset_hours: i32,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://lottery.db?mode=rwc".to_string());

        Self {
            database_url,
            user_daily_max: env_parse("LOTTERY_USER_DAILY_MAX", common::consts::USER_DAILY_MAX),
            ip_soft_max: env_parse("LOTTERY_IP_SOFT_MAX", common::consts::IP_SOFT_MAX),
            ip_hard_max: env_parse("LOTTERY_IP_HARD_MAX", common::consts::IP_HARD_MAX),
            lock_ttl_secs: env_parse("LOTTERY_LOCK_TTL_SECS", 5),
            lock_wait_secs: env_parse("LOTTERY_LOCK_WAIT_SECS", 5),
            utc_offset_hours: env_parse("LOTTERY_UTC_OFFSET_HOURS", 8),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            limits: Limits {
                user_daily_max: self.user_daily_max,
                ip_soft_max: self.ip_soft_max,
                ip_hard_max: self.ip_hard_max,
            },
            lock_ttl_secs: self.lock_ttl_secs,
            lock_wait_secs: self.lock_wait_secs,
            utc_offset_hours: self.utc_offset_hours,
        }
    }
}
