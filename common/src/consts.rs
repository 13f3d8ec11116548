//! Domain-wide constants: admission ceilings, probability space, cache keys.

/// Draws a user may make per calendar day.
pub const USER_DAILY_MAX: i64 = 3_000;
/// Per-IP daily count above which we start warning.
pub const IP_SOFT_MAX: i64 = 30_000;
/// Per-IP daily count above which draws are denied.
pub const IP_HARD_MAX: i64 = 300_000;

/// Prize codes are drawn uniformly from `[0, CODE_MAX)`.
pub const CODE_MAX: i64 = 10_000;

/// Shard width for the per-user daily counter hashes.
pub const USER_SHARD: u64 = 2;
/// Shard width for the per-IP daily counter hashes.
pub const IP_SHARD: u64 = 2;

/// How long a large-prize winner stays blacklisted, in seconds.
pub const DEFAULT_BLACK_TIME_SECS: i64 = 7 * 86_400;
/// TTL of the full-catalog snapshot, in seconds.
pub const ALL_PRIZE_TTL_SECS: u64 = 30 * 86_400;

/// Offset added to a prize id to form the coupon-rebuild lock key, keeping it
/// disjoint from every user lock key.
pub const COUPON_DIFF_LOCK_OFFSET: u64 = 10_000_000;

pub const ALL_PRIZE_KEY: &str = "all_prize";
pub const PRIZE_POOL_KEY: &str = "prize_pool";
pub const PRIZE_COUPON_KEY_PREFIX: &str = "prize_coupon_";
pub const USER_DAY_NUM_KEY_PREFIX: &str = "user_lottery_day_num_";
pub const IP_DAY_NUM_KEY_PREFIX: &str = "day_ip_num_";
pub const BLACK_USER_KEY_PREFIX: &str = "black_user_info_";
pub const BLACK_IP_KEY_PREFIX: &str = "black_ip_info_";
pub const LUCKY_LOCK_KEY_PREFIX: &str = "lucky_lock_";
