use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrizeStatus {
    Active,
    Deleted,
}

impl PrizeStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            PrizeStatus::Active => 1,
            PrizeStatus::Deleted => 2,
        }
    }

    pub fn from_i64(v: i64) -> anyhow::Result<Self> {
        match v {
            1 => Ok(PrizeStatus::Active),
            2 => Ok(PrizeStatus::Deleted),
            other => Err(anyhow::anyhow!("invalid prize status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrizeKind {
    VirtualCoin,
    /// Coupon with one shared code for every winner.
    CouponSame,
    /// Coupon with a unique code per winner, issued from the reservoir.
    CouponDiff,
    EntitySmall,
    EntityMid,
    EntityLarge,
}

impl PrizeKind {
    pub fn as_i64(self) -> i64 {
        match self {
            PrizeKind::VirtualCoin => 0,
            PrizeKind::CouponSame => 1,
            PrizeKind::CouponDiff => 2,
            PrizeKind::EntitySmall => 3,
            PrizeKind::EntityMid => 4,
            PrizeKind::EntityLarge => 5,
        }
    }

    pub fn from_i64(v: i64) -> anyhow::Result<Self> {
        match v {
            0 => Ok(PrizeKind::VirtualCoin),
            1 => Ok(PrizeKind::CouponSame),
            2 => Ok(PrizeKind::CouponDiff),
            3 => Ok(PrizeKind::EntitySmall),
            4 => Ok(PrizeKind::EntityMid),
            5 => Ok(PrizeKind::EntityLarge),
            other => Err(anyhow::anyhow!("invalid prize type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponStatus {
    Available,
    Issued,
    Void,
}

impl CouponStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            CouponStatus::Available => 1,
            CouponStatus::Issued => 2,
            CouponStatus::Void => 3,
        }
    }

    pub fn from_i64(v: i64) -> anyhow::Result<Self> {
        match v {
            1 => Ok(CouponStatus::Available),
            2 => Ok(CouponStatus::Issued),
            3 => Ok(CouponStatus::Void),
            other => Err(anyhow::anyhow!("invalid coupon status: {}", other)),
        }
    }
}

/// Catalog row. `prize_num` encodes inventory mode: 0 means unlimited,
/// positive means limited with `left_num` remaining, negative means no prize.
/// All timestamps are unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prize {
    pub id: u64,
    pub title: String,

    pub prize_num: i64,
    pub left_num: i64,
    /// Inclusive winning range, serialized as `"low-high"` within the code
    /// space.
    pub prize_code: String,
    /// Delivery window length in days; 0 means unscheduled.
    pub prize_time: u32,

    pub img: String,
    pub display_order: u32,
    pub prize_type: PrizeKind,
    pub prize_profile: String,

    pub begin_time: i64,
    pub end_time: i64,

    /// Serialized drip schedule, JSON array of [`PlanSlot`].
    pub prize_plan: String,
    pub prize_begin: i64,
    pub prize_end: i64,

    pub status: PrizeStatus,
    pub created_at: i64,
    pub updated_at: i64,
    pub op_ip: String,
}

/// One entry of the drip schedule: release `num` units at minute `time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSlot {
    pub time: i64,
    pub num: i64,
}

impl PlanSlot {
    /// Parse a serialized plan column; a blank column is an empty plan.
    pub fn parse_list(s: &str) -> anyhow::Result<Vec<PlanSlot>> {
        if s.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(s)?)
    }
}

/// A catalog row admitted into the draw, with its winning range parsed.
#[derive(Debug, Clone)]
pub struct ActivePrize {
    pub id: u64,
    pub title: String,
    pub prize_num: i64,
    pub left_num: i64,
    pub code_low: i64,
    pub code_high: i64,
    pub img: String,
    pub display_order: u32,
    pub prize_type: PrizeKind,
    pub prize_profile: String,
}

impl ActivePrize {
    pub fn covers(&self, code: i64) -> bool {
        self.code_low <= code && code <= self.code_high
    }
}

#[derive(Debug, Clone)]
pub struct Coupon {
    pub id: u64,
    pub prize_id: u64,
    pub code: String,
    pub status: CouponStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Append-only record of a winning draw.
#[derive(Debug, Clone)]
pub struct DrawRecord {
    pub id: u64,
    pub prize_id: u64,
    pub prize_name: String,
    pub prize_type: PrizeKind,
    pub user_id: u64,
    pub user_name: String,
    pub prize_code: i64,
    pub prize_data: String,
    pub ip: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct BlackUser {
    pub id: u64,
    pub user_id: u64,
    pub user_name: String,
    /// Absolute expiry, unix seconds. The entry is active while
    /// `now < black_time`.
    pub black_time: i64,
    pub real_name: String,
    pub mobile: String,
    pub address: String,
    pub op_ip: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl BlackUser {
    pub fn is_active(&self, now: i64) -> bool {
        now < self.black_time
    }
}

#[derive(Debug, Clone)]
pub struct BlackIp {
    pub id: u64,
    pub ip: String,
    pub black_time: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl BlackIp {
    pub fn is_active(&self, now: i64) -> bool {
        now < self.black_time
    }
}

/// `(user_id, day)` draw counter; `day` is a `yyyymmdd` stamp.
#[derive(Debug, Clone)]
pub struct LotteryTimes {
    pub id: u64,
    pub user_id: u64,
    pub day: u32,
    pub num: i64,
}
