use repo::model::PrizeKind;
use serde::Serialize;

/// Why a draw was refused before any selection happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    UserLimit,
    IpLimit,
    BlackedIp,
    BlackedUser,
    /// The pool granted a credit but the catalog row could not cover it.
    PrizeNotEnough,
}

/// Prize payload handed back to the winner.
#[derive(Debug, Clone, Serialize)]
pub struct WonPrize {
    pub id: u64,
    pub title: String,
    pub img: String,
    pub display_order: u32,
    pub prize_type: PrizeKind,
    pub prize_profile: String,
    /// Set when the prize issues distinct coupon codes.
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Won(WonPrize),
    Missed,
    Denied(DenyReason),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Another draw holds this user's lock; the caller may retry.
    #[error("a draw is already in progress for this user")]
    Busy,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<lock::LockError> for EngineError {
    fn from(e: lock::LockError) -> Self {
        match e {
            lock::LockError::AcquiredByOthers => EngineError::Busy,
            lock::LockError::NotOwner => EngineError::Busy,
            lock::LockError::Store(e) => EngineError::Store(e),
        }
    }
}
