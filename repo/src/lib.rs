pub mod blacklist;
pub mod counters;
pub mod coupon;
pub mod model;
pub mod prize;
pub mod result;

pub use blacklist::{BlackIpRepo, BlackUserRepo};
pub use counters::{CounterRepo, DayQuota};
pub use coupon::CouponRepo;
pub use prize::PrizeRepo;
pub use result::ResultRepo;

use std::sync::Arc;

use store::{Db, SharedKv};

/// Explicit bundle of every repository, built once at startup and cloned into
/// each component that needs store access.
#[derive(Clone)]
pub struct Repos {
    pub prizes: Arc<PrizeRepo>,
    pub coupons: Arc<CouponRepo>,
    pub results: Arc<ResultRepo>,
    pub counters: Arc<CounterRepo>,
    pub black_users: Arc<BlackUserRepo>,
    pub black_ips: Arc<BlackIpRepo>,
}

impl Repos {
    pub fn new(db: Db, kv: SharedKv) -> Self {
        Self {
            prizes: Arc::new(PrizeRepo::new(db.clone(), kv.clone())),
            coupons: Arc::new(CouponRepo::new(db.clone(), kv.clone())),
            results: Arc::new(ResultRepo::new(db.clone())),
            counters: Arc::new(CounterRepo::new(db.clone(), kv.clone())),
            black_users: Arc::new(BlackUserRepo::new(db.clone(), kv.clone())),
            black_ips: Arc::new(BlackIpRepo::new(db, kv)),
        }
    }
}
