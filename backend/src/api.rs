//! Thin request→engine adapter. The HTTP layer binds requests, validates
//! the token, and calls into this; everything here is transport-agnostic.

use std::sync::Arc;

use serde::Serialize;
use tracing::error;

use engine::{AdminOps, DenyReason, EngineError, Entrant, LotteryEngine, Outcome, ViewPrize, WonPrize};
use repo::Repos;
use repo::model::{Coupon, DrawRecord, Prize};

/// Response codes kept stable for API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiCode {
    Ok,
    Internal,
    IpLimit,
    UserLimit,
    BlackedIp,
    BlackedUser,
    PrizeNotEnough,
    NotWon,
}

impl ApiCode {
    pub fn value(self) -> u32 {
        match self {
            ApiCode::Ok => 0,
            ApiCode::Internal => 500,
            ApiCode::IpLimit => 10_001,
            ApiCode::UserLimit => 10_002,
            ApiCode::BlackedIp => 10_003,
            ApiCode::BlackedUser => 10_004,
            ApiCode::PrizeNotEnough => 10_005,
            ApiCode::NotWon => 100_010,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ApiCode::Ok => "ok",
            ApiCode::Internal => "internal server error",
            ApiCode::IpLimit => "ip day num limited",
            ApiCode::UserLimit => "user day num limited",
            ApiCode::BlackedIp => "blacked ip",
            ApiCode::BlackedUser => "blacked user",
            ApiCode::PrizeNotEnough => "prize not enough",
            ApiCode::NotWon => "sorry, you didn't win a prize",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DrawRequest {
    pub user_id: u64,
    pub user_name: String,
    pub ip: String,
    /// Pre-validated by the HTTP layer; carried for auditing only.
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DrawResponse {
    pub code: u32,
    pub msg: String,
    pub data: Option<WonPrize>,
}

impl DrawResponse {
    fn of(code: ApiCode) -> Self {
        Self {
            code: code.value(),
            msg: code.message().to_string(),
            data: None,
        }
    }

    fn won(prize: WonPrize) -> Self {
        Self {
            code: ApiCode::Ok.value(),
            msg: ApiCode::Ok.message().to_string(),
            data: Some(prize),
        }
    }
}

fn deny_code(reason: DenyReason) -> ApiCode {
    match reason {
        DenyReason::UserLimit => ApiCode::UserLimit,
        DenyReason::IpLimit => ApiCode::IpLimit,
        DenyReason::BlackedIp => ApiCode::BlackedIp,
        DenyReason::BlackedUser => ApiCode::BlackedUser,
        DenyReason::PrizeNotEnough => ApiCode::PrizeNotEnough,
    }
}

pub struct Api {
    engine: Arc<LotteryEngine>,
    admin: Arc<AdminOps>,
    repos: Repos,
}

impl Api {
    pub fn new(engine: Arc<LotteryEngine>, admin: Arc<AdminOps>, repos: Repos) -> Self {
        Self {
            engine,
            admin,
            repos,
        }
    }

    pub async fn draw(&self, req: DrawRequest) -> DrawResponse {
        let entrant = Entrant {
            user_id: req.user_id,
            user_name: req.user_name,
            ip: req.ip,
        };

        match self.engine.draw(&entrant).await {
            Ok(Outcome::Won(prize)) => DrawResponse::won(prize),
            Ok(Outcome::Missed) => DrawResponse::of(ApiCode::NotWon),
            Ok(Outcome::Denied(reason)) => DrawResponse::of(deny_code(reason)),
            Err(EngineError::Busy) => DrawResponse::of(ApiCode::Internal),
            Err(EngineError::Store(e)) => {
                error!(user_id = entrant.user_id, error = %e, "draw failed");
                DrawResponse::of(ApiCode::Internal)
            }
        }
    }

    pub async fn show_results(&self, limit: u32) -> anyhow::Result<Vec<DrawRecord>> {
        self.repos.results.list_recent(limit).await
    }

    // Admin surface: passthroughs to the operator service.

    pub async fn add_prize(&self, prize: ViewPrize) -> anyhow::Result<u64> {
        self.admin.add_prize(prize).await
    }

    pub async fn update_prize(&self, prize: ViewPrize) -> anyhow::Result<()> {
        self.admin.update_prize(prize).await
    }

    pub async fn delete_prize(&self, id: u64) -> anyhow::Result<()> {
        self.admin.delete_prize(id).await
    }

    pub async fn list_prizes(&self) -> anyhow::Result<Vec<Prize>> {
        self.admin.list_prizes().await
    }

    pub async fn import_coupons(&self, prize_id: u64, codes: &str) -> anyhow::Result<(u64, u64)> {
        self.admin.import_coupons(prize_id, codes).await
    }

    pub async fn list_coupons(&self, prize_id: u64) -> anyhow::Result<(Vec<Coupon>, i64, u64)> {
        self.admin.list_coupons(prize_id).await
    }

    pub async fn reset_plan(&self, prize_id: u64) -> anyhow::Result<()> {
        self.admin.reset_plan(prize_id).await
    }

    pub async fn rebuild_coupons(&self, prize_id: u64) -> anyhow::Result<(u64, u64)> {
        self.admin.rebuild_coupons(prize_id).await
    }

    /// Manually sideline an IP until the given unix time.
    pub async fn blacklist_ip(&self, ip: &str, until: i64) -> anyhow::Result<()> {
        let now = common::time::now_unix();
        self.repos.black_ips.upsert(ip, until, now).await
    }
}
