use std::sync::Arc;

use chrono::FixedOffset;

use common::time::now_unix;
use engine::{AdminOps, ViewPrize};
use repo::Repos;
use repo::model::{PlanSlot, PrizeKind, PrizeStatus};
use store::{Db, MemoryKv, SharedKv};

async fn setup() -> (Repos, AdminOps) {
    let name = uuid::Uuid::new_v4().to_string();
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");

    let db = Db::connect(&url).await.unwrap();
    db.migrate().await.unwrap();

    let kv: SharedKv = Arc::new(MemoryKv::new());
    let repos = Repos::new(db, kv.clone());
    let admin = AdminOps::new(kv, repos.clone(), FixedOffset::east_opt(8 * 3_600).unwrap());
    (repos, admin)
}

fn view(prize_num: i64, prize_time: u32, prize_type: PrizeKind) -> ViewPrize {
    let now = now_unix();
    ViewPrize {
        id: 0,
        title: "mug".into(),
        img: String::new(),
        prize_num,
        left_num: prize_num,
        prize_code: "0-9999".into(),
        prize_time,
        prize_type,
        prize_profile: String::new(),
        begin_time: now - 3_600,
        end_time: now + 7 * 86_400,
        display_order: 0,
        status: PrizeStatus::Active,
    }
}

#[tokio::test]
async fn add_unscheduled_prize_fills_the_pool_at_once() {
    let (repos, admin) = setup().await;

    let id = admin.add_prize(view(25, 0, PrizeKind::VirtualCoin)).await.unwrap();

    let stored = repos.prizes.get(id).await.unwrap().unwrap();
    assert_eq!(stored.left_num, 25);
    assert!(stored.prize_plan.is_empty());
    assert_eq!(repos.prizes.pool_num(id).await.unwrap(), 25);
}

#[tokio::test]
async fn add_scheduled_prize_generates_a_full_plan() {
    let (repos, admin) = setup().await;

    let id = admin.add_prize(view(120, 3, PrizeKind::CouponSame)).await.unwrap();

    let stored = repos.prizes.get(id).await.unwrap().unwrap();
    let slots = PlanSlot::parse_list(&stored.prize_plan).unwrap();
    let total: i64 = slots.iter().map(|s| s.num).sum();
    assert_eq!(total, 120);
    assert_eq!(stored.prize_end - stored.prize_begin, 3 * 86_400);

    // The pool starts empty; the refill task drips the plan in.
    assert_eq!(repos.prizes.pool_num(id).await.unwrap(), 0);
}

#[tokio::test]
async fn update_with_changed_stock_replans() {
    let (repos, admin) = setup().await;

    let id = admin.add_prize(view(50, 2, PrizeKind::CouponSame)).await.unwrap();
    let before = repos.prizes.get(id).await.unwrap().unwrap();

    let mut changed = view(80, 2, PrizeKind::CouponSame);
    changed.id = id;
    changed.left_num = 80;
    admin.update_prize(changed).await.unwrap();

    let after = repos.prizes.get(id).await.unwrap().unwrap();
    assert_eq!(after.prize_num, 80);
    let total: i64 = PlanSlot::parse_list(&after.prize_plan)
        .unwrap()
        .iter()
        .map(|s| s.num)
        .sum();
    assert_eq!(total, 80);
    assert!(after.prize_plan != before.prize_plan);
}

#[tokio::test]
async fn delete_clears_plan_and_pool() {
    let (repos, admin) = setup().await;

    let id = admin.add_prize(view(30, 0, PrizeKind::CouponSame)).await.unwrap();
    assert_eq!(repos.prizes.pool_num(id).await.unwrap(), 30);

    admin.delete_prize(id).await.unwrap();

    let stored = repos.prizes.get(id).await.unwrap().unwrap();
    assert_eq!(stored.status, PrizeStatus::Deleted);
    assert!(stored.prize_plan.is_empty());
    assert_eq!(repos.prizes.pool_num(id).await.unwrap(), 0);

    // Deleted rows disappear from the operator listing.
    assert!(admin.list_prizes().await.unwrap().is_empty());
}

#[tokio::test]
async fn coupon_import_requires_a_distinct_code_prize() {
    let (_repos, admin) = setup().await;

    let plain = admin.add_prize(view(10, 0, PrizeKind::CouponSame)).await.unwrap();
    assert!(admin.import_coupons(plain, "A\nB").await.is_err());

    let diff = admin.add_prize(view(10, 0, PrizeKind::CouponDiff)).await.unwrap();
    let (ok, fail) = admin.import_coupons(diff, "A\nB\n\nC").await.unwrap();
    assert_eq!((ok, fail), (3, 0));

    let (rows, db_n, cache_n) = admin.list_coupons(diff).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(db_n, 3);
    assert_eq!(cache_n, 3);
}

#[tokio::test]
async fn rebuild_coupons_reconciles_reservoir_with_database() {
    let (repos, admin) = setup().await;

    let id = admin.add_prize(view(10, 0, PrizeKind::CouponDiff)).await.unwrap();
    admin.import_coupons(id, "A\nB\nC").await.unwrap();

    // The reservoir drifts (simulated KV flush).
    repos.coupons.issue(id).await.unwrap();
    repos.coupons.issue(id).await.unwrap();

    let (added, _) = admin.rebuild_coupons(id).await.unwrap();
    assert_eq!(added, 3);

    let (_, db_n, cache_n) = admin.list_coupons(id).await.unwrap();
    assert_eq!(db_n, 3);
    assert_eq!(cache_n, 3);
}
