use std::sync::Arc;

use backend::api::{Api, DrawRequest};
use backend::config::AppConfig;
use engine::{AdminOps, LotteryEngine, ViewPrize};
use repo::Repos;
use repo::model::{PrizeKind, PrizeStatus};
use store::{Db, MemoryKv, SharedKv};

async fn setup() -> Api {
    let name = uuid::Uuid::new_v4().to_string();
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");

    let db = Db::connect(&url).await.unwrap();
    db.migrate().await.unwrap();

    let kv: SharedKv = Arc::new(MemoryKv::new());
    let repos = Repos::new(db, kv.clone());

    let cfg = AppConfig::from_env().engine_config();
    let admin = Arc::new(AdminOps::new(kv.clone(), repos.clone(), cfg.day_offset()));
    let engine = Arc::new(LotteryEngine::new(kv, repos.clone(), cfg));

    Api::new(engine, admin, repos)
}

fn always_wins(prize_num: i64) -> ViewPrize {
    let now = common::time::now_unix();
    ViewPrize {
        id: 0,
        title: "grand mug".into(),
        img: String::new(),
        prize_num,
        left_num: prize_num,
        // Unscheduled: the whole stock lands in the pool immediately.
        prize_time: 0,
        prize_code: "0-9999".into(),
        prize_type: PrizeKind::CouponSame,
        prize_profile: String::new(),
        begin_time: now - 3_600,
        end_time: now + 86_400,
        display_order: 0,
        status: PrizeStatus::Active,
    }
}

fn request(user_id: u64) -> DrawRequest {
    DrawRequest {
        user_id,
        user_name: format!("user-{user_id}"),
        ip: "1.2.3.4".into(),
        token: "validated-upstream".into(),
    }
}

#[tokio::test]
async fn winning_draw_maps_to_ok_with_payload() {
    let api = setup().await;
    api.add_prize(always_wins(5)).await.unwrap();

    let resp = api.draw(request(7)).await;
    assert_eq!(resp.code, 0);
    let prize = resp.data.expect("winning response carries the prize");
    assert_eq!(prize.title, "grand mug");

    let results = api.show_results(10).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].user_id, 7);
}

#[tokio::test]
async fn empty_catalog_maps_to_not_won() {
    let api = setup().await;

    let resp = api.draw(request(7)).await;
    assert_eq!(resp.code, 100_010);
    assert!(resp.data.is_none());
}

#[tokio::test]
async fn manually_blacklisted_ip_is_denied() {
    let api = setup().await;
    api.add_prize(always_wins(5)).await.unwrap();

    let until = common::time::now_unix() + 3_600;
    api.blacklist_ip("1.2.3.4", until).await.unwrap();

    let resp = api.draw(request(7)).await;
    assert_eq!(resp.code, 10_003);
}

#[tokio::test]
async fn admin_surface_round_trips() {
    let api = setup().await;

    let id = api.add_prize(always_wins(5)).await.unwrap();
    assert_eq!(api.list_prizes().await.unwrap().len(), 1);

    api.reset_plan(id).await.unwrap();

    api.delete_prize(id).await.unwrap();
    assert!(api.list_prizes().await.unwrap().is_empty());

    let resp = api.draw(request(7)).await;
    assert_eq!(resp.code, 100_010);
}
