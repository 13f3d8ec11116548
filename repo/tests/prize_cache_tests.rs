use std::sync::Arc;

use common::consts::ALL_PRIZE_KEY;
use repo::model::{BlackUser, Prize, PrizeKind, PrizeStatus};
use repo::{BlackIpRepo, BlackUserRepo, CounterRepo, DayQuota, PrizeRepo};
use store::{Db, Kv, MemoryKv, SharedKv};

async fn setup() -> (Db, SharedKv) {
    let name = uuid::Uuid::new_v4().to_string();
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");

    let db = Db::connect(&url).await.unwrap();
    db.migrate().await.unwrap();

    let kv: SharedKv = Arc::new(MemoryKv::new());
    (db, kv)
}

const NOW: i64 = 1_700_000_000;

fn sample_prize(title: &str, code: &str) -> Prize {
    Prize {
        id: 0,
        title: title.to_string(),
        prize_num: 10,
        left_num: 10,
        prize_code: code.to_string(),
        prize_time: 0,
        img: String::new(),
        display_order: 0,
        prize_type: PrizeKind::CouponSame,
        prize_profile: String::new(),
        begin_time: NOW - 3_600,
        end_time: NOW + 3_600,
        prize_plan: String::new(),
        prize_begin: 0,
        prize_end: 0,
        status: PrizeStatus::Active,
        created_at: NOW,
        updated_at: NOW,
        op_ip: String::new(),
    }
}

#[tokio::test]
async fn catalog_write_invalidates_the_snapshot_before_the_db() {
    let (db, kv) = setup().await;
    let repo = PrizeRepo::new(db, kv.clone());

    let id = repo.create(&sample_prize("mug", "0-9999")).await.unwrap();

    // A read populates the snapshot.
    repo.get_all_cached().await.unwrap();
    assert!(kv.get(ALL_PRIZE_KEY).await.unwrap().is_some());

    // A write drops it; the next read observes the new value.
    let mut updated = repo.get(id).await.unwrap().unwrap();
    updated.title = "bigger mug".to_string();
    repo.update_info(&updated, NOW + 10).await.unwrap();
    assert!(kv.get(ALL_PRIZE_KEY).await.unwrap().is_none());

    let fresh = repo.get_cached(id).await.unwrap().unwrap();
    assert_eq!(fresh.title, "bigger mug");
}

#[tokio::test]
async fn useful_prizes_filters_and_parses_ranges() {
    let (db, kv) = setup().await;
    let repo = PrizeRepo::new(db, kv);

    let keep = repo.create(&sample_prize("keep", "0-4999")).await.unwrap();

    repo.create(&sample_prize("malformed", "junk")).await.unwrap();
    repo.create(&sample_prize("too-high", "0-10000")).await.unwrap();

    let mut expired = sample_prize("expired", "0-9999");
    expired.end_time = NOW - 1;
    repo.create(&expired).await.unwrap();

    let mut deleted = sample_prize("deleted", "0-9999");
    deleted.status = PrizeStatus::Deleted;
    repo.create(&deleted).await.unwrap();

    let mut drained = sample_prize("no-stock", "0-9999");
    drained.prize_num = 0;
    repo.create(&drained).await.unwrap();

    let useful = repo.useful_prizes(NOW).await.unwrap();
    assert_eq!(useful.len(), 1);
    assert_eq!(useful[0].id, keep);
    assert_eq!((useful[0].code_low, useful[0].code_high), (0, 4999));
    assert!(useful[0].covers(0) && useful[0].covers(4999) && !useful[0].covers(5000));
}

#[tokio::test]
async fn decr_left_num_stops_at_zero() {
    let (db, kv) = setup().await;
    let repo = PrizeRepo::new(db, kv);

    let mut p = sample_prize("scarce", "0-9999");
    p.prize_num = 2;
    p.left_num = 2;
    let id = repo.create(&p).await.unwrap();

    assert!(repo.decr_left_num(id, 1).await.unwrap());
    assert!(repo.decr_left_num(id, 1).await.unwrap());
    assert!(!repo.decr_left_num(id, 1).await.unwrap());

    assert_eq!(repo.get(id).await.unwrap().unwrap().left_num, 0);
}

#[tokio::test]
async fn pool_credits_and_markers() {
    let (db, kv) = setup().await;
    let repo = PrizeRepo::new(db, kv);

    repo.set_pool(9, 2).await.unwrap();
    assert_eq!(repo.pool_num(9).await.unwrap(), 2);

    assert_eq!(repo.decr_pool(9).await.unwrap(), 1);
    assert_eq!(repo.decr_pool(9).await.unwrap(), 0);
    // Exhausted: the negative marker stays.
    assert_eq!(repo.decr_pool(9).await.unwrap(), -1);

    // A credit absorbs the marker, then tops the shortfall back up.
    assert_eq!(repo.credit_pool(9, 5).await.unwrap(), 5);
    assert_eq!(repo.pool_num(9).await.unwrap(), 5);
}

#[tokio::test]
async fn blacklist_read_through_and_write_order() {
    let (db, kv) = setup().await;
    let users = BlackUserRepo::new(db.clone(), kv.clone());
    let ips = BlackIpRepo::new(db, kv.clone());

    assert!(users.get(42).await.unwrap().is_none());

    let entry = BlackUser {
        id: 0,
        user_id: 42,
        user_name: "mallory".into(),
        black_time: NOW + 604_800,
        real_name: String::new(),
        mobile: String::new(),
        address: String::new(),
        op_ip: "1.2.3.4".into(),
        created_at: NOW,
        updated_at: NOW,
    };
    users.upsert(&entry, NOW).await.unwrap();

    let got = users.get(42).await.unwrap().unwrap();
    assert!(got.is_active(NOW));
    assert!(!got.is_active(NOW + 604_801));

    // Second read serves from the hash cache.
    assert!(
        !kv.hgetall("black_user_info_42").await.unwrap().is_empty(),
        "lookup should have populated the cache"
    );
    assert_eq!(users.get(42).await.unwrap().unwrap().user_name, "mallory");

    // An update deletes the cache first, so the next read sees the new
    // expiry.
    let mut extended = entry.clone();
    extended.black_time = NOW + 2 * 604_800;
    users.upsert(&extended, NOW + 10).await.unwrap();
    assert_eq!(
        users.get(42).await.unwrap().unwrap().black_time,
        NOW + 2 * 604_800
    );

    ips.upsert("1.2.3.4", NOW + 604_800, NOW).await.unwrap();
    assert!(ips.get("1.2.3.4").await.unwrap().unwrap().is_active(NOW));
    assert!(ips.get("9.9.9.9").await.unwrap().is_none());
}

#[tokio::test]
async fn day_quota_counts_and_reseeds() {
    let (db, kv) = setup().await;
    let counters = CounterRepo::new(db, kv);

    // Cached counter is monotonic within the day.
    assert_eq!(counters.incr_user_day(7).await.unwrap(), 1);
    assert_eq!(counters.incr_user_day(7).await.unwrap(), 2);

    // Durable quota: three draws allowed, the fourth is exhausted.
    for expect in 1..=3 {
        let quota = counters.consume_day_quota(7, 20_220_625, 3, NOW).await.unwrap();
        assert_eq!(quota, DayQuota::Allowed { db_num: expect });
    }
    let quota = counters.consume_day_quota(7, 20_220_625, 3, NOW).await.unwrap();
    assert_eq!(quota, DayQuota::Exhausted { db_num: 3 });

    let row = counters.get_times(7, 20_220_625).await.unwrap().unwrap();
    assert_eq!(row.num, 3);
    assert!(counters.get_times(7, 20_220_626).await.unwrap().is_none());

    // Recovery from cache loss: reseed from the database's higher count.
    counters.seed_user_day(7, 3).await.unwrap();
    assert_eq!(counters.cached_user_day(7).await.unwrap(), 3);
    assert_eq!(counters.incr_user_day(7).await.unwrap(), 4);
}
