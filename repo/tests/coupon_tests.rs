use std::sync::Arc;

use repo::CouponRepo;
use repo::model::CouponStatus;
use store::{Db, Kv, MemoryKv, SharedKv};

/// Isolated in-memory database; the unique name keeps parallel tests from
/// sharing state while cache=shared lets the pool open extra connections.
async fn setup() -> (Db, SharedKv) {
    let name = uuid::Uuid::new_v4().to_string();
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");

    let db = Db::connect(&url).await.unwrap();
    db.migrate().await.unwrap();

    let kv: SharedKv = Arc::new(MemoryKv::new());
    (db, kv)
}

#[tokio::test]
async fn import_then_issue_returns_each_code_exactly_once() {
    let (db, kv) = setup().await;
    let repo = CouponRepo::new(db, kv);

    let (ok, fail) = repo.import(1, "A\nB\nC\n", 1_000).await.unwrap();
    assert_eq!((ok, fail), (3, 0));

    let mut seen = Vec::new();
    for _ in 0..3 {
        let code = repo.issue(1).await.unwrap().expect("reservoir should hold a code");
        assert!(repo.mark_issued(&code, 2_000).await.unwrap());
        seen.push(code);
    }
    seen.sort();
    assert_eq!(seen, ["A", "B", "C"]);

    // The fourth draw finds the reservoir dry.
    assert!(repo.issue(1).await.unwrap().is_none());

    let (db_available, set_size) = repo.counts(1).await.unwrap();
    assert_eq!(db_available, 0);
    assert_eq!(set_size, 0);
}

#[tokio::test]
async fn duplicate_codes_count_as_failures() {
    let (db, kv) = setup().await;
    let repo = CouponRepo::new(db, kv);

    let (ok, fail) = repo.import(1, "A\nA\nB", 1_000).await.unwrap();
    assert_eq!((ok, fail), (2, 1));

    // Unique across prizes too: the same code under another prize fails.
    let (ok, fail) = repo.import(2, "A", 1_000).await.unwrap();
    assert_eq!((ok, fail), (0, 1));
}

#[tokio::test]
async fn mark_issued_only_flips_available_rows() {
    let (db, kv) = setup().await;
    let repo = CouponRepo::new(db, kv);

    repo.import(1, "A", 1_000).await.unwrap();
    assert!(repo.mark_issued("A", 2_000).await.unwrap());
    assert!(!repo.mark_issued("A", 3_000).await.unwrap());

    let rows = repo.list(1).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, CouponStatus::Issued);
}

#[tokio::test]
async fn rebuild_restores_the_reservoir_from_the_database() {
    let (db, kv) = setup().await;
    let repo = CouponRepo::new(db.clone(), kv.clone());

    repo.import(1, "A\nB\nC", 1_000).await.unwrap();

    // Issue one and lose the rest of the reservoir (simulated KV loss).
    let code = repo.issue(1).await.unwrap().unwrap();
    repo.mark_issued(&code, 2_000).await.unwrap();
    kv.del("prize_coupon_1").await.unwrap();

    let (added, skipped) = repo.rebuild(1).await.unwrap();
    assert_eq!(added, 2);
    assert_eq!(skipped, 0);

    let (db_available, set_size) = repo.counts(1).await.unwrap();
    assert_eq!(db_available, 2);
    assert_eq!(set_size, 2);

    // The issued code must not resurface.
    let mut rest = vec![
        repo.issue(1).await.unwrap().unwrap(),
        repo.issue(1).await.unwrap().unwrap(),
    ];
    rest.sort();
    assert!(!rest.contains(&code));
}

#[tokio::test]
async fn rebuild_with_nothing_available_clears_the_live_set() {
    let (db, kv) = setup().await;
    let repo = CouponRepo::new(db, kv.clone());

    repo.import(1, "A", 1_000).await.unwrap();
    let code = repo.issue(1).await.unwrap().unwrap();
    repo.mark_issued(&code, 2_000).await.unwrap();

    // Stale member sneaks back in; rebuild must clear it.
    kv.sadd("prize_coupon_1", "A").await.unwrap();

    let (added, _) = repo.rebuild(1).await.unwrap();
    assert_eq!(added, 0);
    assert_eq!(kv.scard("prize_coupon_1").await.unwrap(), 0);
}
