use std::sync::Arc;

use backend::api::Api;
use backend::config::AppConfig;
use common::logger::init_logger;
use engine::{AdminOps, LotteryEngine};
use repo::Repos;
use store::{Db, MemoryKv, SharedKv};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger("lottery");

    let cfg = AppConfig::from_env();
    let engine_cfg = cfg.engine_config();

    let db = Db::connect(&cfg.database_url).await?;
    db.migrate().await?;

    // Single-instance deployment: the KV substrate lives in-process. A
    // networked store plugs in behind the same trait.
    let kv: SharedKv = Arc::new(MemoryKv::new());

    let repos = Repos::new(db.clone(), kv.clone());
    let admin = Arc::new(AdminOps::new(
        kv.clone(),
        repos.clone(),
        engine_cfg.day_offset(),
    ));
    let engine = Arc::new(LotteryEngine::new(kv.clone(), repos.clone(), engine_cfg));

    // Warm the catalog snapshot before taking traffic.
    repos.prizes.get_all_cached().await?;

    let tasks = tasks::spawn_all(
        kv.clone(),
        repos.clone(),
        admin.clone(),
        engine_cfg.day_offset(),
    );

    // The HTTP layer mounts its routes over this adapter; request binding
    // and token validation live there.
    let _api = Api::new(engine, admin, repos);

    tracing::info!("lottery service ready; waiting for shutdown signal");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    tasks.stop();
    Ok(())
}
