use sqlx::SqlitePool;

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    // Prize catalog
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS prize (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  title TEXT NOT NULL,

  prize_num BIGINT NOT NULL DEFAULT -1,
  left_num BIGINT NOT NULL DEFAULT 0,
  prize_code TEXT NOT NULL,
  prize_time INTEGER NOT NULL DEFAULT 0,

  img TEXT NOT NULL DEFAULT '',
  display_order INTEGER NOT NULL DEFAULT 0,
  prize_type INTEGER NOT NULL DEFAULT 0,
  prize_profile TEXT NOT NULL DEFAULT '',

  begin_time BIGINT NOT NULL DEFAULT 0,
  end_time BIGINT NOT NULL DEFAULT 0,

  prize_plan TEXT NOT NULL DEFAULT '',
  prize_begin BIGINT NOT NULL DEFAULT 0,
  prize_end BIGINT NOT NULL DEFAULT 0,

  status INTEGER NOT NULL DEFAULT 1,
  created_at BIGINT NOT NULL,
  updated_at BIGINT NOT NULL,
  op_ip TEXT NOT NULL DEFAULT ''
);
"#,
    )
    .execute(pool)
    .await?;

    // Unique coupon codes
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS coupon (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  prize_id BIGINT NOT NULL,
  code TEXT NOT NULL UNIQUE,
  status INTEGER NOT NULL DEFAULT 1,
  created_at BIGINT NOT NULL,
  updated_at BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Draw results, append-only
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS result (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  prize_id BIGINT NOT NULL,
  prize_name TEXT NOT NULL,
  prize_type INTEGER NOT NULL,
  user_id BIGINT NOT NULL,
  user_name TEXT NOT NULL,
  prize_code BIGINT NOT NULL,
  prize_data TEXT NOT NULL DEFAULT '',
  ip TEXT NOT NULL DEFAULT '',
  created_at BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Accounts (managed by the registration service; only referenced here)
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS user (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_name TEXT NOT NULL UNIQUE,
  created_at BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS black_user (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id BIGINT NOT NULL UNIQUE,
  user_name TEXT NOT NULL DEFAULT '',
  black_time BIGINT NOT NULL,
  real_name TEXT NOT NULL DEFAULT '',
  mobile TEXT NOT NULL DEFAULT '',
  address TEXT NOT NULL DEFAULT '',
  op_ip TEXT NOT NULL DEFAULT '',
  created_at BIGINT NOT NULL,
  updated_at BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS black_ip (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  ip TEXT NOT NULL UNIQUE,
  black_time BIGINT NOT NULL,
  created_at BIGINT NOT NULL,
  updated_at BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Per-user per-day draw counters
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS lottery_times (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id BIGINT NOT NULL,
  day INTEGER NOT NULL,
  num BIGINT NOT NULL DEFAULT 0,
  created_at BIGINT NOT NULL,
  updated_at BIGINT NOT NULL,
  UNIQUE(user_id, day)
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_coupon_prize ON coupon(prize_id);"#)
        .execute(pool)
        .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_result_user ON result(user_id);"#)
        .execute(pool)
        .await?;

    Ok(())
}
