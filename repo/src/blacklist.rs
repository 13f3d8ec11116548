//! User and IP blacklists with a read-through hash cache.
//!
//! A lookup consults the per-entry hash first and falls back to the
//! database, repopulating the hash on a hit. Writes delete the hash before
//! the database upsert so concurrent readers repopulate from a state at
//! least as new as the writer's pre-image. Absence is not cached.

use std::collections::HashMap;

use sqlx::Row;
use store::{Db, Kv as _, SharedKv};

use common::consts::{BLACK_IP_KEY_PREFIX, BLACK_USER_KEY_PREFIX};

use crate::model::{BlackIp, BlackUser};

pub struct BlackUserRepo {
    db: Db,
    kv: SharedKv,
}

fn user_key(user_id: u64) -> String {
    format!("{BLACK_USER_KEY_PREFIX}{user_id}")
}

fn ip_key(ip: &str) -> String {
    format!("{BLACK_IP_KEY_PREFIX}{ip}")
}

fn field(map: &HashMap<String, String>, name: &str) -> String {
    map.get(name).cloned().unwrap_or_default()
}

fn int_field(map: &HashMap<String, String>, name: &str) -> i64 {
    map.get(name).and_then(|v| v.parse().ok()).unwrap_or(0)
}

impl BlackUserRepo {
    pub fn new(db: Db, kv: SharedKv) -> Self {
        Self { db, kv }
    }

    pub async fn get(&self, user_id: u64) -> anyhow::Result<Option<BlackUser>> {
        let cached = self.kv.hgetall(&user_key(user_id)).await?;
        if int_field(&cached, "user_id") > 0 {
            return Ok(Some(BlackUser {
                id: int_field(&cached, "id") as u64,
                user_id,
                user_name: field(&cached, "user_name"),
                black_time: int_field(&cached, "black_time"),
                real_name: field(&cached, "real_name"),
                mobile: field(&cached, "mobile"),
                address: field(&cached, "address"),
                op_ip: field(&cached, "op_ip"),
                created_at: int_field(&cached, "created_at"),
                updated_at: int_field(&cached, "updated_at"),
            }));
        }

        let row = sqlx::query("SELECT * FROM black_user WHERE user_id = ?")
            .bind(user_id as i64)
            .fetch_optional(self.db.pool())
            .await?;

        let Some(row) = row else { return Ok(None) };
        let user = BlackUser {
            id: row.get::<i64, _>("id") as u64,
            user_id: row.get::<i64, _>("user_id") as u64,
            user_name: row.get("user_name"),
            black_time: row.get("black_time"),
            real_name: row.get("real_name"),
            mobile: row.get("mobile"),
            address: row.get("address"),
            op_ip: row.get("op_ip"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        };

        self.populate(&user).await?;
        Ok(Some(user))
    }

    async fn populate(&self, user: &BlackUser) -> anyhow::Result<()> {
        let entries = vec![
            ("id".into(), user.id.to_string()),
            ("user_id".into(), user.user_id.to_string()),
            ("user_name".into(), user.user_name.clone()),
            ("black_time".into(), user.black_time.to_string()),
            ("real_name".into(), user.real_name.clone()),
            ("mobile".into(), user.mobile.clone()),
            ("address".into(), user.address.clone()),
            ("op_ip".into(), user.op_ip.clone()),
            ("created_at".into(), user.created_at.to_string()),
            ("updated_at".into(), user.updated_at.to_string()),
        ];
        self.kv
            .hset_multi(&user_key(user.user_id), &entries)
            .await?;
        Ok(())
    }

    /// Install or extend a blacklist entry until `black_time`.
    pub async fn upsert(&self, user: &BlackUser, now: i64) -> anyhow::Result<()> {
        self.kv.del(&user_key(user.user_id)).await?;

        sqlx::query(
            r#"
INSERT INTO black_user (user_id, user_name, black_time, real_name, mobile, address, op_ip, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(user_id) DO UPDATE SET
    black_time = excluded.black_time,
    updated_at = excluded.updated_at;
"#,
        )
        .bind(user.user_id as i64)
        .bind(&user.user_name)
        .bind(user.black_time)
        .bind(&user.real_name)
        .bind(&user.mobile)
        .bind(&user.address)
        .bind(&user.op_ip)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }
}

pub struct BlackIpRepo {
    db: Db,
    kv: SharedKv,
}

impl BlackIpRepo {
    pub fn new(db: Db, kv: SharedKv) -> Self {
        Self { db, kv }
    }

    pub async fn get(&self, ip: &str) -> anyhow::Result<Option<BlackIp>> {
        let cached = self.kv.hgetall(&ip_key(ip)).await?;
        if !field(&cached, "ip").is_empty() {
            return Ok(Some(BlackIp {
                id: int_field(&cached, "id") as u64,
                ip: ip.to_string(),
                black_time: int_field(&cached, "black_time"),
                created_at: int_field(&cached, "created_at"),
                updated_at: int_field(&cached, "updated_at"),
            }));
        }

        let row = sqlx::query("SELECT * FROM black_ip WHERE ip = ?")
            .bind(ip)
            .fetch_optional(self.db.pool())
            .await?;

        let Some(row) = row else { return Ok(None) };
        let entry = BlackIp {
            id: row.get::<i64, _>("id") as u64,
            ip: row.get("ip"),
            black_time: row.get("black_time"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        };

        let entries = vec![
            ("id".into(), entry.id.to_string()),
            ("ip".into(), entry.ip.clone()),
            ("black_time".into(), entry.black_time.to_string()),
            ("created_at".into(), entry.created_at.to_string()),
            ("updated_at".into(), entry.updated_at.to_string()),
        ];
        self.kv.hset_multi(&ip_key(ip), &entries).await?;

        Ok(Some(entry))
    }

    pub async fn upsert(&self, ip: &str, black_time: i64, now: i64) -> anyhow::Result<()> {
        self.kv.del(&ip_key(ip)).await?;

        sqlx::query(
            r#"
INSERT INTO black_ip (ip, black_time, created_at, updated_at)
VALUES (?, ?, ?, ?)
ON CONFLICT(ip) DO UPDATE SET
    black_time = excluded.black_time,
    updated_at = excluded.updated_at;
"#,
        )
        .bind(ip)
        .bind(black_time)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }
}
