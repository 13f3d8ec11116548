use sqlx::Row;
use store::Db;

use crate::model::{DrawRecord, PrizeKind};

/// Append-only log of winning draws.
pub struct ResultRepo {
    db: Db,
}

impl ResultRepo {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create(&self, rec: &DrawRecord) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
INSERT INTO result (prize_id, prize_name, prize_type, user_id, user_name, prize_code, prize_data, ip, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(rec.prize_id as i64)
        .bind(&rec.prize_name)
        .bind(rec.prize_type.as_i64())
        .bind(rec.user_id as i64)
        .bind(&rec.user_name)
        .bind(rec.prize_code)
        .bind(&rec.prize_data)
        .bind(&rec.ip)
        .bind(rec.created_at)
        .execute(self.db.pool())
        .await?;

        Ok(res.last_insert_rowid() as u64)
    }

    pub async fn list_recent(&self, limit: u32) -> anyhow::Result<Vec<DrawRecord>> {
        let rows = sqlx::query("SELECT * FROM result ORDER BY id DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(self.db.pool())
            .await?;

        rows.iter()
            .map(|row| {
                Ok(DrawRecord {
                    id: row.get::<i64, _>("id") as u64,
                    prize_id: row.get::<i64, _>("prize_id") as u64,
                    prize_name: row.get("prize_name"),
                    prize_type: PrizeKind::from_i64(row.get("prize_type"))?,
                    user_id: row.get::<i64, _>("user_id") as u64,
                    user_name: row.get("user_name"),
                    prize_code: row.get("prize_code"),
                    prize_data: row.get("prize_data"),
                    ip: row.get("ip"),
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }

    pub async fn count(&self) -> anyhow::Result<i64> {
        let n: i64 = sqlx::query("SELECT COUNT(*) AS n FROM result")
            .fetch_one(self.db.pool())
            .await?
            .get("n");
        Ok(n)
    }
}
