use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::common::parse_column;
use crate::{
    db::{error::DbResult, repos::WorkerRepo},
    models::Worker,
};

pub struct SqliteWorkerRepo {
    pool: SqlitePool,
}

impl SqliteWorkerRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkerRepo for SqliteWorkerRepo {
    async fn reporting_workers(&self) -> DbResult<Vec<Worker>> {
        let rows = sqlx::query(
            r#"
            SELECT name, state, garden_addr, baggageclaim_url
            FROM workers
            WHERE state IN ('running', 'landing', 'retiring')
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Worker {
                    name: row.get("name"),
                    state: parse_column(&row.get::<String, _>("state"))?,
                    garden_addr: row.get("garden_addr"),
                    baggageclaim_url: row.get("baggageclaim_url"),
                })
            })
            .collect()
    }
}
