use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::common::{ids_json, parse_column};
use crate::{
    db::{error::DbResult, repos::BuildRepo},
    models::{Build, Page},
};

pub struct SqliteBuildRepo {
    pool: SqlitePool,
}

impl SqliteBuildRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_build(row: &sqlx::sqlite::SqliteRow) -> DbResult<Build> {
        Ok(Build {
            id: row.get("id"),
            job_id: row.get("job_id"),
            status: parse_column(&row.get::<String, _>("status"))?,
            end_time: row.get("end_time"),
            drained: row.get("drained"),
            reap_time: row.get("reap_time"),
        })
    }
}

const BUILD_COLUMNS: &str = "id, job_id, status, end_time, drained, reap_time";

#[async_trait]
impl BuildRepo for SqliteBuildRepo {
    async fn job_builds(&self, job_id: i64, page: Page) -> DbResult<Vec<Build>> {
        let limit = i64::from(page.limit);

        let rows = match (page.since, page.until) {
            (None, Some(until)) => {
                // Closest builds above `until` come from an ascending scan.
                let sql = format!(
                    "SELECT {BUILD_COLUMNS} FROM builds WHERE job_id = ? AND id > ? ORDER BY id ASC LIMIT ?"
                );
                let mut rows = sqlx::query(&sql)
                    .bind(job_id)
                    .bind(until)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?;
                rows.reverse();
                rows
            }
            (Some(since), until) => {
                let sql = format!(
                    "SELECT {BUILD_COLUMNS} FROM builds WHERE job_id = ? AND id < ? AND id > ? ORDER BY id DESC LIMIT ?"
                );
                sqlx::query(&sql)
                    .bind(job_id)
                    .bind(since)
                    .bind(until.unwrap_or(0))
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
            (None, None) => {
                let sql = format!(
                    "SELECT {BUILD_COLUMNS} FROM builds WHERE job_id = ? ORDER BY id DESC LIMIT ?"
                );
                sqlx::query(&sql)
                    .bind(job_id)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(Self::row_to_build).collect()
    }

    async fn latest_succeeded_build_ids(&self, job_id: i64, limit: u32) -> DbResult<Vec<i64>> {
        let rows = sqlx::query(
            r#"
            SELECT id FROM builds
            WHERE job_id = ? AND status = 'succeeded'
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(job_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("id")).collect())
    }

    async fn delete_build_events(&self, build_ids: &[i64]) -> DbResult<u64> {
        if build_ids.is_empty() {
            return Ok(0);
        }

        let ids = ids_json(build_ids)?;
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            "DELETE FROM build_events WHERE build_id IN (SELECT value FROM json_each(?))",
        )
        .bind(&ids)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE builds SET reap_time = ? WHERE id IN (SELECT value FROM json_each(?))")
            .bind(Utc::now())
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted.rows_affected())
    }

    async fn mark_non_interceptible(&self) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE builds SET interceptible = 0
            WHERE interceptible = 1
              AND status NOT IN ('pending', 'started')
              AND (
                job_id IS NULL
                OR status = 'succeeded'
                OR id < (SELECT MAX(l.id) FROM builds l WHERE l.job_id = builds.job_id)
              )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
