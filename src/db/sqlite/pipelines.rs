use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::{
    db::{error::DbResult, repos::PipelineRepo},
    models::{Job, JobRetention, Pipeline},
};

pub struct SqlitePipelineRepo {
    pool: SqlitePool,
}

impl SqlitePipelineRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Retention columns are stored as signed integers; negative values mean unset.
fn retention_value(row: &sqlx::sqlite::SqliteRow, column: &str) -> u32 {
    u32::try_from(row.get::<i64, _>(column)).unwrap_or(0)
}

#[async_trait]
impl PipelineRepo for SqlitePipelineRepo {
    async fn unpaused_pipelines(&self) -> DbResult<Vec<Pipeline>> {
        let rows = sqlx::query("SELECT id, name, paused FROM pipelines WHERE paused = 0 ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| Pipeline {
                id: row.get("id"),
                name: row.get("name"),
                paused: row.get("paused"),
            })
            .collect())
    }

    async fn jobs(&self, pipeline_id: i64) -> DbResult<Vec<Job>> {
        let rows = sqlx::query(
            r#"
            SELECT id, pipeline_id, name, first_logged_build_id,
                   builds_to_retain, days_to_retain, min_succeeded_builds
            FROM jobs
            WHERE pipeline_id = ?
            ORDER BY id
            "#,
        )
        .bind(pipeline_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Job {
                id: row.get("id"),
                pipeline_id: row.get("pipeline_id"),
                name: row.get("name"),
                first_logged_build_id: row.get("first_logged_build_id"),
                retention: JobRetention {
                    builds: retention_value(row, "builds_to_retain"),
                    days: retention_value(row, "days_to_retain"),
                    min_succeeded_builds: retention_value(row, "min_succeeded_builds"),
                },
            })
            .collect())
    }

    async fn update_first_logged_build_id(&self, job_id: i64, build_id: i64) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET first_logged_build_id = ? WHERE id = ? AND first_logged_build_id < ?",
        )
        .bind(build_id)
        .bind(job_id)
        .bind(build_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
