use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::db::{
    error::DbResult,
    repos::{VersionRepo, VersionScope},
};

pub struct SqliteVersionRepo {
    pool: SqlitePool,
}

impl SqliteVersionRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VersionRepo for SqliteVersionRepo {
    async fn scopes_exceeding(&self, keep: u32) -> DbResult<Vec<VersionScope>> {
        let rows = sqlx::query(
            r#"
            SELECT resource_config_id, COUNT(*) AS version_count
            FROM resource_config_versions
            WHERE check_order <> 0
            GROUP BY resource_config_id
            HAVING COUNT(*) > ?
            ORDER BY resource_config_id
            "#,
        )
        .bind(i64::from(keep))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| VersionScope {
                resource_config_id: row.get("resource_config_id"),
                version_count: row.get::<i64, _>("version_count").max(0) as u64,
            })
            .collect())
    }

    async fn prune_versions(&self, resource_config_id: i64, keep: u32) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM resource_config_versions
            WHERE resource_config_id = ?
              AND check_order <> 0
              AND id NOT IN (
                SELECT id FROM resource_config_versions
                WHERE resource_config_id = ? AND check_order <> 0
                ORDER BY check_order DESC
                LIMIT ?
              )
            "#,
        )
        .bind(resource_config_id)
        .bind(resource_config_id)
        .bind(i64::from(keep))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
