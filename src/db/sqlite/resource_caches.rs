use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::db::{error::DbResult, repos::ResourceCacheLifecycleRepo};

pub struct SqliteResourceCacheLifecycleRepo {
    pool: SqlitePool,
}

impl SqliteResourceCacheLifecycleRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceCacheLifecycleRepo for SqliteResourceCacheLifecycleRepo {
    async fn clean_build_image_caches(&self) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;

        // Owner FKs are ON DELETE SET NULL, so a use with neither owner left
        // belonged to a container or build that no longer exists.
        let ownerless = sqlx::query(
            "DELETE FROM resource_cache_uses WHERE build_id IS NULL AND container_id IS NULL",
        )
        .execute(&mut *tx)
        .await?;

        let superseded = sqlx::query(
            r#"
            DELETE FROM build_image_resource_caches
            WHERE build_id IN (
                SELECT b.id FROM builds b
                WHERE b.status NOT IN ('pending', 'started')
                  AND b.job_id IS NOT NULL
                  AND b.id < (
                    SELECT MAX(l.id) FROM builds l
                    WHERE l.job_id = b.job_id
                      AND l.status NOT IN ('pending', 'started')
                  )
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ownerless.rows_affected() + superseded.rows_affected())
    }

    async fn clean_uses_for_finished_builds(&self) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM resource_cache_uses
            WHERE build_id IN (
                SELECT b.id FROM builds b
                WHERE b.status NOT IN ('pending', 'started')
                  AND NOT (
                    b.status = 'failed'
                    AND b.job_id IS NOT NULL
                    AND b.id = (
                        SELECT MAX(l.id) FROM builds l
                        WHERE l.job_id = b.job_id
                          AND l.status NOT IN ('pending', 'started')
                    )
                  )
            )
            AND NOT EXISTS (
                SELECT 1 FROM build_image_resource_caches bi
                WHERE bi.build_id = resource_cache_uses.build_id
                  AND bi.resource_cache_id = resource_cache_uses.resource_cache_id
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn clean_unreferenced_caches(&self) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM resource_caches
            WHERE id NOT IN (SELECT resource_cache_id FROM resource_cache_uses)
              AND id NOT IN (SELECT resource_cache_id FROM build_image_resource_caches)
              AND id NOT IN (
                SELECT resource_cache_id FROM resource_configs
                WHERE resource_cache_id IS NOT NULL
              )
              AND NOT EXISTS (
                SELECT 1 FROM next_build_inputs nbi
                JOIN resources r ON r.id = nbi.resource_id
                WHERE r.resource_config_id = resource_caches.resource_config_id
                  AND nbi.version = resource_caches.version
              )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn clean_unreferenced_configs(&self) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM resource_configs
            WHERE id NOT IN (SELECT resource_config_id FROM resource_caches)
              AND id NOT IN (
                SELECT resource_config_id FROM resources
                WHERE active = 1 AND resource_config_id IS NOT NULL
              )
              AND id NOT IN (
                SELECT resource_config_id FROM resource_types
                WHERE active = 1 AND resource_config_id IS NOT NULL
              )
              AND id NOT IN (SELECT resource_config_id FROM resource_config_check_sessions)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn clean_expired_check_sessions(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM resource_config_check_sessions WHERE expires_at < ?")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn clean_inactive_check_sessions(&self) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM resource_config_check_sessions
            WHERE resource_config_id NOT IN (
                SELECT r.resource_config_id FROM resources r
                JOIN pipelines p ON p.id = r.pipeline_id
                WHERE r.active = 1 AND p.paused = 0 AND r.resource_config_id IS NOT NULL
                UNION
                SELECT t.resource_config_id FROM resource_types t
                JOIN pipelines p ON p.id = t.pipeline_id
                WHERE t.active = 1 AND p.paused = 0 AND t.resource_config_id IS NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
