use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use super::common::{handles_json, parse_column};
use crate::{
    db::{
        error::DbResult,
        repos::{HandleRepo, VolumeRepo},
    },
    models::{OrphanedVolumes, Transition, Volume},
};

pub struct SqliteVolumeRepo {
    pool: SqlitePool,
}

impl SqliteVolumeRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HandleRepo for SqliteVolumeRepo {
    async fn destroy_unknown(&self, worker_name: &str, live_handles: &[String]) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM volumes
            WHERE worker_name = ?
              AND state = 'destroying'
              AND handle NOT IN (SELECT value FROM json_each(?))
            "#,
        )
        .bind(worker_name)
        .bind(handles_json(live_handles)?)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn update_missing_since(
        &self,
        worker_name: &str,
        live_handles: &[String],
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let handles = handles_json(live_handles)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE volumes
            SET missing_since = NULL
            WHERE worker_name = ?
              AND missing_since IS NOT NULL
              AND handle IN (SELECT value FROM json_each(?))
            "#,
        )
        .bind(worker_name)
        .bind(&handles)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE volumes
            SET missing_since = ?
            WHERE worker_name = ?
              AND missing_since IS NULL
              AND state IN ('creating', 'created')
              AND handle NOT IN (SELECT value FROM json_each(?))
            "#,
        )
        .bind(now)
        .bind(worker_name)
        .bind(&handles)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn remove_missing(&self, missing_before: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM volumes
            WHERE missing_since IS NOT NULL
              AND missing_since < ?
              AND state IN ('creating', 'created')
              AND worker_name IN (SELECT name FROM workers WHERE state <> 'stalled')
            "#,
        )
        .bind(missing_before)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find_destroying(&self, worker_name: &str) -> DbResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT handle FROM volumes WHERE worker_name = ? AND state = 'destroying' ORDER BY id",
        )
        .bind(worker_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("handle")).collect())
    }

    async fn register_unknown(&self, worker_name: &str, live_handles: &[String]) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO volumes (handle, worker_name, state)
            SELECT value, ?, 'destroying' FROM json_each(?)
            "#,
        )
        .bind(worker_name)
        .bind(handles_json(live_handles)?)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl VolumeRepo for SqliteVolumeRepo {
    async fn find_orphaned(&self) -> DbResult<OrphanedVolumes> {
        let rows = sqlx::query(
            r#"
            SELECT v.id, v.handle, v.worker_name, v.state
            FROM volumes v
            JOIN workers w ON w.name = v.worker_name
            WHERE v.state IN ('creating', 'created', 'destroying')
              AND v.container_id IS NULL
              AND v.resource_cache_id IS NULL
              AND w.state IN ('running', 'landing', 'retiring')
              AND NOT EXISTS (SELECT 1 FROM volumes child WHERE child.parent_id = v.id)
            ORDER BY v.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let volumes = rows
            .iter()
            .map(|row| {
                Ok(Volume {
                    id: row.get("id"),
                    handle: row.get("handle"),
                    worker_name: row.get("worker_name"),
                    state: parse_column(&row.get::<String, _>("state"))?,
                })
            })
            .collect::<DbResult<Vec<_>>>()?;

        Ok(OrphanedVolumes::partition(volumes))
    }

    async fn destroy_failed(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM volumes WHERE state = 'failed'")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn mark_destroying(&self, id: i64) -> DbResult<Transition> {
        // A child created after the orphan scan still pins its parent.
        let result = sqlx::query(
            r#"
            UPDATE volumes SET state = 'destroying'
            WHERE id = ?
              AND state = 'created'
              AND NOT EXISTS (SELECT 1 FROM volumes child WHERE child.parent_id = volumes.id)
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(Transition::Transitioned);
        }

        let exists = sqlx::query("SELECT 1 FROM volumes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match exists {
            Some(_) => Transition::AlreadyTransitioned,
            None => Transition::NotFound,
        })
    }
}
