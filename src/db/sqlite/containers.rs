use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use super::common::{handles_json, parse_column};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::{ContainerRepo, HandleRepo},
    },
    models::{Container, ContainerState, OrphanedContainers, Transition},
};

pub struct SqliteContainerRepo {
    pool: SqlitePool,
}

impl SqliteContainerRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_container(row: &sqlx::sqlite::SqliteRow) -> DbResult<Container> {
        Ok(Container {
            id: row.get("id"),
            handle: row.get("handle"),
            worker_name: row.get("worker_name"),
            state: parse_column(&row.get::<String, _>("state"))?,
            last_hijack: row.get("last_hijack"),
        })
    }

    /// Conditional update shared by all transitions. A miss is resolved into
    /// AlreadyTransitioned or NotFound by re-reading the row.
    async fn transition(
        &self,
        id: i64,
        from: ContainerState,
        to: ContainerState,
    ) -> DbResult<Transition> {
        if !from.can_transition_to(to) {
            return Err(DbError::Validation(format!(
                "container cannot move from {} to {}",
                from, to
            )));
        }

        let result = sqlx::query("UPDATE containers SET state = ? WHERE id = ? AND state = ?")
            .bind(to.as_str())
            .bind(id)
            .bind(from.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            return Ok(Transition::Transitioned);
        }

        let exists = sqlx::query("SELECT 1 FROM containers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match exists {
            Some(_) => Transition::AlreadyTransitioned,
            None => Transition::NotFound,
        })
    }
}

#[async_trait]
impl HandleRepo for SqliteContainerRepo {
    async fn destroy_unknown(&self, worker_name: &str, live_handles: &[String]) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM containers
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
            UPDATE containers
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
            UPDATE containers
            SET missing_since = ?
            WHERE worker_name = ?
              AND missing_since IS NULL
              AND state IN ('creating', 'created', 'discontinued')
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
            DELETE FROM containers
            WHERE missing_since IS NOT NULL
              AND missing_since < ?
              AND state IN ('creating', 'created', 'discontinued')
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
            "SELECT handle FROM containers WHERE worker_name = ? AND state = 'destroying' ORDER BY id",
        )
        .bind(worker_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("handle")).collect())
    }

    async fn register_unknown(&self, worker_name: &str, live_handles: &[String]) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO containers (handle, worker_name, state)
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
impl ContainerRepo for SqliteContainerRepo {
    async fn find_orphaned(&self) -> DbResult<OrphanedContainers> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.handle, c.worker_name, c.state, c.last_hijack
            FROM containers c
            LEFT JOIN builds b ON b.id = c.build_id
            WHERE c.state IN ('creating', 'created', 'discontinued', 'destroying')
              AND c.check_session_id IS NULL
              AND c.image_check_container_id IS NULL
              AND c.image_get_container_id IS NULL
              AND (c.build_id IS NULL OR b.interceptible = 0)
            ORDER BY c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let containers = rows
            .iter()
            .map(Self::row_to_container)
            .collect::<DbResult<Vec<_>>>()?;

        Ok(OrphanedContainers::partition(containers))
    }

    async fn destroy_failed(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM containers WHERE state = 'failed'")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn mark_destroying(&self, id: i64, from: ContainerState) -> DbResult<Transition> {
        self.transition(id, from, ContainerState::Destroying).await
    }

    async fn mark_discontinued(&self, id: i64) -> DbResult<Transition> {
        self.transition(id, ContainerState::Created, ContainerState::Discontinued)
            .await
    }
}
