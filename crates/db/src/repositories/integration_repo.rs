//! Repository for the `integrations` table.
//!
//! Every step mutation is a guarded UPDATE conditioned on the expected
//! current status, so two writers can never race the same transition:
//! the loser's UPDATE matches zero rows and surfaces as a stale-state
//! error at the orchestrator boundary.

use sqlx::{PgPool, Postgres, Transaction};
use weave_core::mapping::PlannedTransformation;
use weave_core::status::IntegrationStatus;
use weave_core::types::DbId;

use crate::models::integration::{CreateIntegration, Integration};
use crate::models::test_outcome::NewTestOutcome;
use crate::repositories::{TestOutcomeRepo, TransformationRepo};

/// Column list for `integrations` queries.
const COLUMNS: &str = "\
    id, name, user_intent, status_id, \
    source_discovery, dest_discovery, source_spec, dest_spec, \
    mapping, health_score, deployment, error_log, paused_from, \
    created_at, updated_at";

/// Provides CRUD and guarded step persistence for integrations.
pub struct IntegrationRepo;

impl IntegrationRepo {
    /// Persist a new integration with its discovery picks. Starts in
    /// `DISCOVERING`.
    pub async fn create(
        pool: &PgPool,
        input: &CreateIntegration,
    ) -> Result<Integration, sqlx::Error> {
        let query = format!(
            "INSERT INTO integrations (name, user_intent, status_id, source_discovery, dest_discovery) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Integration>(&query)
            .bind(&input.name)
            .bind(&input.user_intent)
            .bind(IntegrationStatus::Discovering.id())
            .bind(serde_json::to_value(&input.source_discovery).unwrap_or_default())
            .bind(serde_json::to_value(&input.dest_discovery).unwrap_or_default())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<Integration>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM integrations WHERE id = $1");
        sqlx::query_as::<_, Integration>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Integration>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM integrations ORDER BY created_at DESC");
        sqlx::query_as::<_, Integration>(&query).fetch_all(pool).await
    }

    pub async fn list_by_status(
        pool: &PgPool,
        status: IntegrationStatus,
    ) -> Result<Vec<Integration>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM integrations WHERE status_id = $1 ORDER BY id");
        sqlx::query_as::<_, Integration>(&query)
            .bind(status.id())
            .fetch_all(pool)
            .await
    }

    /// Delete an integration. Child rows cascade via foreign keys.
    /// Returns whether a row was deleted.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM integrations WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Step persistence
    // -----------------------------------------------------------------------

    /// Ingest result: store both normalized specs and advance
    /// `DISCOVERING -> MAPPING`.
    ///
    /// Returns `None` if the row was not in the expected state (lost a
    /// race or was mutated concurrently).
    pub async fn store_specs(
        pool: &PgPool,
        id: DbId,
        source_spec: &serde_json::Value,
        dest_spec: &serde_json::Value,
    ) -> Result<Option<Integration>, sqlx::Error> {
        let query = format!(
            "UPDATE integrations \
             SET source_spec = $2, dest_spec = $3, status_id = $4, updated_at = NOW() \
             WHERE id = $1 AND status_id = $5 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Integration>(&query)
            .bind(id)
            .bind(source_spec)
            .bind(dest_spec)
            .bind(IntegrationStatus::Mapping.id())
            .bind(IntegrationStatus::Discovering.id())
            .fetch_optional(pool)
            .await
    }

    /// Mapping result: replace the transformation set and the mapping
    /// record atomically, advancing `MAPPING -> TESTING`.
    ///
    /// `expected` is the status the row must currently hold; a healing
    /// re-map passes the integration's live status instead of MAPPING.
    pub async fn store_mapping(
        pool: &PgPool,
        id: DbId,
        mapping: &serde_json::Value,
        transformations: &[PlannedTransformation],
        expected: IntegrationStatus,
        next: IntegrationStatus,
    ) -> Result<Option<Integration>, sqlx::Error> {
        let mut tx: Transaction<'_, Postgres> = pool.begin().await?;

        TransformationRepo::replace_all(&mut tx, id, transformations).await?;

        let query = format!(
            "UPDATE integrations \
             SET mapping = $2, status_id = $3, updated_at = NOW() \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Integration>(&query)
            .bind(id)
            .bind(mapping)
            .bind(next.id())
            .bind(expected.id())
            .fetch_optional(&mut *tx)
            .await?;

        if updated.is_some() {
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }
        Ok(updated)
    }

    /// Test result: append the outcome batch and store the health
    /// snapshot atomically. Advances `TESTING -> DEPLOYING` only when
    /// `advance` is set (score met the pass threshold).
    pub async fn store_test_run(
        pool: &PgPool,
        id: DbId,
        run_id: uuid::Uuid,
        outcomes: &[NewTestOutcome],
        health: &serde_json::Value,
        expected: IntegrationStatus,
        advance: bool,
    ) -> Result<Option<Integration>, sqlx::Error> {
        let mut tx: Transaction<'_, Postgres> = pool.begin().await?;

        TestOutcomeRepo::insert_batch(&mut tx, id, run_id, outcomes).await?;

        let next = if advance {
            IntegrationStatus::Deploying
        } else {
            expected
        };
        let query = format!(
            "UPDATE integrations \
             SET health_score = $2, status_id = $3, updated_at = NOW() \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Integration>(&query)
            .bind(id)
            .bind(health)
            .bind(next.id())
            .bind(expected.id())
            .fetch_optional(&mut *tx)
            .await?;

        if updated.is_some() {
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }
        Ok(updated)
    }

    /// Deployment result: store the deployment record and advance
    /// `DEPLOYING -> ACTIVE`. Never called on driver failure, so a
    /// failed deploy leaves the prior value untouched.
    pub async fn store_deployment(
        pool: &PgPool,
        id: DbId,
        deployment: &serde_json::Value,
    ) -> Result<Option<Integration>, sqlx::Error> {
        let query = format!(
            "UPDATE integrations \
             SET deployment = $2, status_id = $3, updated_at = NOW() \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Integration>(&query)
            .bind(id)
            .bind(deployment)
            .bind(IntegrationStatus::Active.id())
            .bind(IntegrationStatus::Deploying.id())
            .fetch_optional(pool)
            .await
    }

    /// Record the last fatal error for a step without advancing state.
    pub async fn set_error(
        pool: &PgPool,
        id: DbId,
        step: &str,
        message: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE integrations \
             SET error_log = error_log || jsonb_build_object($2::text, $3::text), \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(step)
        .bind(message)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Guarded status move with no payload (fail, heal fallback).
    pub async fn set_status(
        pool: &PgPool,
        id: DbId,
        from: IntegrationStatus,
        to: IntegrationStatus,
    ) -> Result<Option<Integration>, sqlx::Error> {
        let query = format!(
            "UPDATE integrations \
             SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Integration>(&query)
            .bind(id)
            .bind(to.id())
            .bind(from.id())
            .fetch_optional(pool)
            .await
    }

    /// Manual hold: remember the state being left so resume can
    /// restore it.
    pub async fn pause(
        pool: &PgPool,
        id: DbId,
        from: IntegrationStatus,
    ) -> Result<Option<Integration>, sqlx::Error> {
        let query = format!(
            "UPDATE integrations \
             SET status_id = $2, paused_from = $3, updated_at = NOW() \
             WHERE id = $1 AND status_id = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Integration>(&query)
            .bind(id)
            .bind(IntegrationStatus::Paused.id())
            .bind(from.id())
            .fetch_optional(pool)
            .await
    }

    /// Release a manual hold, restoring the remembered state.
    pub async fn resume(pool: &PgPool, id: DbId) -> Result<Option<Integration>, sqlx::Error> {
        let query = format!(
            "UPDATE integrations \
             SET status_id = COALESCE(paused_from, status_id), paused_from = NULL, \
                 updated_at = NOW() \
             WHERE id = $1 AND status_id = $2 AND paused_from IS NOT NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Integration>(&query)
            .bind(id)
            .bind(IntegrationStatus::Paused.id())
            .fetch_optional(pool)
            .await
    }

    /// Refresh stored specs in place without a lifecycle transition
    /// (healing schema-refresh on a live integration).
    pub async fn refresh_specs(
        pool: &PgPool,
        id: DbId,
        source_spec: &serde_json::Value,
        dest_spec: &serde_json::Value,
    ) -> Result<Option<Integration>, sqlx::Error> {
        let query = format!(
            "UPDATE integrations \
             SET source_spec = $2, dest_spec = $3, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Integration>(&query)
            .bind(id)
            .bind(source_spec)
            .bind(dest_spec)
            .fetch_optional(pool)
            .await
    }
}
