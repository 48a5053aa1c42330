//! Repository for the `healing_events` table.

use sqlx::PgPool;
use weave_core::types::DbId;

use crate::models::healing_event::{HealingEvent, NewHealingEvent};

const COLUMNS: &str = "\
    id, integration_id, trigger_reason, diagnosis, action, outcome, \
    attempt, detail, created_at";

/// Provides the append-only self-healing audit trail.
pub struct HealingEventRepo;

impl HealingEventRepo {
    /// Open a healing event in `pending` state.
    pub async fn open(
        pool: &PgPool,
        integration_id: DbId,
        event: &NewHealingEvent,
    ) -> Result<HealingEvent, sqlx::Error> {
        let query = format!(
            "INSERT INTO healing_events \
             (integration_id, trigger_reason, diagnosis, action, outcome, attempt, detail) \
             VALUES ($1, $2, $3, $4, 'pending', $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, HealingEvent>(&query)
            .bind(integration_id)
            .bind(&event.trigger_reason)
            .bind(&event.diagnosis)
            .bind(&event.action)
            .bind(event.attempt)
            .bind(&event.detail)
            .fetch_one(pool)
            .await
    }

    /// Record the final outcome of a healing event.
    pub async fn close(
        pool: &PgPool,
        event_id: DbId,
        outcome: &str,
        detail: Option<&serde_json::Value>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE healing_events \
             SET outcome = $2, detail = COALESCE($3, detail) \
             WHERE id = $1",
        )
        .bind(event_id)
        .bind(outcome)
        .bind(detail)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Audit trail for an integration, newest first.
    pub async fn list_by_integration(
        pool: &PgPool,
        integration_id: DbId,
    ) -> Result<Vec<HealingEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM healing_events \
             WHERE integration_id = $1 ORDER BY id DESC"
        );
        sqlx::query_as::<_, HealingEvent>(&query)
            .bind(integration_id)
            .fetch_all(pool)
            .await
    }

    /// Number of strategist attempts for one trigger reason within the
    /// recent window, used to enforce the attempt cap.
    pub async fn attempts_for_reason(
        pool: &PgPool,
        integration_id: DbId,
        trigger_reason: &str,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM healing_events \
             WHERE integration_id = $1 AND trigger_reason = $2 \
               AND created_at > NOW() - INTERVAL '1 hour'",
        )
        .bind(integration_id)
        .bind(trigger_reason)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// Whether the most recent event for this integration is still
    /// pending operator input.
    pub async fn latest(
        pool: &PgPool,
        integration_id: DbId,
    ) -> Result<Option<HealingEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM healing_events \
             WHERE integration_id = $1 ORDER BY id DESC LIMIT 1"
        );
        sqlx::query_as::<_, HealingEvent>(&query)
            .bind(integration_id)
            .fetch_optional(pool)
            .await
    }
}
