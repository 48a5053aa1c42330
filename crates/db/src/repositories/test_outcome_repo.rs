//! Repository for the `test_outcomes` table.

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use weave_core::types::DbId;

use crate::models::test_outcome::{NewTestOutcome, TestOutcome};

const COLUMNS: &str = "\
    id, integration_id, run_id, endpoint, method, status_code, \
    latency_ms, success, classification, created_at";

/// Provides append and windowed reads over synthetic call outcomes.
pub struct TestOutcomeRepo;

impl TestOutcomeRepo {
    /// Append a batch of outcomes for one run inside the given
    /// transaction.
    pub async fn insert_batch(
        tx: &mut Transaction<'_, Postgres>,
        integration_id: DbId,
        run_id: Uuid,
        outcomes: &[NewTestOutcome],
    ) -> Result<(), sqlx::Error> {
        for o in outcomes {
            sqlx::query(
                "INSERT INTO test_outcomes \
                 (integration_id, run_id, endpoint, method, status_code, \
                  latency_ms, success, classification) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(integration_id)
            .bind(run_id)
            .bind(&o.endpoint)
            .bind(&o.method)
            .bind(o.status_code)
            .bind(o.latency_ms)
            .bind(o.success)
            .bind(&o.classification)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// All outcomes of one run, oldest first.
    pub async fn list_by_run(
        pool: &PgPool,
        integration_id: DbId,
        run_id: Uuid,
    ) -> Result<Vec<TestOutcome>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM test_outcomes \
             WHERE integration_id = $1 AND run_id = $2 ORDER BY id"
        );
        sqlx::query_as::<_, TestOutcome>(&query)
            .bind(integration_id)
            .bind(run_id)
            .fetch_all(pool)
            .await
    }

    /// The most recent `limit` outcomes for an integration, newest
    /// first. This is the rolling window the monitor and the healing
    /// diagnoser read.
    pub async fn recent(
        pool: &PgPool,
        integration_id: DbId,
        limit: i64,
    ) -> Result<Vec<TestOutcome>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM test_outcomes \
             WHERE integration_id = $1 ORDER BY id DESC LIMIT $2"
        );
        sqlx::query_as::<_, TestOutcome>(&query)
            .bind(integration_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
