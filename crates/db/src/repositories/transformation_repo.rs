//! Repository for the `transformations` table.

use sqlx::{PgPool, Postgres, Transaction};
use weave_core::mapping::PlannedTransformation;
use weave_core::types::DbId;

use crate::models::transformation::Transformation;

const COLUMNS: &str =
    "id, integration_id, position, source_field, dest_field, kind, config, created_at";

/// Provides access to an integration's ordered transformation rules.
pub struct TransformationRepo;

impl TransformationRepo {
    /// Replace the whole rule set for an integration inside the given
    /// transaction. A mapping re-run must never accumulate duplicates.
    pub async fn replace_all(
        tx: &mut Transaction<'_, Postgres>,
        integration_id: DbId,
        transformations: &[PlannedTransformation],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM transformations WHERE integration_id = $1")
            .bind(integration_id)
            .execute(&mut **tx)
            .await?;

        for (position, t) in transformations.iter().enumerate() {
            sqlx::query(
                "INSERT INTO transformations \
                 (integration_id, position, source_field, dest_field, kind, config) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(integration_id)
            .bind(position as i32)
            .bind(&t.source_field)
            .bind(&t.dest_field)
            .bind(t.kind.as_str())
            .bind(&t.config)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// The ordered rule set for an integration.
    pub async fn list_by_integration(
        pool: &PgPool,
        integration_id: DbId,
    ) -> Result<Vec<Transformation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM transformations \
             WHERE integration_id = $1 ORDER BY position"
        );
        sqlx::query_as::<_, Transformation>(&query)
            .bind(integration_id)
            .fetch_all(pool)
            .await
    }
}
