//! Shared reference-data schema: exercise catalog available to all tenants.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::migrate::Migration;

pub(super) fn migrations() -> Vec<Arc<dyn Migration>> {
    vec![Arc::new(CreateExercises)]
}

struct CreateExercises;

#[async_trait]
impl Migration for CreateExercises {
    fn name(&self) -> &'static str {
        "m1717517000000_create_exercises"
    }

    async fn up(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS exercises (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                name VARCHAR(200) NOT NULL UNIQUE,
                category VARCHAR(100),
                muscle_groups JSONB,
                equipment JSONB,
                instructions TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_exercises_category ON exercises (category)")
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn down(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query("DROP TABLE IF EXISTS exercises")
            .execute(pool)
            .await?;
        Ok(())
    }
}
