use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde_json::{Value, json};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    application::services::step_runtime::{StepRuntime, StepRuntimeFactory},
    infrastructure::repositories::postgres::PgPool,
};

/// Journals step outputs and sleep wake times per run in `workflow_steps`.
///
/// A run that is delivered again with the same id replays completed steps from the
/// journal and resumes pending sleeps at their original wake time.
pub struct PostgresStepRuntime {
    pool: PgPool,
    run_id: Uuid,
}

impl PostgresStepRuntime {
    pub fn new(pool: PgPool, run_id: Uuid) -> Self {
        Self { pool, run_id }
    }

    async fn load(&self, name: &str) -> anyhow::Result<Option<Value>> {
        let output = sqlx::query_scalar::<_, Value>(
            r#"SELECT output FROM workflow_steps WHERE run_id = $1 AND step_name = $2"#,
        )
        .bind(self.run_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to load step {name}"))?;
        Ok(output)
    }

    async fn store(&self, name: &str, output: &Value) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workflow_steps (run_id, step_name, output, completed_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (run_id, step_name) DO NOTHING
            "#,
        )
        .bind(self.run_id)
        .bind(name)
        .bind(output)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to store step {name}"))?;
        Ok(())
    }
}

#[async_trait]
impl StepRuntime for PostgresStepRuntime {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn run_raw(
        &self,
        name: &str,
        step: BoxFuture<'_, anyhow::Result<Value>>,
    ) -> anyhow::Result<Value> {
        if let Some(output) = self.load(name).await? {
            debug!(run_id = %self.run_id, step = name, "replaying journaled step");
            return Ok(output);
        }

        let output = step.await?;
        self.store(name, &output).await?;
        Ok(output)
    }

    async fn sleep_until(&self, name: &str, wake_at: DateTime<Utc>) -> anyhow::Result<()> {
        let key = format!("sleep:{name}");
        let wake_at = match self.load(&key).await? {
            Some(recorded) => serde_json::from_value::<DateTime<Utc>>(recorded["wake_at"].clone())
                .context("journaled sleep has no wake time")?,
            None => {
                self.store(&key, &json!({ "wake_at": wake_at })).await?;
                wake_at
            }
        };

        let remaining = wake_at - Utc::now();
        if let Ok(duration) = remaining.to_std() {
            info!(run_id = %self.run_id, step = name, %wake_at, "sleeping");
            tokio::time::sleep(duration).await;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PostgresStepRuntimeFactory {
    pool: PgPool,
}

impl PostgresStepRuntimeFactory {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

impl StepRuntimeFactory for PostgresStepRuntimeFactory {
    fn create(&self, run_id: Uuid) -> Arc<dyn StepRuntime> {
        Arc::new(PostgresStepRuntime::new(self.pool.clone(), run_id))
    }
}
