use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

use crate::application::services::chunk_sender::ChunkSender;
use crate::domain::models::{EnqueueOutcome, RecipientPayload};

/// Durable execution capability a long-running workflow is written against.
///
/// Step outputs are memoized by name within a run, so a replayed workflow gets the
/// recorded result instead of redoing the side effect. Every name used in one run
/// must therefore be unique.
#[async_trait]
pub trait StepRuntime: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn run_raw(
        &self,
        name: &str,
        step: BoxFuture<'_, anyhow::Result<Value>>,
    ) -> anyhow::Result<Value>;

    /// Suspends the workflow until `wake_at`. Returns immediately when already past.
    async fn sleep_until(&self, name: &str, wake_at: DateTime<Utc>) -> anyhow::Result<()>;
}

pub async fn run_step<'a, T, F>(runtime: &dyn StepRuntime, name: &str, step: F) -> anyhow::Result<T>
where
    T: Serialize + DeserializeOwned + Send + 'a,
    F: Future<Output = anyhow::Result<T>> + Send + 'a,
{
    let value = runtime
        .run_raw(
            name,
            Box::pin(async move {
                let output = step.await?;
                Ok(serde_json::to_value(output)?)
            }),
        )
        .await?;
    Ok(serde_json::from_value(value)?)
}

/// Hands a chunk to the send operation as its own memoized step.
pub async fn invoke(
    runtime: &dyn StepRuntime,
    name: &str,
    sender: &dyn ChunkSender,
    chunk: &[RecipientPayload],
) -> anyhow::Result<EnqueueOutcome> {
    run_step(runtime, name, sender.send(chunk)).await
}

/// Opens the runtime a single workflow run executes in.
pub trait StepRuntimeFactory: Send + Sync {
    fn create(&self, run_id: Uuid) -> Arc<dyn StepRuntime>;
}
