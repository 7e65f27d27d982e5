use async_trait::async_trait;

use crate::domain::models::{EnqueueOutcome, RecipientPayload};

/// Queues a chunk of payloads with the carrier. Implementations own their retry and
/// rate-limit compliance with the underlying provider.
#[async_trait]
pub trait ChunkSender: Send + Sync {
    async fn send(&self, chunk: &[RecipientPayload]) -> anyhow::Result<EnqueueOutcome>;
}
