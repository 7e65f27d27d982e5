use async_trait::async_trait;

use crate::domain::events::BulkSmsEvent;

#[async_trait]
pub trait BulkSmsBus: Send + Sync {
    async fn publish(&self, event: BulkSmsEvent) -> anyhow::Result<()>;
}
