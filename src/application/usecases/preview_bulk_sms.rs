use std::sync::Arc;

use uuid::Uuid;

use crate::{
    application::{
        handlers::bulk_sms_journey::{BulkSmsJourneyHandler, BulkSmsOutcome},
        services::step_runtime::StepRuntimeFactory,
    },
    domain::{
        errors::DomainError,
        events::BulkSmsEvent,
        models::{BulkSmsSummary, CampaignMessage},
    },
};

/// Runs the bulk journey in dry-run mode and returns its estimate.
pub struct PreviewBulkSmsUseCase {
    handler: Arc<BulkSmsJourneyHandler>,
    runtimes: Arc<dyn StepRuntimeFactory>,
}

impl PreviewBulkSmsUseCase {
    pub fn new(handler: Arc<BulkSmsJourneyHandler>, runtimes: Arc<dyn StepRuntimeFactory>) -> Self {
        Self { handler, runtimes }
    }

    pub async fn execute(
        &self,
        messages: Vec<CampaignMessage>,
        timezone: Option<i32>,
    ) -> Result<BulkSmsSummary, DomainError> {
        let event = BulkSmsEvent {
            event_id: Uuid::new_v4(),
            messages,
            timezone,
            send: false,
            sleep_time: None,
            current_segments_in_queue: 0,
            attempt: 1,
            max_attempts: 1,
        };
        let runtime = self.runtimes.create(event.event_id);

        match self.handler.handle(runtime.as_ref(), &event).await? {
            BulkSmsOutcome::Preview(summary) => Ok(summary),
            BulkSmsOutcome::Dispatched(_) => Err(DomainError::Other(anyhow::anyhow!(
                "dry run unexpectedly dispatched messages"
            ))),
        }
    }
}
