use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::{
    application::{
        handlers::bulk_sms_journey::{validate_request, wake_time},
        services::event_bus::BulkSmsBus,
    },
    domain::{
        errors::DomainError,
        events::{BulkSmsEvent, SleepTime},
        models::CampaignMessage,
    },
};

pub struct ScheduleBulkSmsConfig {
    pub max_attempts: u32,
}

pub struct ScheduleBulkSmsUseCase {
    bus: Arc<dyn BulkSmsBus>,
    config: ScheduleBulkSmsConfig,
}

pub struct ScheduleBulkSmsRequest {
    pub messages: Vec<CampaignMessage>,
    pub timezone: Option<i32>,
    pub send: bool,
    pub sleep_time: Option<SleepTime>,
    pub current_segments_in_queue: u64,
}

pub struct ScheduleBulkSmsResponse {
    pub event_id: Uuid,
}

impl ScheduleBulkSmsUseCase {
    pub fn new(bus: Arc<dyn BulkSmsBus>, config: ScheduleBulkSmsConfig) -> Self {
        Self { bus, config }
    }

    pub async fn execute(
        &self,
        request: ScheduleBulkSmsRequest,
    ) -> Result<ScheduleBulkSmsResponse, DomainError> {
        let scheduled_sleep = validate_request(
            &request.messages,
            request.timezone,
            request.sleep_time.as_ref(),
        )?;
        if let Some(delay) = scheduled_sleep {
            wake_time(Utc::now(), delay)?;
        }

        let event = BulkSmsEvent {
            event_id: Uuid::new_v4(),
            messages: request.messages,
            timezone: request.timezone,
            send: request.send,
            sleep_time: request.sleep_time,
            current_segments_in_queue: request.current_segments_in_queue,
            attempt: 1,
            max_attempts: self.config.max_attempts,
        };
        let event_id = event.event_id;

        self.bus.publish(event).await?;
        info!(%event_id, send = request.send, "scheduled bulk sms run");

        Ok(ScheduleBulkSmsResponse { event_id })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct RecordingBus {
        events: Mutex<Vec<BulkSmsEvent>>,
    }

    #[async_trait]
    impl BulkSmsBus for RecordingBus {
        async fn publish(&self, event: BulkSmsEvent) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    fn request(messages: Vec<CampaignMessage>) -> ScheduleBulkSmsRequest {
        ScheduleBulkSmsRequest {
            messages,
            timezone: None,
            send: true,
            sleep_time: None,
            current_segments_in_queue: 0,
        }
    }

    #[tokio::test]
    async fn publishes_first_attempt() {
        let bus = Arc::new(RecordingBus::default());
        let usecase = ScheduleBulkSmsUseCase::new(bus.clone(), ScheduleBulkSmsConfig { max_attempts: 2 });

        let response = usecase
            .execute(request(vec![CampaignMessage {
                sms_body: "Call your senator".into(),
                campaign_name: "senate-vote".into(),
                recipient_filter: Default::default(),
                media: None,
                include_pending_double_opt_in: false,
            }]))
            .await
            .expect("scheduled");

        let events = bus.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, response.event_id);
        assert_eq!(events[0].attempt, 1);
        assert_eq!(events[0].max_attempts, 2);
    }

    #[tokio::test]
    async fn rejects_empty_runs_without_publishing() {
        let bus = Arc::new(RecordingBus::default());
        let usecase = ScheduleBulkSmsUseCase::new(bus.clone(), ScheduleBulkSmsConfig { max_attempts: 2 });

        let error = usecase.execute(request(vec![])).await.err().expect("rejected");
        assert!(matches!(error, DomainError::Validation(_)));
        assert!(bus.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_bad_timezone_and_sleep_time_without_publishing() {
        let bus = Arc::new(RecordingBus::default());
        let usecase = ScheduleBulkSmsUseCase::new(bus.clone(), ScheduleBulkSmsConfig { max_attempts: 2 });
        let message = CampaignMessage {
            sms_body: "Call your senator".into(),
            campaign_name: "senate-vote".into(),
            recipient_filter: Default::default(),
            media: None,
            include_pending_double_opt_in: false,
        };

        let mut bad_timezone = request(vec![message.clone()]);
        bad_timezone.timezone = Some(30);
        let error = usecase.execute(bad_timezone).await.err().expect("rejected");
        assert!(matches!(error, DomainError::Validation(_)));

        let mut endless_sleep = request(vec![message]);
        endless_sleep.sleep_time = Some(SleepTime::Text("100000000y".into()));
        let error = usecase.execute(endless_sleep).await.err().expect("rejected");
        assert!(matches!(error, DomainError::Validation(_)));

        assert!(bus.events.lock().unwrap().is_empty());
    }
}
