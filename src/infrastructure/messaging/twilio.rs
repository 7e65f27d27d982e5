use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    application::services::chunk_sender::ChunkSender,
    domain::{
        models::{CommunicationJourney, EnqueueOutcome, PayloadMessage, RecipientPayload, SegmentPolicy},
        repositories::CommunicationJourneyRepository,
    },
};

#[derive(Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub messaging_service_sid: String,
    pub base_url: String,
    /// Attempts per message when the API answers 429.
    pub max_rate_limit_attempts: u32,
    pub rate_limit_backoff: Duration,
}

pub struct TwilioChunkSender {
    http: Client,
    config: TwilioConfig,
    journeys: Arc<dyn CommunicationJourneyRepository>,
    segment_policy: SegmentPolicy,
}

enum SendFailure {
    RateLimited,
    Rejected(anyhow::Error),
}

impl TwilioChunkSender {
    pub fn new(
        config: TwilioConfig,
        journeys: Arc<dyn CommunicationJourneyRepository>,
        segment_policy: SegmentPolicy,
    ) -> anyhow::Result<Arc<dyn ChunkSender>> {
        let http = Client::builder()
            .user_agent("advocacy-messaging/twilio")
            .build()?;
        Ok(Arc::new(Self {
            http,
            config,
            journeys,
            segment_policy,
        }) as Arc<dyn ChunkSender>)
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.base_url, self.config.account_sid
        )
    }

    async fn create_message(
        &self,
        to: &str,
        message: &PayloadMessage,
        body: &str,
    ) -> Result<TwilioMessage, SendFailure> {
        let mut form = vec![
            ("To", to.to_string()),
            ("MessagingServiceSid", self.config.messaging_service_sid.clone()),
            ("Body", body.to_string()),
        ];
        for media in message.media.iter().flatten() {
            form.push(("MediaUrl", media.clone()));
        }

        let response = self
            .http
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|err| SendFailure::Rejected(err.into()))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(SendFailure::RateLimited),
            status if status.is_success() => response
                .json::<TwilioMessage>()
                .await
                .map_err(|err| SendFailure::Rejected(err.into())),
            status => {
                let error = response.json::<TwilioError>().await.ok();
                Err(SendFailure::Rejected(anyhow::anyhow!(
                    "twilio api returned {}: {}",
                    status,
                    error
                        .map(|error| format!("{} ({})", error.message, error.code.unwrap_or_default()))
                        .unwrap_or_else(|| "unknown error".to_string())
                )))
            }
        }
    }

    /// Sends one message, backing off while the API rate limits us. Returns the
    /// segments billed, or `None` when the message could not be queued.
    async fn send_message(&self, to: &str, message: &PayloadMessage, body: &str) -> Option<u64> {
        let mut backoff = self.config.rate_limit_backoff;
        for attempt in 1..=self.config.max_rate_limit_attempts.max(1) {
            match self.create_message(to, message, body).await {
                Ok(created) => {
                    debug!(sid = %created.sid, to, "queued message");
                    let segments = created
                        .num_segments
                        .as_deref()
                        .and_then(|value| value.parse::<u64>().ok())
                        .filter(|segments| *segments > 0)
                        .unwrap_or_else(|| self.segment_policy.segments_for(body));
                    return Some(segments);
                }
                Err(SendFailure::RateLimited) => {
                    warn!(to, attempt, backoff_ms = backoff.as_millis() as u64, "rate limited by twilio");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(SendFailure::Rejected(err)) => {
                    warn!(to, campaign = %message.campaign_name, "failed to queue message: {err:#}");
                    return None;
                }
            }
        }
        warn!(to, campaign = %message.campaign_name, "giving up after repeated rate limiting");
        None
    }

    /// The message already left, so a failed write must not fail the chunk and get it
    /// sent again on retry.
    async fn record_journey(&self, phone_number: &str, message: &PayloadMessage) {
        if let Err(err) = self
            .journeys
            .record(phone_number, journey_of(message))
            .await
        {
            warn!(
                phone_number,
                campaign = %message.campaign_name,
                "failed to record communication journey: {err:#}"
            );
        }
    }
}

#[async_trait]
impl ChunkSender for TwilioChunkSender {
    async fn send(&self, chunk: &[RecipientPayload]) -> anyhow::Result<EnqueueOutcome> {
        let mut outcome = EnqueueOutcome::default();

        for payload in chunk {
            let mut delivered = false;
            for message in &payload.messages {
                let Some(body) = message.body.as_deref() else {
                    continue;
                };
                let Some(segments) = self.send_message(&payload.phone_number, message, body).await
                else {
                    continue;
                };
                delivered = true;
                outcome.queued_messages += 1;
                outcome.segments_sent += segments;
                self.record_journey(&payload.phone_number, message).await;
            }

            // Markers only count once the message carrying their text went out.
            if delivered {
                for marker in payload.messages.iter().filter(|message| message.body.is_none()) {
                    self.record_journey(&payload.phone_number, marker).await;
                }
            }
        }

        Ok(outcome)
    }
}

fn journey_of(message: &PayloadMessage) -> CommunicationJourney {
    CommunicationJourney {
        journey_type: message.journey_type,
        campaign_name: message.campaign_name.clone(),
        created_at: Utc::now(),
    }
}

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: String,
    num_segments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwilioError {
    message: String,
    code: Option<i64>,
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::{
        application::services::step_runtime::invoke,
        domain::models::{JourneyType, SmsStatus, Subscriber},
        infrastructure::runtime::in_memory::InMemoryStepRuntime,
        infrastructure::repositories::in_memory::InMemorySubscriberStore,
    };

    const MESSAGES_PATH: &str = "/2010-04-01/Accounts/AC123/Messages.json";

    fn config(server: &MockServer) -> TwilioConfig {
        TwilioConfig {
            account_sid: "AC123".to_string(),
            auth_token: "secret".to_string(),
            messaging_service_sid: "MG123".to_string(),
            base_url: server.base_url(),
            max_rate_limit_attempts: 3,
            rate_limit_backoff: Duration::from_millis(1),
        }
    }

    async fn store_with(phone_numbers: &[&str]) -> Arc<InMemorySubscriberStore> {
        let store = Arc::new(InMemorySubscriberStore::new());
        for phone_number in phone_numbers {
            store
                .insert(Subscriber {
                    phone_number: phone_number.to_string(),
                    sms_status: SmsStatus::OptedIn,
                    has_valid_phone_number: true,
                    country_code: Some("US".to_string()),
                    administrative_area: None,
                    journeys: vec![],
                    updated_at: Utc::now(),
                })
                .await;
        }
        store
    }

    fn bulk(phone_number: &str, body: &str, with_welcome: bool) -> RecipientPayload {
        let mut messages = Vec::new();
        if with_welcome {
            messages.push(PayloadMessage {
                body: None,
                campaign_name: "bulk-welcome".to_string(),
                journey_type: JourneyType::WelcomeSms,
                media: None,
            });
        }
        messages.push(PayloadMessage {
            body: Some(body.to_string()),
            campaign_name: "senate-vote".to_string(),
            journey_type: JourneyType::BulkSms,
            media: None,
        });
        RecipientPayload {
            phone_number: phone_number.to_string(),
            messages,
        }
    }

    #[tokio::test]
    async fn queues_messages_and_records_journeys() {
        let server = MockServer::start();
        let created = server.mock(|when, then| {
            when.method(POST)
                .path(MESSAGES_PATH)
                .body_includes("MessagingServiceSid=MG123");
            then.status(201)
                .json_body(json!({"sid": "SM1", "num_segments": "2"}));
        });

        let store = store_with(&["+15555550101", "+15555550102"]).await;
        let sender =
            TwilioChunkSender::new(config(&server), store.clone(), SegmentPolicy::default())
                .expect("sender");

        let outcome = sender
            .send(&[
                bulk("+15555550101", "Call your senator", true),
                bulk("+15555550102", "Call your senator", false),
            ])
            .await
            .expect("send");

        assert_eq!(outcome.queued_messages, 2);
        assert_eq!(outcome.segments_sent, 4);
        assert_eq!(created.calls(), 2);

        let subscribers = store.all().await;
        let welcomed = &subscribers[0].journeys;
        assert_eq!(welcomed.len(), 2);
        assert!(
            welcomed
                .iter()
                .any(|journey| journey.journey_type == JourneyType::WelcomeSms)
        );
        assert_eq!(subscribers[1].journeys.len(), 1);
        assert_eq!(subscribers[1].journeys[0].campaign_name, "senate-vote");
    }

    #[tokio::test]
    async fn skips_rejected_recipients() {
        let server = MockServer::start();
        let rejected = server.mock(|when, then| {
            when.method(POST)
                .path(MESSAGES_PATH)
                .body_includes("To=%2B15555550101");
            then.status(400)
                .json_body(json!({"message": "unsubscribed recipient", "code": 21610}));
        });
        let created = server.mock(|when, then| {
            when.method(POST)
                .path(MESSAGES_PATH)
                .body_includes("To=%2B15555550102");
            then.status(201).json_body(json!({"sid": "SM2"}));
        });

        let store = store_with(&["+15555550101", "+15555550102"]).await;
        let sender =
            TwilioChunkSender::new(config(&server), store.clone(), SegmentPolicy::default())
                .expect("sender");

        let outcome = sender
            .send(&[
                bulk("+15555550101", "hello", true),
                bulk("+15555550102", "hello", true),
            ])
            .await
            .expect("send");

        assert_eq!(outcome.queued_messages, 1);
        // No num_segments in the response, so the body is counted locally.
        assert_eq!(outcome.segments_sent, 1);
        assert_eq!(rejected.calls(), 1);
        assert_eq!(created.calls(), 1);

        let subscribers = store.all().await;
        assert!(subscribers[0].journeys.is_empty());
        assert_eq!(subscribers[1].journeys.len(), 2);
    }

    #[tokio::test]
    async fn journey_write_failures_do_not_resend_the_chunk() {
        let server = MockServer::start();
        let created = server.mock(|when, then| {
            when.method(POST).path(MESSAGES_PATH);
            then.status(201).json_body(json!({"sid": "SM3", "num_segments": "1"}));
        });

        // The second recipient has no subscriber row to attach journeys to.
        let store = store_with(&["+15555550101"]).await;
        let sender =
            TwilioChunkSender::new(config(&server), store.clone(), SegmentPolicy::default())
                .expect("sender");
        let chunk = [
            bulk("+15555550101", "hello", false),
            bulk("+15555550102", "hello", false),
        ];

        let runtime = InMemoryStepRuntime::system();
        let first = invoke(&runtime, "enqueue-messages-1/1", sender.as_ref(), &chunk)
            .await
            .expect("chunk queued");
        let replayed = invoke(&runtime, "enqueue-messages-1/1", sender.as_ref(), &chunk)
            .await
            .expect("chunk replayed");

        assert_eq!(first.queued_messages, 2);
        assert_eq!(first, replayed);
        assert_eq!(created.calls(), 2);
        assert_eq!(store.all().await[0].journeys.len(), 1);
    }

    #[tokio::test]
    async fn gives_up_after_repeated_rate_limiting() {
        let server = MockServer::start();
        let limited = server.mock(|when, then| {
            when.method(POST).path(MESSAGES_PATH);
            then.status(429).body("too many requests");
        });

        let store = store_with(&["+15555550101"]).await;
        let sender =
            TwilioChunkSender::new(config(&server), store.clone(), SegmentPolicy::default())
                .expect("sender");

        let outcome = sender
            .send(&[bulk("+15555550101", "hello", false)])
            .await
            .expect("send");

        assert_eq!(outcome, EnqueueOutcome::default());
        assert_eq!(limited.calls(), 3);
        assert!(store.all().await[0].journeys.is_empty());
    }
}
