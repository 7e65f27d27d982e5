use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tracing::info;

use crate::{
    application::services::step_runtime::{StepRuntime, run_step},
    domain::{
        models::{CampaignMessage, JourneyType, PayloadMessage, RecipientPayload},
        repositories::{RecipientQuery, RecipientRepository, WelcomeState},
        value_objects::is_phone_number_supported,
    },
};

pub const BULK_WELCOME_MESSAGE: &str = "Thanks for joining our advocacy texts! Msg & data rates may apply. Msg frequency varies. Reply HELP for help, STOP to opt out.";

/// Campaign name of the marker recording that the welcome legalese was delivered.
pub const BULK_WELCOME_CAMPAIGN_NAME: &str = "bulk-welcome";

pub struct PayloadBuilderConfig {
    /// Page size of recipient lookups; `None` fetches everything in one page.
    pub query_limit: Option<u32>,
    /// Welcome messages sent before this instant went out from another number and
    /// must be repeated.
    pub short_code_go_live_date: DateTime<Utc>,
    pub welcome_message: String,
}

impl Default for PayloadBuilderConfig {
    fn default() -> Self {
        Self {
            query_limit: None,
            short_code_go_live_date: default_short_code_go_live_date(),
            welcome_message: BULK_WELCOME_MESSAGE.to_string(),
        }
    }
}

pub fn default_short_code_go_live_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 3, 12, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub struct BuildCampaignPayloadUseCase {
    recipients: Arc<dyn RecipientRepository>,
    config: PayloadBuilderConfig,
}

impl BuildCampaignPayloadUseCase {
    pub fn new(recipients: Arc<dyn RecipientRepository>, config: PayloadBuilderConfig) -> Self {
        Self { recipients, config }
    }

    /// Builds one payload per phone number. Recipients who already got the welcome
    /// legalese are collected first so they win when a number shows up in both groups.
    pub async fn execute(
        &self,
        runtime: &dyn StepRuntime,
        campaign_index: usize,
        campaign: &CampaignMessage,
    ) -> anyhow::Result<Vec<RecipientPayload>> {
        let mut payloads = Vec::new();

        for has_welcome_message in [true, false] {
            let phone_numbers = self
                .fetch_partition(runtime, campaign_index, campaign, has_welcome_message)
                .await?;

            info!(
                campaign = %campaign.campaign_name,
                has_welcome_message,
                phone_numbers = phone_numbers.len(),
                "fetched recipients"
            );

            payloads.extend(
                phone_numbers
                    .into_iter()
                    .map(|phone_number| self.payload_for(campaign, phone_number, has_welcome_message)),
            );
        }

        let mut seen = HashSet::new();
        payloads.retain(|payload| seen.insert(payload.phone_number.clone()));

        info!(
            campaign = %campaign.campaign_name,
            payloads = payloads.len(),
            "built campaign payloads"
        );
        Ok(payloads)
    }

    async fn fetch_partition(
        &self,
        runtime: &dyn StepRuntime,
        campaign_index: usize,
        campaign: &CampaignMessage,
        has_welcome_message: bool,
    ) -> anyhow::Result<Vec<String>> {
        let go_live = self.config.short_code_go_live_date;
        let welcome = if has_welcome_message {
            WelcomeState::ReceivedAfter(go_live)
        } else {
            WelcomeState::NotReceivedSince(go_live)
        };

        let mut phone_numbers = Vec::new();
        let mut seen = HashSet::new();
        let mut skip = 0u32;
        let mut page = 0usize;

        loop {
            let query = RecipientQuery {
                filter: campaign.recipient_filter.clone(),
                welcome,
                exclude_campaign: campaign.campaign_name.clone(),
                include_pending_double_opt_in: campaign.include_pending_double_opt_in,
                skip,
                limit: self.config.query_limit,
            };
            let step_name = format!(
                "campaign-{campaign_index}-fetching-phone-numbers-welcome-{has_welcome_message}-{page}"
            );
            let rows: Vec<String> = run_step(runtime, &step_name, async {
                self.recipients.fetch_phone_numbers(&query).await
            })
            .await?;

            let fetched = rows.len();
            skip += fetched as u32;
            page += 1;

            // Pages can overlap when the store changes between fetches.
            phone_numbers.extend(
                rows.into_iter()
                    .filter(|phone_number| is_phone_number_supported(phone_number))
                    .filter(|phone_number| seen.insert(phone_number.clone())),
            );

            match self.config.query_limit {
                Some(limit) if fetched as u32 >= limit && fetched > 0 => continue,
                _ => break,
            }
        }

        Ok(phone_numbers)
    }

    fn payload_for(
        &self,
        campaign: &CampaignMessage,
        phone_number: String,
        has_welcome_message: bool,
    ) -> RecipientPayload {
        let mut messages = Vec::with_capacity(2);
        let body = if has_welcome_message {
            campaign.sms_body.clone()
        } else {
            messages.push(PayloadMessage {
                body: None,
                campaign_name: BULK_WELCOME_CAMPAIGN_NAME.to_string(),
                journey_type: JourneyType::WelcomeSms,
                media: None,
            });
            // The leading space keeps a trailing link in the body clickable.
            format!("{} \n\n{}", campaign.sms_body, self.config.welcome_message)
        };

        messages.push(PayloadMessage {
            body: Some(body),
            campaign_name: campaign.campaign_name.clone(),
            journey_type: JourneyType::BulkSms,
            media: campaign.media.clone(),
        });

        RecipientPayload {
            phone_number,
            messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::infrastructure::runtime::in_memory::InMemoryStepRuntime;

    /// Serves canned pages per welcome partition and records the queries it saw.
    #[derive(Default)]
    struct PagedRecipients {
        welcomed: Vec<&'static str>,
        not_welcomed: Vec<&'static str>,
        fail: bool,
        queries: Mutex<Vec<(bool, u32, Option<u32>)>>,
    }

    #[async_trait]
    impl RecipientRepository for PagedRecipients {
        async fn fetch_phone_numbers(&self, query: &RecipientQuery) -> anyhow::Result<Vec<String>> {
            if self.fail {
                anyhow::bail!("connection reset");
            }
            let welcomed = matches!(query.welcome, WelcomeState::ReceivedAfter(_));
            self.queries
                .lock()
                .unwrap()
                .push((welcomed, query.skip, query.limit));
            let rows = if welcomed {
                &self.welcomed
            } else {
                &self.not_welcomed
            };
            Ok(rows
                .iter()
                .skip(query.skip as usize)
                .take(query.limit.map_or(usize::MAX, |limit| limit as usize))
                .map(|phone_number| phone_number.to_string())
                .collect())
        }
    }

    fn campaign() -> CampaignMessage {
        CampaignMessage {
            sms_body: "Call your senator".to_string(),
            campaign_name: "senate-vote".to_string(),
            recipient_filter: Default::default(),
            media: Some(vec!["https://example.com/card.png".to_string()]),
            include_pending_double_opt_in: false,
        }
    }

    fn builder(recipients: Arc<PagedRecipients>, query_limit: Option<u32>) -> BuildCampaignPayloadUseCase {
        BuildCampaignPayloadUseCase::new(
            recipients,
            PayloadBuilderConfig {
                query_limit,
                ..PayloadBuilderConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn pages_until_a_short_page() {
        let recipients = Arc::new(PagedRecipients {
            not_welcomed: vec!["+15555550101", "+15555550102", "+15555550103", "+15555550104"],
            ..Default::default()
        });
        let runtime = InMemoryStepRuntime::system();

        let payloads = builder(recipients.clone(), Some(2))
            .execute(&runtime, 3, &campaign())
            .await
            .unwrap();

        assert_eq!(payloads.len(), 4);
        assert_eq!(
            *recipients.queries.lock().unwrap(),
            vec![
                (true, 0, Some(2)),
                (false, 0, Some(2)),
                (false, 2, Some(2)),
                (false, 4, Some(2)),
            ]
        );
        assert_eq!(
            runtime.executed_steps(),
            vec![
                "campaign-3-fetching-phone-numbers-welcome-true-0",
                "campaign-3-fetching-phone-numbers-welcome-false-0",
                "campaign-3-fetching-phone-numbers-welcome-false-1",
                "campaign-3-fetching-phone-numbers-welcome-false-2",
            ]
        );
    }

    #[tokio::test]
    async fn unbounded_lookups_fetch_a_single_page() {
        let recipients = Arc::new(PagedRecipients {
            welcomed: vec!["+15555550101"],
            not_welcomed: vec!["+15555550102", "+15555550103"],
            ..Default::default()
        });
        let runtime = InMemoryStepRuntime::system();

        builder(recipients.clone(), None)
            .execute(&runtime, 0, &campaign())
            .await
            .unwrap();

        assert_eq!(recipients.queries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn keeps_media_on_the_bulk_message_only() {
        let recipients = Arc::new(PagedRecipients {
            not_welcomed: vec!["+15555550102"],
            ..Default::default()
        });
        let runtime = InMemoryStepRuntime::system();

        let payloads = builder(recipients, None)
            .execute(&runtime, 0, &campaign())
            .await
            .unwrap();

        let messages = &payloads[0].messages;
        assert_eq!(messages[0].media, None);
        assert_eq!(
            messages[1].media,
            Some(vec!["https://example.com/card.png".to_string()])
        );
    }

    #[tokio::test]
    async fn a_failed_page_aborts_the_campaign() {
        let recipients = Arc::new(PagedRecipients {
            fail: true,
            ..Default::default()
        });
        let runtime = InMemoryStepRuntime::system();

        let result = builder(recipients, Some(10))
            .execute(&runtime, 0, &campaign())
            .await;

        assert!(result.is_err());
        assert!(runtime.executed_steps().is_empty());
    }
}
