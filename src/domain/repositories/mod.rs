use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::models::{CommunicationJourney, RecipientFilter, SmsStatus, Subscriber};

/// Which side of the welcome legalese a recipient is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WelcomeState {
    /// Received a welcome message after the given instant.
    ReceivedAfter(DateTime<Utc>),
    /// Every welcome message, if any, predates the given instant.
    NotReceivedSince(DateTime<Utc>),
}

#[derive(Debug, Clone)]
pub struct RecipientQuery {
    pub filter: RecipientFilter,
    pub welcome: WelcomeState,
    /// Recipients that already have a journey for this campaign are skipped.
    pub exclude_campaign: String,
    pub include_pending_double_opt_in: bool,
    pub skip: u32,
    pub limit: Option<u32>,
}

#[async_trait]
pub trait RecipientRepository: Send + Sync {
    /// Distinct phone numbers matching the query, ordered ascending.
    async fn fetch_phone_numbers(&self, query: &RecipientQuery) -> anyhow::Result<Vec<String>>;
}

#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    /// Most recently updated subscriber owning the number.
    async fn find_by_phone_number(&self, phone_number: &str) -> anyhow::Result<Option<Subscriber>>;
    async fn update_sms_status(&self, phone_number: &str, status: SmsStatus) -> anyhow::Result<()>;
}

#[async_trait]
pub trait CommunicationJourneyRepository: Send + Sync {
    async fn record(
        &self,
        phone_number: &str,
        journey: CommunicationJourney,
    ) -> anyhow::Result<()>;
}
