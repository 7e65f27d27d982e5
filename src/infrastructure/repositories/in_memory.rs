use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::{
    models::{CommunicationJourney, JourneyType, RecipientFilter, SmsStatus, Subscriber},
    repositories::{
        CommunicationJourneyRepository, RecipientQuery, RecipientRepository, SubscriberRepository,
        WelcomeState,
    },
};

/// Subscribers and their journeys kept in process memory.
#[derive(Default, Clone)]
pub struct InMemorySubscriberStore {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
}

impl InMemorySubscriberStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, subscriber: Subscriber) {
        self.subscribers.write().await.push(subscriber);
    }

    pub async fn all(&self) -> Vec<Subscriber> {
        self.subscribers.read().await.clone()
    }
}

fn matches_filter(subscriber: &Subscriber, filter: &RecipientFilter) -> bool {
    let same = |wanted: &Option<String>, actual: &Option<String>| match wanted {
        Some(wanted) => actual
            .as_deref()
            .is_some_and(|actual| actual.eq_ignore_ascii_case(wanted)),
        None => true,
    };

    same(&filter.country_code, &subscriber.country_code)
        && same(&filter.administrative_area, &subscriber.administrative_area)
        && filter
            .phone_numbers
            .as_ref()
            .is_none_or(|numbers| numbers.contains(&subscriber.phone_number))
}

fn matches_query(subscriber: &Subscriber, query: &RecipientQuery) -> bool {
    let reachable = SmsStatus::reachable(query.include_pending_double_opt_in);
    let journeys = &subscriber.journeys;

    let welcome = match query.welcome {
        WelcomeState::ReceivedAfter(since) => journeys
            .iter()
            .any(|j| j.journey_type == JourneyType::WelcomeSms && j.created_at > since),
        WelcomeState::NotReceivedSince(since) => journeys
            .iter()
            .all(|j| j.journey_type != JourneyType::WelcomeSms || j.created_at < since),
    };

    subscriber.has_valid_phone_number
        && reachable.contains(&subscriber.sms_status)
        && journeys
            .iter()
            .all(|j| j.campaign_name != query.exclude_campaign)
        && welcome
        && matches_filter(subscriber, &query.filter)
}

#[async_trait]
impl RecipientRepository for InMemorySubscriberStore {
    async fn fetch_phone_numbers(&self, query: &RecipientQuery) -> anyhow::Result<Vec<String>> {
        let subscribers = self.subscribers.read().await;
        let phone_numbers: BTreeSet<&str> = subscribers
            .iter()
            .filter(|subscriber| matches_query(subscriber, query))
            .map(|subscriber| subscriber.phone_number.as_str())
            .collect();

        let page = phone_numbers
            .into_iter()
            .skip(query.skip as usize)
            .take(query.limit.map_or(usize::MAX, |limit| limit as usize))
            .map(str::to_string)
            .collect();
        Ok(page)
    }
}

#[async_trait]
impl SubscriberRepository for InMemorySubscriberStore {
    async fn find_by_phone_number(&self, phone_number: &str) -> anyhow::Result<Option<Subscriber>> {
        let subscribers = self.subscribers.read().await;
        Ok(subscribers
            .iter()
            .filter(|subscriber| subscriber.phone_number == phone_number)
            .max_by_key(|subscriber| subscriber.updated_at)
            .cloned())
    }

    async fn update_sms_status(&self, phone_number: &str, status: SmsStatus) -> anyhow::Result<()> {
        let mut subscribers = self.subscribers.write().await;
        for subscriber in subscribers
            .iter_mut()
            .filter(|subscriber| subscriber.phone_number == phone_number)
        {
            subscriber.sms_status = status;
            subscriber.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl CommunicationJourneyRepository for InMemorySubscriberStore {
    async fn record(
        &self,
        phone_number: &str,
        journey: CommunicationJourney,
    ) -> anyhow::Result<()> {
        let mut subscribers = self.subscribers.write().await;
        let subscriber = subscribers
            .iter_mut()
            .filter(|subscriber| subscriber.phone_number == phone_number)
            .max_by_key(|subscriber| subscriber.updated_at)
            .ok_or_else(|| anyhow::anyhow!("no subscriber owns phone number {phone_number}"))?;
        subscriber.journeys.push(journey);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta, TimeZone};

    use super::*;

    fn go_live() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 3, 12, 0, 0).unwrap()
    }

    fn subscriber(phone_number: &str, status: SmsStatus, journeys: Vec<CommunicationJourney>) -> Subscriber {
        Subscriber {
            phone_number: phone_number.to_string(),
            sms_status: status,
            has_valid_phone_number: true,
            country_code: Some("US".to_string()),
            administrative_area: None,
            journeys,
            updated_at: Utc::now(),
        }
    }

    fn journey(journey_type: JourneyType, campaign_name: &str, created_at: DateTime<Utc>) -> CommunicationJourney {
        CommunicationJourney {
            journey_type,
            campaign_name: campaign_name.to_string(),
            created_at,
        }
    }

    fn query(welcome: WelcomeState) -> RecipientQuery {
        RecipientQuery {
            filter: RecipientFilter::default(),
            welcome,
            exclude_campaign: "senate-vote".to_string(),
            include_pending_double_opt_in: false,
            skip: 0,
            limit: None,
        }
    }

    #[tokio::test]
    async fn partitions_by_welcome_history() {
        let store = InMemorySubscriberStore::new();
        let after = go_live() + TimeDelta::days(1);
        let before = go_live() - TimeDelta::days(1);
        store
            .insert(subscriber(
                "+15555550101",
                SmsStatus::OptedIn,
                vec![journey(JourneyType::WelcomeSms, "welcome", after)],
            ))
            .await;
        store
            .insert(subscriber(
                "+15555550102",
                SmsStatus::OptedIn,
                vec![journey(JourneyType::WelcomeSms, "welcome", before)],
            ))
            .await;
        store
            .insert(subscriber("+15555550103", SmsStatus::OptedInHasReplied, vec![]))
            .await;

        let welcomed = store
            .fetch_phone_numbers(&query(WelcomeState::ReceivedAfter(go_live())))
            .await
            .unwrap();
        let not_welcomed = store
            .fetch_phone_numbers(&query(WelcomeState::NotReceivedSince(go_live())))
            .await
            .unwrap();

        assert_eq!(welcomed, vec!["+15555550101"]);
        assert_eq!(not_welcomed, vec!["+15555550102", "+15555550103"]);
    }

    #[tokio::test]
    async fn skips_opted_out_pending_and_already_messaged() {
        let store = InMemorySubscriberStore::new();
        store
            .insert(subscriber("+15555550101", SmsStatus::OptedOut, vec![]))
            .await;
        store
            .insert(subscriber("+15555550102", SmsStatus::OptedInPendingDoubleOptIn, vec![]))
            .await;
        store
            .insert(subscriber(
                "+15555550103",
                SmsStatus::OptedIn,
                vec![journey(JourneyType::BulkSms, "senate-vote", Utc::now())],
            ))
            .await;

        let mut pending = query(WelcomeState::NotReceivedSince(go_live()));
        assert!(store.fetch_phone_numbers(&pending).await.unwrap().is_empty());

        pending.include_pending_double_opt_in = true;
        assert_eq!(
            store.fetch_phone_numbers(&pending).await.unwrap(),
            vec!["+15555550102"]
        );
    }

    #[tokio::test]
    async fn pages_distinct_sorted_numbers() {
        let store = InMemorySubscriberStore::new();
        for phone_number in ["+15555550103", "+15555550101", "+15555550102", "+15555550101"] {
            store
                .insert(subscriber(phone_number, SmsStatus::OptedIn, vec![]))
                .await;
        }

        let mut paged = query(WelcomeState::NotReceivedSince(go_live()));
        paged.limit = Some(2);
        assert_eq!(
            store.fetch_phone_numbers(&paged).await.unwrap(),
            vec!["+15555550101", "+15555550102"]
        );
        paged.skip = 2;
        assert_eq!(
            store.fetch_phone_numbers(&paged).await.unwrap(),
            vec!["+15555550103"]
        );
    }
}
