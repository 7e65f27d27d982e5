use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::domain::{
    models::{CommunicationJourney, JourneyType, SmsStatus, Subscriber},
    repositories::{
        CommunicationJourneyRepository, RecipientQuery, RecipientRepository, SubscriberRepository,
        WelcomeState,
    },
};

pub type PgPool = Pool<Postgres>;

#[derive(Clone)]
pub struct PostgresSubscriberRepository {
    pool: PgPool,
}

impl PostgresSubscriberRepository {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl RecipientRepository for PostgresSubscriberRepository {
    async fn fetch_phone_numbers(&self, query: &RecipientQuery) -> anyhow::Result<Vec<String>> {
        let statuses: Vec<String> = SmsStatus::reachable(query.include_pending_double_opt_in)
            .iter()
            .map(|status| status.as_str().to_string())
            .collect();

        let mut builder = QueryBuilder::<Postgres>::new(
            r#"
            SELECT s.phone_number
            FROM subscribers s
            WHERE s.has_valid_phone_number = TRUE
              AND s.sms_status = ANY("#,
        );
        builder.push_bind(statuses);
        builder.push(
            r#")
              AND NOT EXISTS (
                SELECT 1 FROM communication_journeys j
                WHERE j.subscriber_id = s.id AND j.campaign_name = "#,
        );
        builder.push_bind(query.exclude_campaign.clone());
        builder.push(")");

        match query.welcome {
            WelcomeState::ReceivedAfter(since) => {
                builder.push(
                    r#"
              AND EXISTS (
                SELECT 1 FROM communication_journeys j
                WHERE j.subscriber_id = s.id AND j.journey_type = 'WELCOME_SMS' AND j.created_at > "#,
                );
                builder.push_bind(since);
                builder.push(")");
            }
            WelcomeState::NotReceivedSince(since) => {
                builder.push(
                    r#"
              AND NOT EXISTS (
                SELECT 1 FROM communication_journeys j
                WHERE j.subscriber_id = s.id AND j.journey_type = 'WELCOME_SMS' AND j.created_at >= "#,
                );
                builder.push_bind(since);
                builder.push(")");
            }
        }

        if let Some(country_code) = &query.filter.country_code {
            builder
                .push(" AND lower(s.country_code) = lower(")
                .push_bind(country_code.clone())
                .push(")");
        }
        if let Some(area) = &query.filter.administrative_area {
            builder
                .push(" AND lower(s.administrative_area) = lower(")
                .push_bind(area.clone())
                .push(")");
        }
        if let Some(phone_numbers) = &query.filter.phone_numbers {
            builder
                .push(" AND s.phone_number = ANY(")
                .push_bind(phone_numbers.clone())
                .push(")");
        }

        builder.push(" GROUP BY s.phone_number ORDER BY s.phone_number ASC OFFSET ");
        builder.push_bind(i64::from(query.skip));
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let phone_numbers = builder
            .build_query_scalar::<String>()
            .fetch_all(&self.pool)
            .await?;
        Ok(phone_numbers)
    }
}

#[async_trait]
impl SubscriberRepository for PostgresSubscriberRepository {
    async fn find_by_phone_number(&self, phone_number: &str) -> anyhow::Result<Option<Subscriber>> {
        let record = sqlx::query_as::<_, SubscriberRecord>(
            r#"
            SELECT id, phone_number, sms_status, has_valid_phone_number, country_code,
                   administrative_area, updated_at
            FROM subscribers
            WHERE phone_number = $1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?;

        let Some(record) = record else {
            return Ok(None);
        };

        let journeys = sqlx::query_as::<_, JourneyRecord>(
            r#"
            SELECT journey_type, campaign_name, created_at
            FROM communication_journeys
            WHERE subscriber_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(record.id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(CommunicationJourney::try_from)
        .collect::<anyhow::Result<Vec<_>>>()?;

        record.into_subscriber(journeys).map(Some)
    }

    async fn update_sms_status(&self, phone_number: &str, status: SmsStatus) -> anyhow::Result<()> {
        sqlx::query(
            r#"UPDATE subscribers SET sms_status = $2, updated_at = $3 WHERE phone_number = $1"#,
        )
        .bind(phone_number)
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CommunicationJourneyRepository for PostgresSubscriberRepository {
    async fn record(
        &self,
        phone_number: &str,
        journey: CommunicationJourney,
    ) -> anyhow::Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO communication_journeys (id, subscriber_id, journey_type, campaign_name, created_at)
            SELECT $1, s.id, $3, $4, $5
            FROM subscribers s
            WHERE s.phone_number = $2
            ORDER BY s.updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(phone_number)
        .bind(journey.journey_type.as_str())
        .bind(&journey.campaign_name)
        .bind(journey.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("no subscriber owns phone number {phone_number}");
        }
        Ok(())
    }
}

#[derive(FromRow)]
struct SubscriberRecord {
    id: Uuid,
    phone_number: String,
    sms_status: String,
    has_valid_phone_number: bool,
    country_code: Option<String>,
    administrative_area: Option<String>,
    updated_at: DateTime<Utc>,
}

impl SubscriberRecord {
    fn into_subscriber(self, journeys: Vec<CommunicationJourney>) -> anyhow::Result<Subscriber> {
        let sms_status = SmsStatus::from_str(&self.sms_status)
            .ok_or_else(|| anyhow::anyhow!("unknown sms status {}", self.sms_status))?;
        Ok(Subscriber {
            phone_number: self.phone_number,
            sms_status,
            has_valid_phone_number: self.has_valid_phone_number,
            country_code: self.country_code,
            administrative_area: self.administrative_area,
            journeys,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct JourneyRecord {
    journey_type: String,
    campaign_name: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<JourneyRecord> for CommunicationJourney {
    type Error = anyhow::Error;

    fn try_from(value: JourneyRecord) -> Result<Self, Self::Error> {
        let journey_type = JourneyType::from_str(&value.journey_type)
            .ok_or_else(|| anyhow::anyhow!("unknown journey type {}", value.journey_type))?;
        Ok(Self {
            journey_type,
            campaign_name: value.campaign_name,
            created_at: value.created_at,
        })
    }
}
