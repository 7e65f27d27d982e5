use std::env::var;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;
use thiserror::Error;

use crate::{
    application::{
        handlers::bulk_sms_journey::{BulkSmsJourneyConfig, DeploymentEnvironment},
        services::candidate_matching::CandidateMatcherConfig,
        usecases::{
            build_campaign_payload::PayloadBuilderConfig, dispatch_chunks::DispatchConfig,
            handle_inbound_sms::InboundSmsConfig, schedule_bulk_sms::ScheduleBulkSmsConfig,
        },
    },
    domain::models::SegmentPolicy,
    infrastructure::messaging::{jetstream::JetstreamConfig, twilio::TwilioConfig},
};

const DEFAULT_TWILIO_RATE_LIMIT: usize = 100;
const DEFAULT_MIN_ENQUEUE_HOUR: u32 = 11;
const DEFAULT_MAX_ENQUEUE_HOUR: u32 = 22;
const NON_PRODUCTION_MESSAGE_CAP: u64 = 100;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("An error occured while getting {0} env param")]
    Missing(&'static str),
    #[error("An error occured while parsing {0} env param")]
    Invalid(&'static str),
}

pub struct Config {
    pub port: u16,
    pub scheme: String,
    pub host: String,
    pub database_url: String,
    pub dispatch: DispatchConfig,
    pub segment_policy: SegmentPolicy,
    pub payload_builder: PayloadBuilderConfig,
    pub journey: BulkSmsJourneyConfig,
    pub schedule: ScheduleBulkSmsConfig,
    pub twilio: TwilioConfig,
    pub jetstream: JetstreamConfig,
    pub inbound_sms: InboundSmsConfig,
    pub candidate_matcher: CandidateMatcherConfig,
}

impl Config {
    pub fn try_parse() -> Result<Config, ConfigError> {
        let _ = dotenv();
        Self::from_lookup(|key| var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let min_hour = env.parse_or("MIN_ENQUEUE_HOUR", DEFAULT_MIN_ENQUEUE_HOUR)?;
        let max_hour = env.parse_or("MAX_ENQUEUE_HOUR", DEFAULT_MAX_ENQUEUE_HOUR)?;
        if min_hour >= max_hour || max_hour > 24 {
            return Err(ConfigError::Invalid("MAX_ENQUEUE_HOUR"));
        }

        let segments_per_second: f64 = env.parse("MESSAGE_SEGMENTS_PER_SECOND")?;
        if segments_per_second <= 0.0 {
            return Err(ConfigError::Invalid("MESSAGE_SEGMENTS_PER_SECOND"));
        }

        let environment = match env.optional("ENVIRONMENT") {
            Some(value) => DeploymentEnvironment::from_str(&value)
                .ok_or(ConfigError::Invalid("ENVIRONMENT"))?,
            None => DeploymentEnvironment::Local,
        };

        let district_exceptions = env
            .optional("CANDIDATE_DISTRICT_EXCEPTIONS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_lowercase)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Config {
            port: env.parse("PORT")?,
            scheme: env.required("SCHEME")?,
            host: env.required("HOST")?,
            database_url: env.required("DATABASE_URL")?,
            dispatch: DispatchConfig {
                segments_per_second,
                max_queue_length: env.parse("MAX_QUEUE_LENGTH")?,
                min_hour,
                max_hour,
            },
            segment_policy: SegmentPolicy::default(),
            payload_builder: PayloadBuilderConfig {
                query_limit: env.parse_optional("DATABASE_QUERY_LIMIT")?,
                ..PayloadBuilderConfig::default()
            },
            journey: BulkSmsJourneyConfig {
                max_batch_size: env.parse_or("TWILIO_RATE_LIMIT", DEFAULT_TWILIO_RATE_LIMIT)?,
                environment,
                non_production_message_cap: NON_PRODUCTION_MESSAGE_CAP,
            },
            schedule: ScheduleBulkSmsConfig {
                max_attempts: env.parse_or("BULK_SMS_MAX_ATTEMPTS", 2)?,
            },
            twilio: TwilioConfig {
                account_sid: env.required("TWILIO_ACCOUNT_SID")?,
                auth_token: env.required("TWILIO_AUTH_TOKEN")?,
                messaging_service_sid: env.required("TWILIO_MESSAGING_SERVICE_SID")?,
                base_url: env
                    .optional("TWILIO_API_URL")
                    .unwrap_or_else(|| "https://api.twilio.com".to_string()),
                max_rate_limit_attempts: 3,
                rate_limit_backoff: Duration::from_secs(1),
            },
            jetstream: JetstreamConfig {
                url: env.required("NATS_URL")?,
                stream: env
                    .optional("BULK_SMS_STREAM")
                    .unwrap_or_else(|| "BULK_SMS".to_string()),
                subject: env
                    .optional("BULK_SMS_SUBJECT")
                    .unwrap_or_else(|| "bulk_sms.requested".to_string()),
                durable: env
                    .optional("BULK_SMS_DURABLE")
                    .unwrap_or_else(|| "bulk-sms-worker".to_string()),
                pull_batch: 1,
                ack_wait_seconds: env.parse_or("BULK_SMS_ACK_WAIT_SECONDS", 60)?,
                max_deliver: -1,
                max_concurrent_runs: env.parse_or("BULK_SMS_MAX_CONCURRENT_RUNS", 16)?,
            },
            inbound_sms: InboundSmsConfig {
                stop_keyword: env.optional("SWC_STOP_SMS_KEYWORD"),
                unstop_keyword: env.optional("SWC_UNSTOP_SMS_KEYWORD"),
            },
            candidate_matcher: CandidateMatcherConfig {
                district_exceptions,
            },
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &'static str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn parse<T: FromStr>(&self, key: &'static str) -> Result<T, ConfigError> {
        self.required(key)?
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key))
    }

    fn parse_optional<T: FromStr>(&self, key: &'static str) -> Result<Option<T>, ConfigError> {
        self.optional(key)
            .map(|value| value.trim().parse().map_err(|_| ConfigError::Invalid(key)))
            .transpose()
    }

    fn parse_or<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        Ok(self.parse_optional(key)?.unwrap_or(default))
    }
}
