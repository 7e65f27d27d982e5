use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{info, warn};

use crate::{
    application::{
        services::step_runtime::{StepRuntime, run_step},
        usecases::{
            build_campaign_payload::BuildCampaignPayloadUseCase,
            dispatch_chunks::{DispatchChunksUseCase, DispatchRequest, QueueState, timezone_offset},
        },
    },
    domain::{
        errors::DomainError,
        events::{BulkSmsEvent, SleepTime},
        models::{
            BulkSmsSummary, CampaignEstimate, CampaignMessage, DispatchTotals, RecipientPayload,
            SegmentCounts, SegmentPolicy, TotalEstimate,
        },
    },
};

/// Eastern daylight time.
pub const DEFAULT_TIMEZONE_OFFSET_HOURS: i32 = -4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentEnvironment {
    Local,
    Testing,
    Preview,
    Production,
}

impl DeploymentEnvironment {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "local" => Some(DeploymentEnvironment::Local),
            "testing" => Some(DeploymentEnvironment::Testing),
            "preview" => Some(DeploymentEnvironment::Preview),
            "production" => Some(DeploymentEnvironment::Production),
            _ => None,
        }
    }
}

pub struct BulkSmsJourneyConfig {
    /// Payloads handed to the send operation per chunk.
    pub max_batch_size: usize,
    pub environment: DeploymentEnvironment,
    /// Most messages a non-production deployment may send in one run.
    pub non_production_message_cap: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BulkSmsOutcome {
    Preview(BulkSmsSummary),
    Dispatched(DispatchTotals),
}

pub struct BulkSmsJourneyHandler {
    payload_builder: Arc<BuildCampaignPayloadUseCase>,
    dispatcher: Arc<DispatchChunksUseCase>,
    segment_policy: SegmentPolicy,
    config: BulkSmsJourneyConfig,
}

impl BulkSmsJourneyHandler {
    pub fn new(
        payload_builder: Arc<BuildCampaignPayloadUseCase>,
        dispatcher: Arc<DispatchChunksUseCase>,
        segment_policy: SegmentPolicy,
        config: BulkSmsJourneyConfig,
    ) -> Self {
        Self {
            payload_builder,
            dispatcher,
            segment_policy,
            config,
        }
    }

    pub async fn handle(
        &self,
        runtime: &dyn StepRuntime,
        event: &BulkSmsEvent,
    ) -> Result<BulkSmsOutcome, DomainError> {
        let scheduled_sleep =
            validate_request(&event.messages, event.timezone, event.sleep_time.as_ref())?;

        if let Some(delay) = scheduled_sleep {
            info!(event_id = %event.event_id, delay_seconds = delay.num_seconds(), "scheduled sleep");
            let wake_at = wake_time(runtime.now(), delay)?;
            runtime.sleep_until("scheduled-sleep", wake_at).await?;
        }

        let dispatch_config = *self.dispatcher.config();
        let batch_size = self.config.max_batch_size.max(1);
        let mut summary = BulkSmsSummary {
            messages_info: Default::default(),
            total: TotalEstimate {
                segments_count: 0,
                messages_count: 0,
                total_time: String::new(),
                chunks: 0,
            },
        };
        let mut chunks: Vec<Vec<RecipientPayload>> = Vec::new();
        let mut total_seconds = 0.0;

        for (index, campaign) in event.messages.iter().enumerate() {
            info!(
                campaign = %campaign.campaign_name,
                include_pending_double_opt_in = campaign.include_pending_double_opt_in,
                "preparing campaign"
            );
            let payloads = self.payload_builder.execute(runtime, index, campaign).await?;

            let policy = self.segment_policy;
            let counts: SegmentCounts = run_step(
                runtime,
                &format!("campaign-{index}-count-messages-and-segments"),
                async { Ok(policy.count(&payloads)) },
            )
            .await?;

            let campaign_chunks: Vec<Vec<RecipientPayload>> =
                payloads.chunks(batch_size).map(<[_]>::to_vec).collect();
            let seconds = dispatch_config.seconds_to_send(counts.segments);

            let estimate = summary
                .messages_info
                .entry(campaign.campaign_name.clone())
                .or_insert_with(CampaignEstimate::default);
            estimate.segments_count += counts.segments;
            estimate.messages_count += counts.messages;
            estimate.total_time_seconds += seconds;
            estimate.chunks += campaign_chunks.len() as u64;

            summary.total.segments_count += counts.segments;
            summary.total.messages_count += counts.messages;
            summary.total.chunks += campaign_chunks.len() as u64;
            total_seconds += seconds;
            chunks.extend(campaign_chunks);
        }
        summary.total.total_time = format_time(total_seconds);

        if !event.send {
            return Ok(BulkSmsOutcome::Preview(summary));
        }

        info!(
            summary = %serde_json::to_string(&summary).unwrap_or_default(),
            "initial info"
        );

        if self.config.environment != DeploymentEnvironment::Production
            && summary.total.messages_count > self.config.non_production_message_cap
        {
            warn!(
                messages = summary.total.messages_count,
                cap = self.config.non_production_message_cap,
                "refusing bulk send outside production"
            );
            return Err(DomainError::Forbidden(format!(
                "Cannot send more then {} messages in a non-production environment",
                self.config.non_production_message_cap
            )));
        }

        let totals = self
            .dispatcher
            .execute(
                runtime,
                DispatchRequest {
                    chunks: &chunks,
                    planned_segments: summary.total.segments_count,
                    planned_messages: summary.total.messages_count,
                    queue: QueueState::starting_with(
                        event.current_segments_in_queue,
                        &dispatch_config,
                    ),
                    timezone_offset_hours: event.timezone.unwrap_or(DEFAULT_TIMEZONE_OFFSET_HOURS),
                },
            )
            .await?;

        Ok(BulkSmsOutcome::Dispatched(totals))
    }
}

/// Every input check of a run, done before any step executes. Returns the parsed
/// scheduled sleep.
pub fn validate_request(
    messages: &[CampaignMessage],
    timezone: Option<i32>,
    sleep_time: Option<&SleepTime>,
) -> Result<Option<TimeDelta>, DomainError> {
    validate_messages(messages)?;
    timezone_offset(timezone.unwrap_or(DEFAULT_TIMEZONE_OFFSET_HOURS))?;
    sleep_time.map(parse_sleep_time).transpose()
}

pub fn wake_time(now: DateTime<Utc>, delay: TimeDelta) -> Result<DateTime<Utc>, DomainError> {
    now.checked_add_signed(delay)
        .ok_or_else(|| DomainError::Validation("Sleep time is too long".to_string()))
}

pub fn validate_messages(messages: &[CampaignMessage]) -> Result<(), DomainError> {
    if messages.is_empty() {
        return Err(DomainError::Validation("Missing messages to send".to_string()));
    }

    for (index, message) in messages.iter().enumerate() {
        if message.sms_body.trim().is_empty() {
            return Err(DomainError::Validation(format!(
                "Missing sms body in message {index}"
            )));
        }
        if message.campaign_name.trim().is_empty() {
            return Err(DomainError::Validation(format!(
                "Missing campaign name in message {index}"
            )));
        }
    }
    Ok(())
}

/// Accepts milliseconds or text in the style of `30m`, `3 hours` or `2.5d`.
pub fn parse_sleep_time(sleep_time: &SleepTime) -> Result<TimeDelta, DomainError> {
    let text = match sleep_time {
        SleepTime::Millis(millis) => {
            return i64::try_from(*millis)
                .ok()
                .and_then(TimeDelta::try_milliseconds)
                .ok_or_else(|| DomainError::Validation(format!("Invalid sleep time {millis}")));
        }
        SleepTime::Text(text) => text.trim().to_lowercase(),
    };

    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (amount, unit) = text.split_at(split);
    let invalid = || DomainError::Validation(format!("Invalid sleep time {text:?}"));
    let amount: f64 = amount.parse().map_err(|_| invalid())?;

    let unit_millis = match unit.trim() {
        "" | "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => 1_000.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000.0,
        "d" | "day" | "days" => 86_400_000.0,
        "w" | "week" | "weeks" => 604_800_000.0,
        "y" | "yr" | "yrs" | "year" | "years" => 31_557_600_000.0,
        _ => return Err(invalid()),
    };

    let millis = (amount * unit_millis).round();
    if !millis.is_finite() || millis >= i64::MAX as f64 {
        return Err(invalid());
    }
    TimeDelta::try_milliseconds(millis as i64).ok_or_else(invalid)
}

/// Human readable estimate: two significant digits under a minute, then rounded up
/// minutes, then rounded up hours.
pub fn format_time(seconds: f64) -> String {
    const MINUTE: f64 = 60.0;
    const HOUR: f64 = 3_600.0;

    if seconds < MINUTE {
        let magnitude = |value: f64| {
            if value > 0.0 {
                value.log10().floor() as i32
            } else {
                0
            }
        };
        // Rounding can carry into the next power of ten, e.g. 9.96 -> 10.
        let exponent = magnitude(seconds) - 1;
        let rounded = if exponent >= 0 {
            let scale = 10f64.powi(exponent);
            (seconds / scale).round() * scale
        } else {
            let scale = 10f64.powi(-exponent);
            (seconds * scale).round() / scale
        };
        let decimals = (1 - magnitude(rounded)).max(0) as usize;
        format!("{rounded:.decimals$} seconds")
    } else if seconds < HOUR {
        format!("{} minutes", (seconds / MINUTE).ceil())
    } else {
        format!("{} hours", (seconds / HOUR).ceil())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign(body: &str, name: &str) -> CampaignMessage {
        CampaignMessage {
            sms_body: body.to_string(),
            campaign_name: name.to_string(),
            recipient_filter: Default::default(),
            media: None,
            include_pending_double_opt_in: false,
        }
    }

    #[test]
    fn formats_time_estimates() {
        assert_eq!(format_time(5.5), "5.5 seconds");
        assert_eq!(format_time(12.34), "12 seconds");
        assert_eq!(format_time(0.123), "0.12 seconds");
        assert_eq!(format_time(9.96), "10 seconds");
        assert_eq!(format_time(59.97), "60 seconds");
        assert_eq!(format_time(0.00996), "0.010 seconds");
        assert_eq!(format_time(0.0), "0.0 seconds");
        assert_eq!(format_time(61.0), "2 minutes");
        assert_eq!(format_time(3_600.0), "1 hours");
        assert_eq!(format_time(3_601.0), "2 hours");
    }

    #[test]
    fn parses_sleep_times() {
        assert_eq!(
            parse_sleep_time(&SleepTime::Millis(1_500)).unwrap(),
            TimeDelta::milliseconds(1_500)
        );
        assert_eq!(
            parse_sleep_time(&SleepTime::Text("30m".into())).unwrap(),
            TimeDelta::minutes(30)
        );
        assert_eq!(
            parse_sleep_time(&SleepTime::Text("3 hours".into())).unwrap(),
            TimeDelta::hours(3)
        );
        assert_eq!(
            parse_sleep_time(&SleepTime::Text("2.5d".into())).unwrap(),
            TimeDelta::hours(60)
        );
        assert!(parse_sleep_time(&SleepTime::Text("soon".into())).is_err());
    }

    #[test]
    fn rejects_sleep_times_out_of_range() {
        assert!(parse_sleep_time(&SleepTime::Millis(u64::MAX)).is_err());
        assert!(parse_sleep_time(&SleepTime::Text("99999999999999999999999999y".into())).is_err());

        let delay = parse_sleep_time(&SleepTime::Millis(i64::MAX as u64)).unwrap();
        assert!(wake_time(Utc::now(), delay).is_err());

        let delay = parse_sleep_time(&SleepTime::Text("100000000y".into())).unwrap();
        assert!(matches!(
            wake_time(Utc::now(), delay),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn request_validation_covers_timezone_and_sleep() {
        let messages = [campaign("hi", "a")];
        assert!(validate_request(&messages, None, None).unwrap().is_none());
        assert_eq!(
            validate_request(&messages, Some(-7), Some(&SleepTime::Text("30m".into()))).unwrap(),
            Some(TimeDelta::minutes(30))
        );
        assert!(matches!(
            validate_request(&messages, Some(30), None),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            validate_request(&messages, None, Some(&SleepTime::Text("later".into()))),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn validation_names_the_offending_message() {
        let error = validate_messages(&[campaign("hi", "a"), campaign("", "b")]).unwrap_err();
        assert_eq!(error.to_string(), "Validation failed: Missing sms body in message 1");

        let error = validate_messages(&[campaign("hi", " ")]).unwrap_err();
        assert_eq!(error.to_string(), "Validation failed: Missing campaign name in message 0");

        let error = validate_messages(&[]).unwrap_err();
        assert_eq!(error.to_string(), "Validation failed: Missing messages to send");
    }
}
