use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{
    models::SmsStatus, repositories::SubscriberRepository, value_objects::normalize_phone_number,
};

const STOP_KEYWORDS: [&str; 6] = ["STOPALL", "UNSUBSCRIBE", "CANCEL", "END", "QUIT", "STOP"];
const START_KEYWORDS: [&str; 4] = ["YES", "START", "CONTINUE", "UNSTOP"];
const HELP_KEYWORDS: [&str; 1] = ["HELP"];

#[derive(Debug, Clone, Default)]
pub struct InboundSmsConfig {
    /// Extra opt-out keyword of the sending program.
    pub stop_keyword: Option<String>,
    /// Extra opt-in keyword of the sending program.
    pub unstop_keyword: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsKeyword {
    OptOut,
    OptIn,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundSmsOutcome {
    pub keyword: Option<SmsKeyword>,
    pub known_sender: bool,
}

pub struct HandleInboundSmsUseCase {
    subscribers: Arc<dyn SubscriberRepository>,
    config: InboundSmsConfig,
}

impl HandleInboundSmsUseCase {
    pub fn new(subscribers: Arc<dyn SubscriberRepository>, config: InboundSmsConfig) -> Self {
        Self {
            subscribers,
            config,
        }
    }

    pub fn classify(&self, body: &str) -> Option<SmsKeyword> {
        let keyword = body.trim().to_uppercase();
        if keyword.is_empty() {
            return None;
        }
        let custom = |configured: &Option<String>| {
            configured
                .as_deref()
                .is_some_and(|value| value.trim().to_uppercase() == keyword)
        };

        if STOP_KEYWORDS.contains(&keyword.as_str()) || custom(&self.config.stop_keyword) {
            Some(SmsKeyword::OptOut)
        } else if START_KEYWORDS.contains(&keyword.as_str()) || custom(&self.config.unstop_keyword)
        {
            Some(SmsKeyword::OptIn)
        } else if HELP_KEYWORDS.contains(&keyword.as_str()) {
            Some(SmsKeyword::Help)
        } else {
            None
        }
    }

    pub async fn execute(&self, from: &str, body: Option<&str>) -> anyhow::Result<InboundSmsOutcome> {
        let phone_number = normalize_phone_number(from);
        let subscriber = self.subscribers.find_by_phone_number(&phone_number).await?;
        if subscriber.is_none() {
            warn!(%phone_number, "received message from an unused phone number");
        }

        let keyword = body.and_then(|body| self.classify(body));
        let status = match keyword {
            Some(SmsKeyword::OptOut) => Some(SmsStatus::OptedOut),
            Some(SmsKeyword::OptIn) => Some(SmsStatus::OptedInHasReplied),
            Some(SmsKeyword::Help) | None => None,
        };

        if let (Some(status), Some(_)) = (status, subscriber.as_ref()) {
            self.subscribers
                .update_sms_status(&phone_number, status)
                .await?;
            info!(%phone_number, status = status.as_str(), "updated sms status");
        }

        Ok(InboundSmsOutcome {
            keyword,
            known_sender: subscriber.is_some(),
        })
    }
}
