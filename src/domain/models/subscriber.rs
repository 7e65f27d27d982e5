use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::journey::CommunicationJourney;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SmsStatus {
    NotOptedIn,
    OptedIn,
    OptedInHasReplied,
    OptedInPendingDoubleOptIn,
    OptedOut,
}

impl SmsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmsStatus::NotOptedIn => "NOT_OPTED_IN",
            SmsStatus::OptedIn => "OPTED_IN",
            SmsStatus::OptedInHasReplied => "OPTED_IN_HAS_REPLIED",
            SmsStatus::OptedInPendingDoubleOptIn => "OPTED_IN_PENDING_DOUBLE_OPT_IN",
            SmsStatus::OptedOut => "OPTED_OUT",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "NOT_OPTED_IN" => Some(SmsStatus::NotOptedIn),
            "OPTED_IN" => Some(SmsStatus::OptedIn),
            "OPTED_IN_HAS_REPLIED" => Some(SmsStatus::OptedInHasReplied),
            "OPTED_IN_PENDING_DOUBLE_OPT_IN" => Some(SmsStatus::OptedInPendingDoubleOptIn),
            "OPTED_OUT" => Some(SmsStatus::OptedOut),
            _ => None,
        }
    }

    /// Statuses a bulk campaign may reach.
    pub fn reachable(include_pending_double_opt_in: bool) -> Vec<SmsStatus> {
        let mut statuses = vec![SmsStatus::OptedIn, SmsStatus::OptedInHasReplied];
        if include_pending_double_opt_in {
            statuses.push(SmsStatus::OptedInPendingDoubleOptIn);
        }
        statuses
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub phone_number: String,
    pub sms_status: SmsStatus,
    pub has_valid_phone_number: bool,
    pub country_code: Option<String>,
    pub administrative_area: Option<String>,
    pub journeys: Vec<CommunicationJourney>,
    pub updated_at: DateTime<Utc>,
}
