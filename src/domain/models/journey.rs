use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JourneyType {
    WelcomeSms,
    BulkSms,
}

impl JourneyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JourneyType::WelcomeSms => "WELCOME_SMS",
            JourneyType::BulkSms => "BULK_SMS",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "WELCOME_SMS" => Some(JourneyType::WelcomeSms),
            "BULK_SMS" => Some(JourneyType::BulkSms),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommunicationJourney {
    pub journey_type: JourneyType,
    pub campaign_name: String,
    pub created_at: DateTime<Utc>,
}
