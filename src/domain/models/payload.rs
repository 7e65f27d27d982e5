use serde::{Deserialize, Serialize};

use super::journey::JourneyType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayloadMessage {
    /// `None` for journey markers that only record a delivery, e.g. the welcome legalese
    /// carried inside the bulk body.
    pub body: Option<String>,
    pub campaign_name: String,
    pub journey_type: JourneyType,
    pub media: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipientPayload {
    pub phone_number: String,
    pub messages: Vec<PayloadMessage>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnqueueOutcome {
    pub queued_messages: u64,
    pub segments_sent: u64,
}
