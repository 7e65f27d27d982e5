use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::CampaignMessage;

/// Delay before a bulk run starts: milliseconds or text such as `30m`, `3 hours`, `2.5d`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SleepTime {
    Millis(u64),
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkSmsEvent {
    pub event_id: Uuid,
    pub messages: Vec<CampaignMessage>,
    /// UTC offset in hours of the sending window, defaults to Eastern time.
    pub timezone: Option<i32>,
    #[serde(default)]
    pub send: bool,
    pub sleep_time: Option<SleepTime>,
    /// Segments already waiting in the carrier queue when the run starts.
    #[serde(default)]
    pub current_segments_in_queue: u64,
    pub attempt: u32,
    pub max_attempts: u32,
}
