use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CampaignEstimate {
    pub segments_count: u64,
    pub messages_count: u64,
    pub total_time_seconds: f64,
    pub chunks: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TotalEstimate {
    pub segments_count: u64,
    pub messages_count: u64,
    pub total_time: String,
    pub chunks: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BulkSmsSummary {
    pub messages_info: BTreeMap<String, CampaignEstimate>,
    pub total: TotalEstimate,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchTotals {
    pub total_queued_messages: u64,
    pub total_queued_segments: u64,
}
