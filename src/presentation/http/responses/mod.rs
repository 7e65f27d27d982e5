use poem_openapi::Object;
use uuid::Uuid;

#[derive(Object)]
pub struct ScheduleBulkSmsResponseDto {
    pub event_id: Uuid,
}

#[derive(Object)]
pub struct CampaignEstimateDto {
    pub campaign_name: String,
    pub segments_count: u64,
    pub messages_count: u64,
    pub total_time_seconds: f64,
    pub chunks: u64,
}

#[derive(Object)]
pub struct TotalEstimateDto {
    pub segments_count: u64,
    pub messages_count: u64,
    pub total_time: String,
    pub chunks: u64,
}

#[derive(Object)]
pub struct BulkSmsSummaryDto {
    pub campaigns: Vec<CampaignEstimateDto>,
    pub total: TotalEstimateDto,
}

#[derive(Object)]
pub struct CandidateMatchDto {
    pub profile_id: String,
    pub candidate_id: String,
    pub votes: u64,
}

#[derive(Object)]
pub struct CandidateMatchReportDto {
    pub matches: Vec<CandidateMatchDto>,
    pub unmatched_profile_ids: Vec<String>,
}
