use std::sync::Arc;

use poem_openapi::Tags;

use crate::application::usecases::{
    handle_inbound_sms::HandleInboundSmsUseCase, match_candidates::MatchCandidatesUseCase,
    preview_bulk_sms::PreviewBulkSmsUseCase, schedule_bulk_sms::ScheduleBulkSmsUseCase,
};

#[derive(Clone)]
pub struct ApiState {
    pub schedule_bulk_sms_usecase: Arc<ScheduleBulkSmsUseCase>,
    pub preview_bulk_sms_usecase: Arc<PreviewBulkSmsUseCase>,
    pub match_candidates_usecase: Arc<MatchCandidatesUseCase>,
    pub handle_inbound_sms_usecase: Arc<HandleInboundSmsUseCase>,
}

/// Enum of API sections (tags)
#[derive(Tags)]
pub enum EndpointsTags {
    Health,
    BulkSms,
    Candidates,
}
