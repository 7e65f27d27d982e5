use poem::http::StatusCode;

use crate::{
    application::usecases::match_candidates::CandidateMatchReport,
    domain::{
        errors::DomainError,
        models::{BulkSmsSummary, CampaignMessage, CandidateProfile, RaceCandidate, RecipientFilter},
    },
    presentation::http::{
        requests::{CampaignMessageDto, CandidateProfileDto, RaceCandidateDto},
        responses::{
            BulkSmsSummaryDto, CampaignEstimateDto, CandidateMatchDto, CandidateMatchReportDto,
            TotalEstimateDto,
        },
    },
};

pub fn map_campaign(dto: CampaignMessageDto) -> CampaignMessage {
    let filter = dto.recipient_filter.unwrap_or_default();
    CampaignMessage {
        sms_body: dto.sms_body,
        campaign_name: dto.campaign_name,
        recipient_filter: RecipientFilter {
            country_code: filter.country_code,
            administrative_area: filter.administrative_area,
            phone_numbers: filter.phone_numbers,
        },
        media: dto.media,
        include_pending_double_opt_in: dto.include_pending_double_opt_in,
    }
}

pub fn map_summary(summary: BulkSmsSummary) -> BulkSmsSummaryDto {
    BulkSmsSummaryDto {
        campaigns: summary
            .messages_info
            .into_iter()
            .map(|(campaign_name, estimate)| CampaignEstimateDto {
                campaign_name,
                segments_count: estimate.segments_count,
                messages_count: estimate.messages_count,
                total_time_seconds: estimate.total_time_seconds,
                chunks: estimate.chunks,
            })
            .collect(),
        total: TotalEstimateDto {
            segments_count: summary.total.segments_count,
            messages_count: summary.total.messages_count,
            total_time: summary.total.total_time,
            chunks: summary.total.chunks,
        },
    }
}

pub fn map_profile(dto: CandidateProfileDto) -> CandidateProfile {
    CandidateProfile {
        id: dto.id,
        first_name: dto.first_name,
        last_name: dto.last_name,
        first_nickname: dto.first_nickname,
        district: dto.district,
        state: dto.state,
    }
}

pub fn map_race_candidate(dto: RaceCandidateDto) -> RaceCandidate {
    RaceCandidate {
        id: dto.id,
        first_name: dto.first_name,
        last_name: dto.last_name,
        district: dto.district,
        state: dto.state,
        votes: dto.votes,
    }
}

pub fn map_match_report(report: CandidateMatchReport) -> CandidateMatchReportDto {
    CandidateMatchReportDto {
        matches: report
            .matches
            .into_iter()
            .map(|matched| CandidateMatchDto {
                profile_id: matched.profile.id,
                candidate_id: matched.candidate.id,
                votes: matched.candidate.votes,
            })
            .collect(),
        unmatched_profile_ids: report
            .unmatched_profiles
            .into_iter()
            .map(|profile| profile.id)
            .collect(),
    }
}

pub fn map_domain_error(err: DomainError) -> poem::Error {
    let status = match &err {
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    poem::Error::from_string(err.to_string(), status)
}
