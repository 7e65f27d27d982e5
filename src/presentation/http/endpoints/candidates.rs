use std::sync::Arc;

use poem_openapi::{OpenApi, payload::Json};

use crate::{
    domain::models::RaceCandidate,
    presentation::http::{
        endpoints::root::{ApiState, EndpointsTags},
        mappers::{map_match_report, map_profile, map_race_candidate},
        requests::MatchCandidatesRequestDto,
        responses::CandidateMatchReportDto,
    },
};

#[derive(Clone)]
pub struct CandidatesEndpoints {
    state: Arc<ApiState>,
}

impl CandidatesEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl CandidatesEndpoints {
    #[oai(path = "/candidates/match", method = "post", tag = EndpointsTags::Candidates)]
    pub async fn match_candidates(
        &self,
        request: Json<MatchCandidatesRequestDto>,
    ) -> Json<CandidateMatchReportDto> {
        let request = request.0;
        let candidates: Vec<RaceCandidate> = request
            .candidates
            .into_iter()
            .map(map_race_candidate)
            .collect();
        let report = self.state.match_candidates_usecase.execute(
            request.profiles.into_iter().map(map_profile).collect(),
            &candidates,
        );

        Json(map_match_report(report))
    }
}
