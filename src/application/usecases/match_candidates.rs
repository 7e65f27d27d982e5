use tracing::{info, warn};

use crate::{
    application::services::candidate_matching::CandidateMatcher,
    domain::models::{CandidateProfile, RaceCandidate},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateMatch {
    pub profile: CandidateProfile,
    pub candidate: RaceCandidate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateMatchReport {
    pub matches: Vec<CandidateMatch>,
    /// Profiles without a counterpart. Reported for manual follow-up, never fatal.
    pub unmatched_profiles: Vec<CandidateProfile>,
}

pub struct MatchCandidatesUseCase {
    matcher: CandidateMatcher,
}

impl MatchCandidatesUseCase {
    pub fn new(matcher: CandidateMatcher) -> Self {
        Self { matcher }
    }

    pub fn execute(
        &self,
        profiles: Vec<CandidateProfile>,
        candidates: &[RaceCandidate],
    ) -> CandidateMatchReport {
        let mut report = CandidateMatchReport::default();

        for profile in profiles {
            match candidates
                .iter()
                .find(|candidate| self.matcher.is_match(&profile, candidate))
            {
                Some(candidate) => report.matches.push(CandidateMatch {
                    profile,
                    candidate: candidate.clone(),
                }),
                None => {
                    warn!(
                        profile_id = %profile.id,
                        first_name = %profile.first_name,
                        last_name = %profile.last_name,
                        "no race candidate matched profile"
                    );
                    report.unmatched_profiles.push(profile);
                }
            }
        }

        info!(
            matched = report.matches.len(),
            unmatched = report.unmatched_profiles.len(),
            "matched candidates"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_unmatched_profiles_without_failing() {
        let usecase = MatchCandidatesUseCase::new(CandidateMatcher::default());
        let profiles = vec![
            CandidateProfile {
                id: "dtsi-1".into(),
                first_name: "Ruben".into(),
                last_name: "Gallego".into(),
                first_nickname: None,
                district: None,
                state: Some("AZ".into()),
            },
            CandidateProfile {
                id: "dtsi-2".into(),
                first_name: "Kari".into(),
                last_name: "Lake".into(),
                first_nickname: None,
                district: None,
                state: Some("AZ".into()),
            },
        ];
        let candidates = vec![RaceCandidate {
            id: "ddhq-9".into(),
            first_name: "Rubén".into(),
            last_name: "Gallego".into(),
            district: None,
            state: Some("az".into()),
            votes: 1_000,
        }];

        let report = usecase.execute(profiles, &candidates);
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].candidate.id, "ddhq-9");
        assert_eq!(report.unmatched_profiles.len(), 1);
        assert_eq!(report.unmatched_profiles[0].id, "dtsi-2");
    }
}
