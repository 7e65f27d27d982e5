use serde::{Deserialize, Serialize};

/// A politician as known to the advocacy database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateProfile {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub first_nickname: Option<String>,
    pub district: Option<String>,
    pub state: Option<String>,
}

/// A candidate as reported by the race results provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RaceCandidate {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub district: Option<String>,
    pub state: Option<String>,
    #[serde(default)]
    pub votes: u64,
}
