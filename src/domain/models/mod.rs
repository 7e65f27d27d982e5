pub mod campaign;
pub mod candidate;
pub mod journey;
pub mod payload;
pub mod segment;
pub mod subscriber;
pub mod summary;

pub use campaign::{CampaignMessage, RecipientFilter};
pub use candidate::{CandidateProfile, RaceCandidate};
pub use journey::{CommunicationJourney, JourneyType};
pub use payload::{EnqueueOutcome, PayloadMessage, RecipientPayload};
pub use segment::{SegmentCounts, SegmentPolicy};
pub use subscriber::{SmsStatus, Subscriber};
pub use summary::{BulkSmsSummary, CampaignEstimate, DispatchTotals, TotalEstimate};
