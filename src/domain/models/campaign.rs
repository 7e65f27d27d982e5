use serde::{Deserialize, Serialize};

/// Targeting filter applied on top of the opt-in and journey predicates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipientFilter {
    pub country_code: Option<String>,
    pub administrative_area: Option<String>,
    pub phone_numbers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CampaignMessage {
    pub sms_body: String,
    pub campaign_name: String,
    #[serde(default)]
    pub recipient_filter: RecipientFilter,
    #[serde(default)]
    pub media: Option<Vec<String>>,
    #[serde(default)]
    pub include_pending_double_opt_in: bool,
}
