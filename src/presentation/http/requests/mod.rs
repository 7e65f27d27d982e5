use poem_openapi::Object;

#[derive(Object, Debug, Clone, Default)]
pub struct RecipientFilterDto {
    pub country_code: Option<String>,
    pub administrative_area: Option<String>,
    pub phone_numbers: Option<Vec<String>>,
}

#[derive(Object, Debug, Clone)]
pub struct CampaignMessageDto {
    #[oai(validator(min_length = 1, max_length = 1600))]
    pub sms_body: String,
    #[oai(validator(min_length = 1))]
    pub campaign_name: String,
    pub recipient_filter: Option<RecipientFilterDto>,
    pub media: Option<Vec<String>>,
    #[oai(default)]
    pub include_pending_double_opt_in: bool,
}

#[derive(Object, Debug)]
pub struct ScheduleBulkSmsRequestDto {
    pub messages: Vec<CampaignMessageDto>,
    /// UTC offset in hours of the sending window.
    pub timezone: Option<i32>,
    #[oai(default)]
    pub send: bool,
    /// Milliseconds, or text such as `30m` or `3 hours`.
    pub sleep_time: Option<String>,
    #[oai(default)]
    pub current_segments_in_queue: u64,
}

#[derive(Object, Debug)]
pub struct PreviewBulkSmsRequestDto {
    pub messages: Vec<CampaignMessageDto>,
    pub timezone: Option<i32>,
}

#[derive(Object, Debug, Clone)]
pub struct CandidateProfileDto {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub first_nickname: Option<String>,
    pub district: Option<String>,
    pub state: Option<String>,
}

#[derive(Object, Debug, Clone)]
pub struct RaceCandidateDto {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub district: Option<String>,
    pub state: Option<String>,
    #[oai(default)]
    pub votes: u64,
}

#[derive(Object, Debug)]
pub struct MatchCandidatesRequestDto {
    pub profiles: Vec<CandidateProfileDto>,
    pub candidates: Vec<RaceCandidateDto>,
}
