pub mod build_campaign_payload;
pub mod dispatch_chunks;
pub mod handle_inbound_sms;
pub mod match_candidates;
pub mod preview_bulk_sms;
pub mod schedule_bulk_sms;
