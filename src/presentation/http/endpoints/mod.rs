pub mod bulk_sms;
pub mod candidates;
pub mod health;
pub mod root;
pub mod sms_events;
