pub mod bulk_sms_journey;
