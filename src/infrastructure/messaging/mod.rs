pub mod jetstream;
pub mod twilio;
