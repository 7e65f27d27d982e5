pub mod candidate_matching;
pub mod chunk_sender;
pub mod event_bus;
pub mod step_runtime;
