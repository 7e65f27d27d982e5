pub mod endpoints;
pub mod mappers;
pub mod requests;
pub mod responses;
