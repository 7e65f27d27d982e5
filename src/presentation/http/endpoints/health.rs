use poem_openapi::{OpenApi, payload::PlainText};

use crate::presentation::http::endpoints::root::EndpointsTags;

pub struct HealthEndpoints;

#[OpenApi]
impl HealthEndpoints {
    #[oai(path = "/health", method = "get", tag = EndpointsTags::Health)]
    pub async fn health(&self) -> PlainText<String> {
        PlainText("OK".to_string())
    }
}
