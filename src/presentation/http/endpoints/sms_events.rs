use std::sync::Arc;

use poem::{
    Response, handler,
    http::StatusCode,
    web::{Data, Form},
};
use serde::Deserialize;
use tracing::{debug, error};

use crate::presentation::http::endpoints::root::ApiState;

/// Twilio raises an error event on the webhook unless it gets TwiML back.
pub const EMPTY_TWIML: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#;

/// Subset of the inbound message webhook fields we act on.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SmsEvent {
    pub from: String,
    pub body: Option<String>,
    pub message_sid: Option<String>,
}

#[handler]
pub async fn sms_events(
    Data(state): Data<&Arc<ApiState>>,
    Form(event): Form<SmsEvent>,
) -> poem::Result<Response> {
    let outcome = state
        .handle_inbound_sms_usecase
        .execute(&event.from, event.body.as_deref())
        .await
        .map_err(|err| {
            error!(message_sid = ?event.message_sid, "failed to handle inbound sms: {err:#}");
            poem::Error::from_string(err.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
        })?;

    debug!(
        message_sid = ?event.message_sid,
        keyword = ?outcome.keyword,
        known_sender = outcome.known_sender,
        "handled inbound sms"
    );

    Ok(Response::builder()
        .content_type("text/xml")
        .body(EMPTY_TWIML))
}
