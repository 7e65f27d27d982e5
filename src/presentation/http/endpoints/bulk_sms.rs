use std::sync::Arc;

use poem::Result as PoemResult;
use poem_openapi::{OpenApi, payload::Json};

use crate::{
    application::usecases::schedule_bulk_sms::ScheduleBulkSmsRequest,
    domain::events::SleepTime,
    presentation::http::{
        endpoints::root::{ApiState, EndpointsTags},
        mappers::{map_campaign, map_domain_error, map_summary},
        requests::{PreviewBulkSmsRequestDto, ScheduleBulkSmsRequestDto},
        responses::{BulkSmsSummaryDto, ScheduleBulkSmsResponseDto},
    },
};

#[derive(Clone)]
pub struct BulkSmsEndpoints {
    state: Arc<ApiState>,
}

impl BulkSmsEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl BulkSmsEndpoints {
    /// Queues a bulk run. Live runs pace themselves against the sending window.
    #[oai(path = "/bulk-sms", method = "post", tag = EndpointsTags::BulkSms)]
    pub async fn schedule_bulk_sms(
        &self,
        request: Json<ScheduleBulkSmsRequestDto>,
    ) -> PoemResult<Json<ScheduleBulkSmsResponseDto>> {
        let request = request.0;
        let payload = ScheduleBulkSmsRequest {
            messages: request.messages.into_iter().map(map_campaign).collect(),
            timezone: request.timezone,
            send: request.send,
            sleep_time: request.sleep_time.map(SleepTime::Text),
            current_segments_in_queue: request.current_segments_in_queue,
        };

        let response = self
            .state
            .schedule_bulk_sms_usecase
            .execute(payload)
            .await
            .map_err(map_domain_error)?;

        Ok(Json(ScheduleBulkSmsResponseDto {
            event_id: response.event_id,
        }))
    }

    /// Estimates a bulk run without sending anything.
    #[oai(path = "/bulk-sms/preview", method = "post", tag = EndpointsTags::BulkSms)]
    pub async fn preview_bulk_sms(
        &self,
        request: Json<PreviewBulkSmsRequestDto>,
    ) -> PoemResult<Json<BulkSmsSummaryDto>> {
        let request = request.0;
        let summary = self
            .state
            .preview_bulk_sms_usecase
            .execute(
                request.messages.into_iter().map(map_campaign).collect(),
                request.timezone,
            )
            .await
            .map_err(map_domain_error)?;

        Ok(Json(map_summary(summary)))
    }
}
