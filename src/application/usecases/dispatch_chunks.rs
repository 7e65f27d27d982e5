use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveTime, TimeDelta, TimeZone, Utc};
use tracing::info;

use crate::{
    application::{
        handlers::bulk_sms_journey::format_time,
        services::{
            chunk_sender::ChunkSender,
            step_runtime::{StepRuntime, invoke},
        },
    },
    domain::{
        errors::DomainError,
        models::{DispatchTotals, RecipientPayload, SegmentPolicy},
    },
};

#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    /// Throughput of the sending number, in segments per second.
    pub segments_per_second: f64,
    /// Segments the carrier accepts in its queue before rejecting new messages.
    pub max_queue_length: u64,
    /// First local hour messages may be queued.
    pub min_hour: u32,
    /// Local hour from which queuing stops.
    pub max_hour: u32,
}

impl DispatchConfig {
    pub fn seconds_to_send(&self, segments: u64) -> f64 {
        if self.segments_per_second <= 0.0 {
            return 0.0;
        }
        segments as f64 / self.segments_per_second
    }
}

/// Whole-hour UTC offset of a sending window, rejected unless strictly inside ±24h.
pub fn timezone_offset(offset_hours: i32) -> Result<FixedOffset, DomainError> {
    offset_hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| DomainError::Validation(format!("Invalid timezone offset {offset_hours}")))
}

/// Daily `[min_hour, max_hour)` window in a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SendingWindow {
    offset: FixedOffset,
    min_hour: u32,
    max_hour: u32,
}

impl SendingWindow {
    pub fn new(offset_hours: i32, min_hour: u32, max_hour: u32) -> Result<Self, DomainError> {
        let offset = timezone_offset(offset_hours)?;
        if min_hour >= max_hour || max_hour > 24 {
            return Err(DomainError::Validation(format!(
                "Invalid sending window [{min_hour}, {max_hour})"
            )));
        }
        Ok(Self {
            offset,
            min_hour,
            max_hour,
        })
    }

    /// Start and end of the window on the local day containing `now`.
    pub fn bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let local_date = now.with_timezone(&self.offset).date_naive();
        let midnight = self
            .offset
            .from_local_datetime(&local_date.and_time(NaiveTime::MIN))
            .single()
            .map(|midnight| midnight.with_timezone(&Utc))
            .unwrap_or(now);
        (
            midnight + TimeDelta::hours(i64::from(self.min_hour)),
            midnight + TimeDelta::hours(i64::from(self.max_hour)),
        )
    }
}

/// Estimate of what still sits in the carrier queue between iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueueState {
    pub segments_in_flight: u64,
    pub seconds_to_drain: f64,
}

impl QueueState {
    pub fn starting_with(segments: u64, config: &DispatchConfig) -> Self {
        Self {
            segments_in_flight: segments,
            seconds_to_drain: config.seconds_to_send(segments),
        }
    }

    pub fn push(&mut self, segments: u64, config: &DispatchConfig) {
        self.segments_in_flight += segments;
        self.seconds_to_drain += config.seconds_to_send(segments);
    }

    pub fn drain_duration(&self) -> TimeDelta {
        TimeDelta::milliseconds((self.seconds_to_drain * 1000.0).ceil() as i64)
    }

    pub fn reset(&mut self) {
        *self = QueueState::default();
    }
}

pub struct DispatchRequest<'a> {
    pub chunks: &'a [Vec<RecipientPayload>],
    /// Segments planned for the whole run.
    pub planned_segments: u64,
    pub planned_messages: u64,
    pub queue: QueueState,
    pub timezone_offset_hours: i32,
}

pub struct DispatchChunksUseCase {
    sender: Arc<dyn ChunkSender>,
    segment_policy: SegmentPolicy,
    config: DispatchConfig,
}

impl DispatchChunksUseCase {
    pub fn new(
        sender: Arc<dyn ChunkSender>,
        segment_policy: SegmentPolicy,
        config: DispatchConfig,
    ) -> Self {
        Self {
            sender,
            segment_policy,
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Sends chunks strictly in order, one at a time, pausing whenever the sending
    /// window is closed or the carrier queue would overflow.
    pub async fn execute(
        &self,
        runtime: &dyn StepRuntime,
        request: DispatchRequest<'_>,
    ) -> Result<DispatchTotals, DomainError> {
        let window = SendingWindow::new(
            request.timezone_offset_hours,
            self.config.min_hour,
            self.config.max_hour,
        )?;
        let chunk_count = request.chunks.len();
        let planned_seconds = self.config.seconds_to_send(request.planned_segments);

        let mut queue = request.queue;
        let mut totals = DispatchTotals::default();
        let mut seconds_sent = 0.0;

        for (index, chunk) in request.chunks.iter().enumerate() {
            let position = index + 1;
            let now = self.await_window_open(runtime, &window, position).await?;
            let (window_start, window_end) = window.bounds(now);

            let outcome = invoke(
                runtime,
                &format!("enqueue-messages-{position}/{chunk_count}"),
                self.sender.as_ref(),
                chunk,
            )
            .await?;

            totals.total_queued_messages += outcome.queued_messages;
            totals.total_queued_segments += outcome.segments_sent;
            seconds_sent += self.config.seconds_to_send(outcome.segments_sent);
            queue.push(outcome.segments_sent, &self.config);

            let empty_queue_at = now + queue.drain_duration();
            if empty_queue_at > window_end {
                let wake_at = empty_queue_at.max(window_start + TimeDelta::days(1));
                info!(
                    chunk = position,
                    %empty_queue_at,
                    %wake_at,
                    "queue drains after the sending window, waiting for the next day"
                );
                runtime
                    .sleep_until(
                        &format!("chunk-{position}-wait-for-queue-to-drain-next-day"),
                        wake_at,
                    )
                    .await?;
                queue.reset();
            }

            // Gated on the planned total of the run rather than the live queue depth.
            if request.planned_segments >= self.config.max_queue_length {
                if let Some(next_chunk) = request.chunks.get(index + 1) {
                    let next_segments = self.segment_policy.count(next_chunk).segments;
                    if queue.segments_in_flight + next_segments >= self.config.max_queue_length {
                        info!(
                            chunk = position,
                            segments_in_queue = queue.segments_in_flight,
                            time_to_empty_queue = %format_time(queue.seconds_to_drain),
                            "queue overflow control"
                        );
                        let wake_at = runtime.now() + queue.drain_duration();
                        runtime
                            .sleep_until(
                                &format!("chunk-{position}-wait-for-queue-to-be-empty"),
                                wake_at,
                            )
                            .await?;
                        queue.reset();
                    }
                }
            }

            info!(
                chunk = position,
                chunks_left = chunk_count - position,
                messages_left = request
                    .planned_messages
                    .saturating_sub(totals.total_queued_messages),
                time_left = %format_time((planned_seconds - seconds_sent).max(0.0)),
                segments_in_queue = queue.segments_in_flight,
                total_queued_messages = totals.total_queued_messages,
                total_queued_segments = totals.total_queued_segments,
                "shipping estimate"
            );
        }

        info!(
            total_queued_messages = totals.total_queued_messages,
            total_queued_segments = totals.total_queued_segments,
            "finished dispatching"
        );
        Ok(totals)
    }

    /// Returns the instant the chunk may go out, after any suspension.
    async fn await_window_open(
        &self,
        runtime: &dyn StepRuntime,
        window: &SendingWindow,
        position: usize,
    ) -> anyhow::Result<DateTime<Utc>> {
        let now = runtime.now();
        let (window_start, window_end) = window.bounds(now);

        if now < window_start {
            info!(
                chunk = position,
                %now,
                %window_start,
                sleep_for = %format_time((window_start - now).num_milliseconds() as f64 / 1000.0),
                "earlier than the sending window"
            );
            runtime
                .sleep_until(
                    &format!("chunk-{position}-wait-until-min-enqueue-hour"),
                    window_start,
                )
                .await?;
            return Ok(runtime.now());
        }

        if now >= window_end {
            let wake_at = window_start + TimeDelta::days(1);
            info!(
                chunk = position,
                %now,
                %window_end,
                sleep_for = %format_time((wake_at - now).num_milliseconds() as f64 / 1000.0),
                "later than the sending window"
            );
            runtime
                .sleep_until(
                    &format!("chunk-{position}-wait-until-min-enqueue-hour-of-next-day"),
                    wake_at,
                )
                .await?;
            return Ok(runtime.now());
        }

        Ok(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DispatchConfig {
        DispatchConfig {
            segments_per_second: 10.0,
            max_queue_length: 1_000,
            min_hour: 11,
            max_hour: 22,
        }
    }

    #[test]
    fn window_bounds_use_local_day() {
        let window = SendingWindow::new(-4, 11, 22).expect("window");
        // 02:00 UTC is still the previous local day at UTC-4.
        let now = Utc.with_ymd_and_hms(2024, 11, 6, 2, 0, 0).unwrap();
        let (start, end) = window.bounds(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 11, 5, 15, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 11, 6, 2, 0, 0).unwrap());
    }

    #[test]
    fn rejects_inverted_window_and_bad_offset() {
        assert!(SendingWindow::new(-4, 22, 11).is_err());
        assert!(SendingWindow::new(30, 11, 22).is_err());
        assert!(timezone_offset(i32::MAX).is_err());
        assert!(timezone_offset(-10).is_ok());
    }

    #[test]
    fn queue_state_accumulates_and_resets() {
        let config = config();
        let mut queue = QueueState::starting_with(50, &config);
        queue.push(150, &config);
        assert_eq!(queue.segments_in_flight, 200);
        assert_eq!(queue.drain_duration(), TimeDelta::seconds(20));
        queue.reset();
        assert_eq!(queue, QueueState::default());
    }
}
