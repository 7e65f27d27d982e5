use std::sync::Arc;
use std::time::Duration;

use async_nats::jetstream::{
    self, AckKind,
    consumer::{AckPolicy, PullConsumer, pull},
};
use tokio::{sync::Semaphore, task::JoinHandle};
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

use crate::{
    application::{
        handlers::bulk_sms_journey::{BulkSmsJourneyHandler, BulkSmsOutcome},
        services::{event_bus::BulkSmsBus, step_runtime::StepRuntimeFactory},
    },
    domain::{errors::DomainError, events::BulkSmsEvent},
};

#[derive(Clone)]
pub struct JetstreamConfig {
    pub url: String,
    pub stream: String,
    pub subject: String,
    pub durable: String,
    pub pull_batch: usize,
    pub ack_wait_seconds: u64,
    pub max_deliver: i64,
    /// Runs processed at the same time by one worker.
    pub max_concurrent_runs: usize,
}

pub struct JetstreamBus {
    context: jetstream::Context,
    subject: String,
}

impl JetstreamBus {
    pub async fn new(config: &JetstreamConfig) -> anyhow::Result<(Arc<Self>, JetstreamWorker)> {
        let client = async_nats::connect(&config.url).await?;
        let context = jetstream::new(client);

        let stream = context
            .get_or_create_stream(jetstream::stream::Config {
                name: config.stream.clone(),
                subjects: vec![config.subject.clone()],
                ..Default::default()
            })
            .await?;

        let consumer = stream
            .get_or_create_consumer(
                &config.durable,
                pull::Config {
                    durable_name: Some(config.durable.clone()),
                    ack_policy: AckPolicy::Explicit,
                    ack_wait: Duration::from_secs(config.ack_wait_seconds),
                    max_deliver: config.max_deliver,
                    ..Default::default()
                },
            )
            .await?;

        let bus = Arc::new(Self {
            context: context.clone(),
            subject: config.subject.clone(),
        });

        let worker = JetstreamWorker {
            consumer,
            pull_batch: config.pull_batch,
            // Runs sleep for hours; keep the delivery alive well inside ack_wait.
            progress_interval: Duration::from_secs((config.ack_wait_seconds / 2).max(1)),
            run_slots: Arc::new(Semaphore::new(config.max_concurrent_runs.max(1))),
        };

        Ok((bus, worker))
    }
}

#[async_trait::async_trait]
impl BulkSmsBus for JetstreamBus {
    async fn publish(&self, event: BulkSmsEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(&event)?;
        self.context
            .publish(self.subject.clone(), payload.into())
            .await?
            .await?;
        Ok(())
    }
}

pub struct JetstreamWorker {
    consumer: PullConsumer,
    pull_batch: usize,
    progress_interval: Duration,
    run_slots: Arc<Semaphore>,
}

impl JetstreamWorker {
    pub fn spawn(
        self,
        handler: Arc<BulkSmsJourneyHandler>,
        runtimes: Arc<dyn StepRuntimeFactory>,
        bus: Arc<JetstreamBus>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(err) = self.run(handler, runtimes, bus).await {
                error!("jetstream worker stopped: {err:?}");
            }
        })
    }

    /// Pulls events and runs each one in its own task, so a run sleeping until
    /// tomorrow's window does not hold back the runs queued behind it.
    async fn run(
        self,
        handler: Arc<BulkSmsJourneyHandler>,
        runtimes: Arc<dyn StepRuntimeFactory>,
        bus: Arc<JetstreamBus>,
    ) -> anyhow::Result<()> {
        loop {
            let mut batch = self
                .consumer
                .batch()
                .max_messages(self.pull_batch)
                .messages()
                .await?;
            while let Some(message) = batch.next().await {
                let message = match message {
                    Ok(message) => message,
                    Err(err) => {
                        warn!("jetstream batch error: {err:?}");
                        continue;
                    }
                };

                let permit = self.run_slots.clone().acquire_owned().await?;
                let run = BulkSmsRun {
                    handler: handler.clone(),
                    runtimes: runtimes.clone(),
                    bus: bus.clone(),
                    progress_interval: self.progress_interval,
                };
                tokio::spawn(async move {
                    if let Err(err) = run.process_message(message).await {
                        error!("failed to process bulk sms event: {err:?}");
                    }
                    drop(permit);
                });
            }
        }
    }
}

struct BulkSmsRun {
    handler: Arc<BulkSmsJourneyHandler>,
    runtimes: Arc<dyn StepRuntimeFactory>,
    bus: Arc<JetstreamBus>,
    progress_interval: Duration,
}

impl BulkSmsRun {
    /// Runs one bulk journey. The run id is the event id, so a republished event
    /// resumes from the step journal instead of sending twice.
    async fn process_message(self, message: jetstream::Message) -> anyhow::Result<()> {
        let event = match decode_event(&message.payload) {
            Ok(event) => event,
            Err(err) => {
                error!("dropping undecodable bulk sms event: {err:#}");
                message
                    .ack_with(AckKind::Term)
                    .await
                    .map_err(|e| anyhow::anyhow!("failed to terminate message: {}", e))?;
                return Ok(());
            }
        };
        let runtime = self.runtimes.create(event.event_id);
        info!(event_id = %event.event_id, attempt = event.attempt, "starting bulk sms run");

        let handling = self.handler.handle(runtime.as_ref(), &event);
        tokio::pin!(handling);
        let mut heartbeat = tokio::time::interval(self.progress_interval);
        heartbeat.tick().await;

        let result = loop {
            tokio::select! {
                result = &mut handling => break result,
                _ = heartbeat.tick() => {
                    if let Err(err) = message.ack_with(AckKind::Progress).await {
                        warn!(event_id = %event.event_id, "failed to extend ack deadline: {err}");
                    }
                }
            }
        };

        match result {
            Ok(BulkSmsOutcome::Dispatched(totals)) => {
                info!(
                    event_id = %event.event_id,
                    total_queued_messages = totals.total_queued_messages,
                    total_queued_segments = totals.total_queued_segments,
                    "bulk sms run finished"
                );
            }
            Ok(BulkSmsOutcome::Preview(summary)) => {
                info!(
                    event_id = %event.event_id,
                    summary = %serde_json::to_string(&summary)?,
                    "bulk sms dry run finished"
                );
            }
            Err(err) => {
                if let Some(next) = next_attempt(&event, &err) {
                    warn!(event_id = %event.event_id, attempt = event.attempt, "bulk sms run failed, retrying: {err:#}");
                    self.bus.publish(next).await?;
                }
            }
        }

        message
            .ack()
            .await
            .map_err(|e| anyhow::anyhow!("failed to ack message: {}", e))?;
        Ok(())
    }
}

fn decode_event(payload: &[u8]) -> anyhow::Result<BulkSmsEvent> {
    Ok(serde_json::from_slice(payload)?)
}

/// The event to republish after a failed run, or `None` when the failure is final.
fn next_attempt(event: &BulkSmsEvent, err: &DomainError) -> Option<BulkSmsEvent> {
    if !err.is_retriable() {
        error!(event_id = %event.event_id, "bulk sms run failed permanently: {err}");
        return None;
    }
    if event.attempt >= event.max_attempts {
        error!(
            event_id = %event.event_id,
            attempts = event.attempt,
            "bulk sms run failed, no attempts left: {err:#}"
        );
        return None;
    }

    let mut next = event.clone();
    next.attempt += 1;
    Some(next)
}
