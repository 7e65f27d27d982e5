use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use poem::{EndpointExt, Route, Server, listener::TcpListener, post};
use poem_openapi::OpenApiService;
use sqlx::postgres::PgPoolOptions;
use tokio::main;
use tracing::info;
use tracing_subscriber::EnvFilter;

use advocacy_messaging::{
    application::{
        handlers::bulk_sms_journey::BulkSmsJourneyHandler,
        services::{candidate_matching::CandidateMatcher, event_bus::BulkSmsBus},
        usecases::{
            build_campaign_payload::BuildCampaignPayloadUseCase,
            dispatch_chunks::DispatchChunksUseCase, handle_inbound_sms::HandleInboundSmsUseCase,
            match_candidates::MatchCandidatesUseCase, preview_bulk_sms::PreviewBulkSmsUseCase,
            schedule_bulk_sms::ScheduleBulkSmsUseCase,
        },
    },
    config::Config,
    infrastructure::{
        messaging::{jetstream::JetstreamBus, twilio::TwilioChunkSender},
        repositories::postgres::PostgresSubscriberRepository,
        runtime::{in_memory::InMemoryStepRuntimeFactory, postgres::PostgresStepRuntimeFactory},
    },
    presentation::http::endpoints::{
        bulk_sms::BulkSmsEndpoints, candidates::CandidatesEndpoints, health::HealthEndpoints,
        root::ApiState, sms_events::sms_events,
    },
};

#[main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::try_parse()?;

    let server_url = format!("{}://{}:{}", config.scheme, config.host, config.port);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    let subscribers = PostgresSubscriberRepository::new(pool.clone());
    let sender = TwilioChunkSender::new(config.twilio, subscribers.clone(), config.segment_policy)?;

    let payload_builder = Arc::new(BuildCampaignPayloadUseCase::new(
        subscribers.clone(),
        config.payload_builder,
    ));
    let dispatcher = Arc::new(DispatchChunksUseCase::new(
        sender,
        config.segment_policy,
        config.dispatch,
    ));
    let journey_handler = Arc::new(BulkSmsJourneyHandler::new(
        payload_builder,
        dispatcher,
        config.segment_policy,
        config.journey,
    ));

    let (bus, worker) = JetstreamBus::new(&config.jetstream)
        .await
        .context("failed to set up jetstream")?;
    worker.spawn(
        journey_handler.clone(),
        PostgresStepRuntimeFactory::new(pool.clone()),
        bus.clone(),
    );

    let state = Arc::new(ApiState {
        schedule_bulk_sms_usecase: Arc::new(ScheduleBulkSmsUseCase::new(
            bus as Arc<dyn BulkSmsBus>,
            config.schedule,
        )),
        preview_bulk_sms_usecase: Arc::new(PreviewBulkSmsUseCase::new(
            journey_handler,
            Arc::new(InMemoryStepRuntimeFactory),
        )),
        match_candidates_usecase: Arc::new(MatchCandidatesUseCase::new(CandidateMatcher::new(
            config.candidate_matcher,
        ))),
        handle_inbound_sms_usecase: Arc::new(HandleInboundSmsUseCase::new(
            subscribers,
            config.inbound_sms,
        )),
    });

    let endpoints = (
        HealthEndpoints,
        BulkSmsEndpoints::new(state.clone()),
        CandidatesEndpoints::new(state.clone()),
    );
    let api_service = OpenApiService::new(endpoints, "Advocacy Messaging API", "0.1.0")
        .server(format!("{}/api", server_url));
    let ui = api_service.swagger_ui();
    let app = Route::new()
        .nest("/api", api_service)
        .at("/sms/events/messages", post(sms_events).data(state))
        .nest("/", ui);

    info!("Starting server at {}", server_url);

    Server::new(TcpListener::bind(format!("0.0.0.0:{}", config.port)))
        .run(app)
        .await?;
    Ok(())
}
