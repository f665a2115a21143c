//! Courier API server entry point.

use std::sync::Arc;

use courier_accounts::application::notification_handlers::user_notification_handlers;
use courier_api::config::Config;
use courier_api::error::AppError;
use courier_api::state::AppState;
use courier_api::{build_router, telemetry};
use courier_core::clock::{Clock, SystemClock};
use courier_core::feed::ChangeFeed;
use courier_core::repository::UserRepository;
use courier_pipeline::registry::HandlerRegistry;
use courier_pipeline::runtime::{self, PipelineComponents};
use courier_pipeline::sink::LoggingSink;
use courier_store::schema::MIGRATOR;
use courier_store::{PgChangeFeed, PgNotificationStore, PgOutboxStore, PgUserStore};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let telemetry = telemetry::init()?;
    tracing::info!("Starting Courier API server");

    let config = Config::from_env()?;
    let addr = config.bind_addr()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    MIGRATOR.run(&pool).await?;
    tracing::info!("database migrations applied");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let users = Arc::new(PgUserStore::new(pool.clone(), Arc::clone(&clock)));
    let outbox = Arc::new(PgOutboxStore::new(pool.clone()));
    let notifications = Arc::new(PgNotificationStore::new(pool.clone()));
    let feed: Arc<dyn ChangeFeed> = Arc::new(PgChangeFeed::new(pool.clone()));

    let mut registry = HandlerRegistry::new();
    for (event_type, handler) in
        user_notification_handlers(Arc::clone(&users) as Arc<dyn UserRepository>)
    {
        registry.register(event_type, handler);
    }

    let pipeline = runtime::start(
        config.pipeline,
        PipelineComponents {
            outbox: outbox.clone(),
            notifications: notifications.clone(),
            feed: Some(feed),
            registry,
            sink: Arc::new(LoggingSink::new(config.delivery_latency)),
            clock: Arc::clone(&clock),
        },
    );

    let app_state = AppState::new(
        users.clone(),
        users,
        outbox,
        notifications,
        clock,
        pipeline.status(),
    );
    let app = build_router(app_state);

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pipeline.shutdown().await;
    pool.close().await;
    tracing::info!("Courier API server stopped");
    telemetry.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
