//! Trade Ledger - Backend Server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trade_ledger_backend::{
    create_app,
    external::{HistorySink, NoopNotifier, Notifier, TracingHistorySink, WebhookNotifier},
    store::{MemoryRepository, PgRepository, Repository},
    AppState, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    // Initialize tracing
    let (json_layer, fmt_layer) = if config.logging.json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tl_server=debug,trade_ledger_backend=debug,tower_http=debug,sqlx=warn".into()
            }),
        )
        .with(json_layer)
        .with(fmt_layer)
        .init();

    tracing::info!("Starting Trade Ledger Server");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!(policy = %config.ledger.shortfall_policy, "Sale shortfall policy");

    let repository: Arc<dyn Repository> = match &config.database.url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(url)
                .await?;
            tracing::info!("Database connection established");

            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&db_pool).await?;
            tracing::info!("Migrations completed");

            Arc::new(PgRepository::new(db_pool))
        }
        None => {
            tracing::warn!("No database configured; documents are kept in memory only");
            Arc::new(MemoryRepository::new())
        }
    };
    let history_sink: Arc<dyn HistorySink> = Arc::new(TracingHistorySink);

    let notifier: Arc<dyn Notifier> = match &config.notification.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(
            url.clone(),
            Duration::from_millis(config.notification.timeout_ms),
        )?),
        None => Arc::new(NoopNotifier),
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    // Build application
    let state = AppState::new(config, repository, history_sink, notifier).await?;
    let app = create_app(state);

    // Start server
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
