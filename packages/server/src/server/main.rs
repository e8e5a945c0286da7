// Main entry point for API server

use std::sync::Arc;

use anyhow::{Context, Result};
use brevo::{BrevoOptions, BrevoService};
use sqlx::postgres::PgPoolOptions;
use tender_core::domains::auth::JwtService;
use tender_core::kernel::scheduled_tasks::start_scheduler;
use tender_core::kernel::{BaseEmailService, BrevoAdapter, LogEmailService, ServerDeps};
use tender_core::{server::build_app, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tender_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting tender engine API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    let email: Arc<dyn BaseEmailService> = match config.brevo_api_key.clone() {
        Some(api_key) => {
            let service = BrevoService::new(BrevoOptions {
                api_key,
                base_url: None,
            });
            Arc::new(BrevoAdapter::new(
                service,
                config.email_sender.clone(),
                config.brevo_template_ids.clone(),
            ))
        }
        None => {
            tracing::warn!("BREVO_API_KEY not set, emails will only be logged");
            Arc::new(LogEmailService)
        }
    };

    let jwt_service = Arc::new(JwtService::new(&config.jwt_secret, config.jwt_issuer.clone()));
    let deps = Arc::new(ServerDeps::new(pool, email, jwt_service, config.engine.clone()));

    // Keep the scheduler alive for the lifetime of the server
    let _scheduler = if config.scheduler_enabled {
        Some(
            start_scheduler(deps.clone())
                .await
                .context("Failed to start scheduler")?,
        )
    } else {
        tracing::info!("Scheduler disabled");
        None
    };

    let app = build_app(deps, config.allowed_origins.clone());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
