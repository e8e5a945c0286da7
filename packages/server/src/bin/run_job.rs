//! Run one scheduled job by hand, outside the cron scheduler.
//!
//! Useful to replay a missed tick or to drive a job at a chosen `--now`.
//! Emails go through Brevo when `BREVO_API_KEY` is set, otherwise they are
//! only logged. Outputs a JSON summary on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use brevo::{BrevoOptions, BrevoService};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlx::PgPool;
use tender_core::config::Config;
use tender_core::domains::auth::JwtService;
use tender_core::domains::dispatch::run_dispatch_pass;
use tender_core::domains::followups::FollowupJob;
use tender_core::kernel::{BaseEmailService, BrevoAdapter, LogEmailService, PassSummary, ServerDeps};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "run_job")]
#[command(about = "Run a dispatch pass or a follow-up job once")]
struct Cli {
    /// Clock used by the job (RFC 3339). Defaults to the current time.
    #[arg(long, global = true)]
    now: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch validated tenders (initial sends and top-ups)
    Dispatch,

    /// Run a follow-up job, e.g. `click-reminder-2d` or `auto-reject`
    Followup { job: String },

    /// List follow-up job names
    List,
}

#[derive(Serialize)]
struct Response {
    success: bool,
    job: String,
    now: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<PassSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

fn output<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,tender_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let now = cli.now.unwrap_or_else(Utc::now);

    let job = match cli.command {
        Commands::List => {
            let names: Vec<&str> = FollowupJob::ALL.iter().map(|job| job.name()).collect();
            return output(&names);
        }
        Commands::Dispatch => None,
        Commands::Followup { job } => Some(job.parse::<FollowupJob>()?),
    };

    let deps = build_deps().await?;
    let (name, result) = match job {
        None => ("dispatch".to_string(), run_dispatch_pass(now, &deps).await),
        Some(job) => (job.name().to_string(), job.run(now, &deps).await),
    };

    let response = match result {
        Ok(summary) => Response {
            success: true,
            job: name,
            now,
            summary: Some(summary),
            message: None,
        },
        Err(e) => Response {
            success: false,
            job: name,
            now,
            summary: None,
            message: Some(e.to_string()),
        },
    };
    output(&response)
}

async fn build_deps() -> Result<Arc<ServerDeps>> {
    let config = Config::from_env()?;
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let email: Arc<dyn BaseEmailService> = match config.brevo_api_key.clone() {
        Some(api_key) => Arc::new(BrevoAdapter::new(
            BrevoService::new(BrevoOptions {
                api_key,
                base_url: None,
            }),
            config.email_sender.clone(),
            config.brevo_template_ids.clone(),
        )),
        None => Arc::new(LogEmailService),
    };
    let jwt_service = Arc::new(JwtService::new(&config.jwt_secret, config.jwt_issuer.clone()));

    Ok(Arc::new(ServerDeps::new(pool, email, jwt_service, config.engine)))
}
