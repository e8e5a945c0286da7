use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::collections::HashMap;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub brevo_api_key: Option<String>,
    pub brevo_template_ids: HashMap<String, i64>,
    pub email_sender: String,
    pub allowed_origins: Vec<String>,
    pub scheduler_enabled: bool,
    pub engine: EngineSettings,
}

/// Knobs read by engine activities. Kept apart from `Config` so tests can
/// build one without touching the environment.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Base URL for deep links and survey links in emails.
    pub site_url: String,
    /// Minimum delay between two top-up batches of the same tender.
    pub dispatch_batch_interval_hours: i64,
    pub survey_token_ttl_days: i64,
    /// Wall-clock budget of one scheduler pass.
    pub pass_budget_secs: u64,
    /// Tenders processed concurrently inside one pass.
    pub worker_concurrency: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            site_url: "http://localhost:8080".to_string(),
            dispatch_batch_interval_hours: 24,
            survey_token_ttl_days: 30,
            pass_budget_secs: 240,
            worker_concurrency: 4,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = EngineSettings::default();

        let brevo_template_ids = match env::var("BREVO_TEMPLATE_IDS") {
            Ok(raw) => serde_json::from_str(&raw)
                .context("BREVO_TEMPLATE_IDS must be a JSON object of event name to template id")?,
            Err(_) => HashMap::new(),
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "lemarche".to_string()),
            brevo_api_key: env::var("BREVO_API_KEY").ok().filter(|k| !k.is_empty()),
            brevo_template_ids,
            email_sender: env::var("EMAIL_SENDER")
                .unwrap_or_else(|_| "noreply@lemarche.local".to_string()),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|origin| origin.trim().to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            scheduler_enabled: env::var("SCHEDULER_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            engine: EngineSettings {
                site_url: env::var("SITE_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.site_url),
                dispatch_batch_interval_hours: parse_or(
                    "DISPATCH_BATCH_INTERVAL_HOURS",
                    defaults.dispatch_batch_interval_hours,
                )?,
                survey_token_ttl_days: parse_or(
                    "SURVEY_TOKEN_TTL_DAYS",
                    defaults.survey_token_ttl_days,
                )?,
                pass_budget_secs: parse_or("SCHEDULER_PASS_BUDGET_SECS", defaults.pass_budget_secs)?,
                worker_concurrency: parse_or("WORKER_CONCURRENCY", defaults.worker_concurrency)?,
            },
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} must be a valid number")),
        Err(_) => Ok(default),
    }
}
