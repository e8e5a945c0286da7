//! Server dependencies for engine activities (using traits for testability)
//!
//! This module provides the central dependency container passed to every
//! activity. External services sit behind trait objects so tests can swap
//! them for recording mocks.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use brevo::models::{Contact, TemplateEmail};
use brevo::BrevoService;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::config::EngineSettings;
use crate::domains::auth::JwtService;
use crate::kernel::{email::EmailEvent, BaseEmailService};

// =============================================================================
// BrevoService Adapter (implements BaseEmailService trait)
// =============================================================================

/// Wrapper around BrevoService that implements BaseEmailService trait
pub struct BrevoAdapter {
    service: BrevoService,
    sender: String,
    template_ids: HashMap<String, i64>,
}

impl BrevoAdapter {
    pub fn new(service: BrevoService, sender: String, template_ids: HashMap<String, i64>) -> Self {
        Self {
            service,
            sender,
            template_ids,
        }
    }
}

#[async_trait]
impl BaseEmailService for BrevoAdapter {
    async fn send(&self, event: &EmailEvent) -> Result<()> {
        let template_id = *self
            .template_ids
            .get(event.kind.as_str())
            .ok_or_else(|| anyhow!("no Brevo template configured for {}", event.kind))?;

        let mut params = event.variables.clone();
        params.insert("SUBJECT".to_string(), event.subject.clone().into());

        let email = TemplateEmail {
            sender: Contact::new(self.sender.clone()),
            to: event.recipients.iter().cloned().map(Contact::new).collect(),
            template_id,
            subject: Some(event.subject.clone()),
            params,
            tags: vec![event.kind.as_str().to_string()],
        };

        self.service
            .send_template_email(&email)
            .await
            .map(|_| ())
            .map_err(|e| anyhow!("{}", e))
    }
}

// =============================================================================
// LogEmailService (no transport configured)
// =============================================================================

/// Writes emails to the log instead of sending them. Used when no provider
/// key is configured (local development).
pub struct LogEmailService;

#[async_trait]
impl BaseEmailService for LogEmailService {
    async fn send(&self, event: &EmailEvent) -> Result<()> {
        info!(
            kind = %event.kind,
            tender_id = %event.tender_id,
            recipients = ?event.recipients,
            subject = %event.subject,
            "Email (not sent: no transport configured)"
        );
        Ok(())
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to activities (using traits for testability)
#[derive(Clone)]
pub struct ServerDeps {
    pub db_pool: PgPool,
    pub email: Arc<dyn BaseEmailService>,
    /// Signs session tokens and survey links
    pub jwt_service: Arc<JwtService>,
    pub settings: EngineSettings,
}

impl ServerDeps {
    pub fn new(
        db_pool: PgPool,
        email: Arc<dyn BaseEmailService>,
        jwt_service: Arc<JwtService>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            db_pool,
            email,
            jwt_service,
            settings,
        }
    }
}
