// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into ServerDeps for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::{BaseEmailService, EmailEvent, EmailKind, ServerDeps};
use crate::config::EngineSettings;
use crate::domains::auth::JwtService;

// =============================================================================
// Mock Email Service
// =============================================================================

/// Records every event it is given. Recipients registered with
/// `fail_for` make `send` fail, to exercise enqueue-failure paths.
#[derive(Clone, Default)]
pub struct MockEmailService {
    sent: Arc<Mutex<Vec<EmailEvent>>>,
    failing_recipients: Arc<Mutex<HashSet<String>>>,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, recipient: &str) {
        self.failing_recipients
            .lock()
            .unwrap()
            .insert(recipient.to_string());
    }

    /// All accepted events, in send order.
    pub fn sent(&self) -> Vec<EmailEvent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_of_kind(&self, kind: EmailKind) -> Vec<EmailEvent> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    pub fn count_of_kind(&self, kind: EmailKind) -> usize {
        self.sent_of_kind(kind).len()
    }

    pub fn was_sent_to(&self, kind: EmailKind, recipient: &str) -> bool {
        self.sent_of_kind(kind)
            .iter()
            .any(|e| e.recipients.iter().any(|r| r == recipient))
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl BaseEmailService for MockEmailService {
    async fn send(&self, event: &EmailEvent) -> Result<()> {
        let failing = self.failing_recipients.lock().unwrap();
        if let Some(r) = event.recipients.iter().find(|r| failing.contains(*r)) {
            return Err(anyhow!("mock transport refused {}", r));
        }
        drop(failing);

        self.sent.lock().unwrap().push(event.clone());
        Ok(())
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

pub const TEST_JWT_SECRET: &str = "test_secret_key";
pub const TEST_JWT_ISSUER: &str = "test_issuer";

/// ServerDeps wired with mocks, plus handles to inspect them.
pub struct TestDependencies {
    pub email: MockEmailService,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            email: MockEmailService::new(),
        }
    }

    pub fn into_server_deps(&self, db_pool: PgPool) -> ServerDeps {
        ServerDeps::new(
            db_pool,
            Arc::new(self.email.clone()),
            Arc::new(JwtService::new(TEST_JWT_SECRET, TEST_JWT_ISSUER.to_string())),
            EngineSettings {
                site_url: "https://lemarche.test".to_string(),
                ..EngineSettings::default()
            },
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
