// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.

use anyhow::Result;
use async_trait::async_trait;

use crate::kernel::email::EmailEvent;

// =============================================================================
// Email Service Trait (Infrastructure - transactional email)
// =============================================================================

#[async_trait]
pub trait BaseEmailService: Send + Sync {
    /// Hand one event to the transport. Returning `Ok` means the provider
    /// accepted it, not that it was delivered.
    async fn send(&self, event: &EmailEvent) -> Result<()>;
}
