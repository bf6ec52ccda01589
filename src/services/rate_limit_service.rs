use chrono::Duration;
use std::sync::Arc;

use crate::errors::Result;
use crate::storage::ResetStore;

/// Per-identifier, per-action sliding-window gate consulted before any
/// sensitive operation. A store failure here fails the calling operation;
/// the limiter is never bypassed.
pub struct RateLimiter {
    store: Arc<dyn ResetStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn ResetStore>) -> Self {
        Self { store }
    }

    pub async fn allow(
        &self,
        identifier: &str,
        action: &str,
        max_attempts: u32,
        window: Duration,
    ) -> Result<bool> {
        let allowed = self
            .store
            .record_attempt(identifier, action, max_attempts, window)
            .await?;
        if !allowed {
            tracing::warn!(identifier, action, "rate limit reached");
        }
        Ok(allowed)
    }
}
