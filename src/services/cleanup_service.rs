use chrono::Utc;
use std::sync::Arc;
use tokio::time::{self, Duration};

use crate::errors::Result;
use crate::storage::ResetStore;

/// Periodic sweep of expired OTP and reset-token records. Expiry is already
/// enforced at read time; this keeps the collections from accumulating dead
/// rows.
pub struct CleanupService {
    store: Arc<dyn ResetStore>,
}

impl CleanupService {
    pub fn new(store: Arc<dyn ResetStore>) -> Self {
        Self { store }
    }

    pub async fn run_once(&self) -> Result<u64> {
        self.store.delete_expired(Utc::now()).await
    }

    /// Runs forever; spawn it as a background task.
    pub async fn start(self: Arc<Self>, interval: Duration) {
        let mut timer = time::interval(interval);
        tracing::info!("Expiry sweep scheduled every {:?}", interval);

        loop {
            timer.tick().await;
            match self.run_once().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!("Expiry sweep removed {} records", removed),
                Err(e) => tracing::error!("Expiry sweep failed: {}", e),
            }
        }
    }
}
