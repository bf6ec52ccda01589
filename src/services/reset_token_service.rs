use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::reset_token::ResetTokenRecord;
use crate::storage::ResetStore;

/// Owns the reset-token lifecycle: issuance after OTP verification, expiry,
/// single-use redemption and sibling invalidation. Tokens are random UUIDs
/// looked up by value; issuing a new one does not invalidate older ones --
/// siblings are purged only once a token is successfully redeemed.
pub struct ResetTokenService {
    store: Arc<dyn ResetStore>,
}

impl ResetTokenService {
    pub fn new(store: Arc<dyn ResetStore>) -> Self {
        Self { store }
    }

    pub async fn issue(&self, email: &str, ttl: Duration) -> Result<ResetTokenRecord> {
        let now = Utc::now();
        let record = ResetTokenRecord {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            token: Uuid::new_v4().to_string(),
            used: false,
            created_at: now,
            expires_at: now + ttl,
        };
        self.store.insert_reset_token(&record).await?;
        Ok(record)
    }

    pub async fn fetch_active(&self, token: &str) -> Result<Option<ResetTokenRecord>> {
        self.store.find_active_reset_token(token).await
    }

    /// Single-use redemption; a second call is a no-op.
    pub async fn consume(&self, record: &ResetTokenRecord) -> Result<()> {
        self.store.mark_reset_token_used(&record.id).await
    }

    /// Removes every other token for the email after a successful
    /// redemption, so a still-valid token from an earlier OTP cycle cannot
    /// be replayed.
    pub async fn invalidate_siblings(&self, email: &str, keep_id: &str) -> Result<u64> {
        self.store.delete_sibling_tokens(email, keep_id).await
    }

    pub async fn delete(&self, record: &ResetTokenRecord) -> Result<()> {
        self.store.delete_reset_token(&record.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn service() -> ResetTokenService {
        ResetTokenService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn issued_token_is_fetchable_by_value() {
        let svc = service();
        let record = svc.issue("a@b.com", Duration::minutes(10)).await.unwrap();

        let fetched = svc.fetch_active(&record.token).await.unwrap().unwrap();
        assert_eq!(fetched.id, record.id);
        assert_eq!(fetched.email, "a@b.com");
        assert!(!fetched.used);
    }

    #[tokio::test]
    async fn tokens_are_unique_and_unguessable_shape() {
        let svc = service();
        let a = svc.issue("a@b.com", Duration::minutes(10)).await.unwrap();
        let b = svc.issue("a@b.com", Duration::minutes(10)).await.unwrap();

        assert_ne!(a.token, b.token);
        // UUID v4: 36 chars, 122 random bits.
        assert_eq!(a.token.len(), 36);
    }

    #[tokio::test]
    async fn consume_is_single_use() {
        let svc = service();
        let record = svc.issue("a@b.com", Duration::minutes(10)).await.unwrap();

        svc.consume(&record).await.unwrap();
        assert!(svc.fetch_active(&record.token).await.unwrap().is_none());
        svc.consume(&record).await.unwrap();
    }

    #[tokio::test]
    async fn issuing_does_not_invalidate_older_tokens() {
        let svc = service();
        let first = svc.issue("a@b.com", Duration::minutes(10)).await.unwrap();
        let second = svc.issue("a@b.com", Duration::minutes(10)).await.unwrap();

        assert!(svc.fetch_active(&first.token).await.unwrap().is_some());
        assert!(svc.fetch_active(&second.token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn sibling_invalidation_spares_the_redeemed_token() {
        let svc = service();
        let redeemed = svc.issue("a@b.com", Duration::minutes(10)).await.unwrap();
        let sibling = svc.issue("a@b.com", Duration::minutes(10)).await.unwrap();

        let removed = svc.invalidate_siblings("a@b.com", &redeemed.id).await.unwrap();
        assert_eq!(removed, 1);
        assert!(svc.fetch_active(&sibling.token).await.unwrap().is_none());
    }
}
