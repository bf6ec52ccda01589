use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::errors::{AppError, Result};
use crate::models::otp::OtpRecord;
use crate::models::reset_token::ResetTokenRecord;
use crate::storage::ResetStore;

#[derive(Default)]
struct Inner {
    otps: HashMap<String, OtpRecord>,
    reset_tokens: HashMap<String, ResetTokenRecord>,
    rate_limits: HashMap<(String, String), Vec<DateTime<Utc>>>,
}

/// In-process store for tests and local development. A single mutex around
/// the state gives the same atomicity the Mongo store gets from
/// single-command updates.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| AppError::Storage("lock poisoned".into()))
    }

    fn record_attempt_at(
        &self,
        identifier: &str,
        action: &str,
        max_attempts: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut inner = self.lock()?;
        let attempts = inner
            .rate_limits
            .entry((identifier.to_string(), action.to_string()))
            .or_default();

        let cutoff = now - window;
        attempts.retain(|ts| *ts > cutoff);

        if attempts.len() >= max_attempts as usize {
            return Ok(false);
        }
        attempts.push(now);
        Ok(true)
    }
}

#[async_trait]
impl ResetStore for MemoryStore {
    async fn record_attempt(
        &self,
        identifier: &str,
        action: &str,
        max_attempts: u32,
        window: Duration,
    ) -> Result<bool> {
        self.record_attempt_at(identifier, action, max_attempts, window, Utc::now())
    }

    async fn invalidate_active_otps(&self, email: &str, purpose: &str) -> Result<()> {
        let mut inner = self.lock()?;
        for record in inner.otps.values_mut() {
            if record.email == email && record.purpose == purpose && !record.used {
                record.used = true;
            }
        }
        Ok(())
    }

    async fn insert_otp(&self, record: &OtpRecord) -> Result<()> {
        self.lock()?.otps.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn find_active_otp(&self, email: &str, purpose: &str) -> Result<Option<OtpRecord>> {
        let inner = self.lock()?;
        Ok(inner
            .otps
            .values()
            .filter(|r| r.email == email && r.purpose == purpose && !r.used)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn increment_otp_attempts(&self, id: &str) -> Result<Option<i32>> {
        let mut inner = self.lock()?;
        Ok(inner.otps.get_mut(id).map(|r| {
            r.attempts += 1;
            r.attempts
        }))
    }

    async fn mark_otp_used(&self, id: &str) -> Result<()> {
        if let Some(record) = self.lock()?.otps.get_mut(id) {
            record.used = true;
        }
        Ok(())
    }

    async fn delete_otp(&self, id: &str) -> Result<()> {
        self.lock()?.otps.remove(id);
        Ok(())
    }

    async fn insert_reset_token(&self, record: &ResetTokenRecord) -> Result<()> {
        self.lock()?
            .reset_tokens
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn find_active_reset_token(&self, token: &str) -> Result<Option<ResetTokenRecord>> {
        let inner = self.lock()?;
        Ok(inner
            .reset_tokens
            .values()
            .find(|r| r.token == token && !r.used)
            .cloned())
    }

    async fn mark_reset_token_used(&self, id: &str) -> Result<()> {
        if let Some(record) = self.lock()?.reset_tokens.get_mut(id) {
            record.used = true;
        }
        Ok(())
    }

    async fn delete_reset_token(&self, id: &str) -> Result<()> {
        self.lock()?.reset_tokens.remove(id);
        Ok(())
    }

    async fn delete_sibling_tokens(&self, email: &str, keep_id: &str) -> Result<u64> {
        let mut inner = self.lock()?;
        let before = inner.reset_tokens.len();
        inner
            .reset_tokens
            .retain(|id, r| r.email != email || id == keep_id);
        Ok((before - inner.reset_tokens.len()) as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.lock()?;
        let before = inner.otps.len() + inner.reset_tokens.len();
        inner.otps.retain(|_, r| r.expires_at >= now);
        inner.reset_tokens.retain(|_, r| r.expires_at >= now);
        Ok((before - inner.otps.len() - inner.reset_tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn otp_record(email: &str, created_at: DateTime<Utc>) -> OtpRecord {
        OtpRecord {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            otp_hash: "$2b$12$hash".to_string(),
            purpose: "password_reset".to_string(),
            attempts: 0,
            max_attempts: 5,
            used: false,
            created_at,
            expires_at: created_at + Duration::minutes(5),
        }
    }

    fn token_record(email: &str, token: &str) -> ResetTokenRecord {
        let now = Utc::now();
        ResetTokenRecord {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            token: token.to_string(),
            used: false,
            created_at: now,
            expires_at: now + Duration::minutes(10),
        }
    }

    #[tokio::test]
    async fn rate_limit_caps_attempts_within_window() {
        let store = MemoryStore::new();
        for _ in 0..3 {
            assert!(store
                .record_attempt("a@b.com", "request_otp", 3, Duration::minutes(15))
                .await
                .unwrap());
        }
        assert!(!store
            .record_attempt("a@b.com", "request_otp", 3, Duration::minutes(15))
            .await
            .unwrap());

        // Other keys are unaffected.
        assert!(store
            .record_attempt("a@b.com", "verify_otp", 10, Duration::minutes(15))
            .await
            .unwrap());
        assert!(store
            .record_attempt("c@d.com", "request_otp", 3, Duration::minutes(15))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn rate_limit_window_slides() {
        let store = MemoryStore::new();
        let window = Duration::minutes(15);
        let start = Utc::now();

        for i in 0..3 {
            assert!(store
                .record_attempt_at("a@b.com", "request_otp", 3, window, start + Duration::seconds(i))
                .unwrap());
        }
        assert!(!store
            .record_attempt_at("a@b.com", "request_otp", 3, window, start + Duration::minutes(1))
            .unwrap());

        // Once the first attempts age out of the trailing window, capacity
        // frees up again.
        assert!(store
            .record_attempt_at("a@b.com", "request_otp", 3, window, start + Duration::minutes(16))
            .unwrap());
    }

    #[tokio::test]
    async fn denied_attempts_are_not_recorded() {
        let store = MemoryStore::new();
        let window = Duration::minutes(15);
        let start = Utc::now();

        for _ in 0..3 {
            assert!(store
                .record_attempt_at("a@b.com", "request_otp", 3, window, start)
                .unwrap());
        }
        // Hammering while saturated must not extend the lockout.
        for i in 0..100 {
            assert!(!store
                .record_attempt_at("a@b.com", "request_otp", 3, window, start + Duration::seconds(i))
                .unwrap());
        }
        assert!(store
            .record_attempt_at("a@b.com", "request_otp", 3, window, start + Duration::minutes(16))
            .unwrap());
    }

    #[tokio::test]
    async fn invalidate_then_insert_keeps_one_active_record() {
        let store = MemoryStore::new();
        let first = otp_record("a@b.com", Utc::now());
        store.insert_otp(&first).await.unwrap();

        store
            .invalidate_active_otps("a@b.com", "password_reset")
            .await
            .unwrap();
        let second = otp_record("a@b.com", Utc::now() + Duration::seconds(1));
        store.insert_otp(&second).await.unwrap();

        let active = store
            .find_active_otp("a@b.com", "password_reset")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, second.id);
    }

    #[tokio::test]
    async fn find_active_otp_prefers_newest() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let older = otp_record("a@b.com", now);
        let newer = otp_record("a@b.com", now + Duration::seconds(30));
        store.insert_otp(&older).await.unwrap();
        store.insert_otp(&newer).await.unwrap();

        let active = store
            .find_active_otp("a@b.com", "password_reset")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, newer.id);
    }

    #[tokio::test]
    async fn increment_attempts_returns_new_count() {
        let store = MemoryStore::new();
        let record = otp_record("a@b.com", Utc::now());
        store.insert_otp(&record).await.unwrap();

        assert_eq!(
            store.increment_otp_attempts(&record.id).await.unwrap(),
            Some(1)
        );
        assert_eq!(
            store.increment_otp_attempts(&record.id).await.unwrap(),
            Some(2)
        );
        assert_eq!(store.increment_otp_attempts("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn mark_otp_used_is_idempotent() {
        let store = MemoryStore::new();
        let record = otp_record("a@b.com", Utc::now());
        store.insert_otp(&record).await.unwrap();

        store.mark_otp_used(&record.id).await.unwrap();
        store.mark_otp_used(&record.id).await.unwrap();
        assert!(store
            .find_active_otp("a@b.com", "password_reset")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn sibling_tokens_are_deleted_except_redeemed_one() {
        let store = MemoryStore::new();
        let kept = token_record("a@b.com", "token-1");
        let sibling = token_record("a@b.com", "token-2");
        let other_user = token_record("c@d.com", "token-3");
        store.insert_reset_token(&kept).await.unwrap();
        store.insert_reset_token(&sibling).await.unwrap();
        store.insert_reset_token(&other_user).await.unwrap();

        let removed = store
            .delete_sibling_tokens("a@b.com", &kept.id)
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store
            .find_active_reset_token("token-2")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_active_reset_token("token-3")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn delete_expired_sweeps_both_collections() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut stale_otp = otp_record("a@b.com", now - Duration::minutes(30));
        stale_otp.expires_at = now - Duration::minutes(25);
        let fresh_otp = otp_record("a@b.com", now);
        let mut stale_token = token_record("a@b.com", "stale");
        stale_token.expires_at = now - Duration::minutes(1);

        store.insert_otp(&stale_otp).await.unwrap();
        store.insert_otp(&fresh_otp).await.unwrap();
        store.insert_reset_token(&stale_token).await.unwrap();

        let removed = store.delete_expired(now).await.unwrap();
        assert_eq!(removed, 2);
        let active = store
            .find_active_otp("a@b.com", "password_reset")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, fresh_otp.id);
    }
}
