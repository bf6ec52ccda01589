use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::otp::OtpRecord;
use crate::storage::ResetStore;

/// Owns the OTP record lifecycle: creation, hashed storage, attempt
/// accounting, invalidation and single-use redemption. Plaintext codes are
/// never persisted; verification goes through bcrypt's own compare, which is
/// constant-time.
pub struct OtpService {
    store: Arc<dyn ResetStore>,
}

impl OtpService {
    pub fn new(store: Arc<dyn ResetStore>) -> Self {
        Self { store }
    }

    /// 6-digit code drawn uniformly from [100000, 999999]. `gen_range` on the
    /// thread-local CSPRNG samples without modulo bias.
    pub fn generate_code() -> String {
        let mut rng = rand::thread_rng();
        rng.gen_range(100_000..=999_999).to_string()
    }

    /// Marks any existing non-used record for the pair as used, so at most
    /// one OTP is ever active per `(email, purpose)`.
    pub async fn invalidate_active(&self, email: &str, purpose: &str) -> Result<()> {
        self.store.invalidate_active_otps(email, purpose).await
    }

    pub async fn issue(
        &self,
        email: &str,
        purpose: &str,
        code: &str,
        ttl: Duration,
        max_attempts: i32,
    ) -> Result<OtpRecord> {
        let otp_hash = hash(code, DEFAULT_COST)?;
        let now = Utc::now();
        let record = OtpRecord {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            otp_hash,
            purpose: purpose.to_string(),
            attempts: 0,
            max_attempts,
            used: false,
            created_at: now,
            expires_at: now + ttl,
        };
        self.store.insert_otp(&record).await?;
        Ok(record)
    }

    /// Newest active record regardless of expiry; the caller checks expiry so
    /// it can tell "expired" apart from "never existed".
    pub async fn fetch_active(&self, email: &str, purpose: &str) -> Result<Option<OtpRecord>> {
        self.store.find_active_otp(email, purpose).await
    }

    pub fn verify_code(&self, code: &str, record: &OtpRecord) -> Result<bool> {
        Ok(verify(code, &record.otp_hash)?)
    }

    /// Increments the attempt counter and returns the attempts remaining.
    /// When the budget is exhausted the record is deleted and becomes
    /// terminal: no future fetch will return it.
    pub async fn record_failed_attempt(&self, record: &OtpRecord) -> Result<i32> {
        let attempts = match self.store.increment_otp_attempts(&record.id).await? {
            Some(attempts) => attempts,
            // Record vanished underneath us (concurrent delete); terminal.
            None => return Ok(0),
        };
        if attempts >= record.max_attempts {
            self.store.delete_otp(&record.id).await?;
            return Ok(0);
        }
        Ok(record.max_attempts - attempts)
    }

    /// Single-use redemption; calling twice is a no-op, not an error.
    pub async fn consume(&self, record: &OtpRecord) -> Result<()> {
        self.store.mark_otp_used(&record.id).await
    }

    pub async fn delete(&self, record: &OtpRecord) -> Result<()> {
        self.store.delete_otp(&record.id).await
    }
}
