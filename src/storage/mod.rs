use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::errors::Result;
use crate::models::otp::OtpRecord;
use crate::models::reset_token::ResetTokenRecord;

pub mod memory;
pub mod mongo;

/// Persistence seam for the password-reset state machine. Every method is a
/// single atomic operation against the backing store; callers never compose
/// a read-check-write across two calls where a lost update would matter.
#[async_trait]
pub trait ResetStore: Send + Sync {
    /// Sliding-window rate limit: counts attempts for `(identifier, action)`
    /// within the trailing `window` and records this one if the count is
    /// still under `max_attempts`. Returns whether the attempt is allowed.
    /// Denied attempts are not recorded, so a saturated window drains on its
    /// own schedule.
    async fn record_attempt(
        &self,
        identifier: &str,
        action: &str,
        max_attempts: u32,
        window: Duration,
    ) -> Result<bool>;

    /// Marks every non-used OTP for `(email, purpose)` as used.
    async fn invalidate_active_otps(&self, email: &str, purpose: &str) -> Result<()>;

    async fn insert_otp(&self, record: &OtpRecord) -> Result<()>;

    /// Most recently created `used == false` record, regardless of expiry.
    /// Expiry is the caller's check so "expired" and "never existed" remain
    /// distinguishable internally.
    async fn find_active_otp(&self, email: &str, purpose: &str) -> Result<Option<OtpRecord>>;

    /// Atomically increments the attempt counter and returns the new value,
    /// or `None` if the record no longer exists.
    async fn increment_otp_attempts(&self, id: &str) -> Result<Option<i32>>;

    /// Idempotent: marking an already-used record again is a no-op.
    async fn mark_otp_used(&self, id: &str) -> Result<()>;

    async fn delete_otp(&self, id: &str) -> Result<()>;

    async fn insert_reset_token(&self, record: &ResetTokenRecord) -> Result<()>;

    /// Lookup is by token value; only `used == false` records are returned.
    async fn find_active_reset_token(&self, token: &str) -> Result<Option<ResetTokenRecord>>;

    async fn mark_reset_token_used(&self, id: &str) -> Result<()>;

    async fn delete_reset_token(&self, id: &str) -> Result<()>;

    /// Deletes every reset token for `email` except `keep_id`. Returns the
    /// number of siblings removed.
    async fn delete_sibling_tokens(&self, email: &str, keep_id: &str) -> Result<u64>;

    /// Storage hygiene: removes OTP and reset-token records whose expiry is
    /// past `now`, independent of `used` state. Returns the count removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

pub use memory::MemoryStore;
pub use mongo::MongoStore;
