use chrono::{DateTime, Utc};
use mongodb::bson;
use serde::{Deserialize, Serialize};

/// A stored one-time passcode. Only the bcrypt digest of the code is
/// persisted; the plaintext exists in memory just long enough to be mailed.
///
/// At most one record with `used == false` may exist per `(email, purpose)`:
/// issuing a new OTP invalidates the previous active one first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub otp_hash: String,
    pub purpose: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub used: bool,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}

impl OtpRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}
