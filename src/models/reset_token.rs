use chrono::{DateTime, Utc};
use mongodb::bson;
use serde::{Deserialize, Serialize};

/// A single-use password-reset credential handed out after OTP verification.
/// The token value is an unguessable 128-bit identifier and doubles as the
/// lookup key; it is only ever transmitted once, to the verified caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetTokenRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub token: String,
    pub used: bool,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}

impl ResetTokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
