use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mongodb::bson::{doc, Document};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};

use crate::errors::Result;
use crate::models::otp::OtpRecord;
use crate::models::reset_token::ResetTokenRecord;
use crate::storage::ResetStore;

const OTP_COLLECTION: &str = "otp_tokens";
const RESET_TOKEN_COLLECTION: &str = "reset_tokens";
const RATE_LIMIT_COLLECTION: &str = "rate_limits";

/// Production store. Atomicity comes from single-command updates: the rate
/// limiter is one aggregation-pipeline `findAndModify`, attempt accounting is
/// one `$inc`, invalidation is one `updateMany`.
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn otp_tokens(&self) -> Collection<OtpRecord> {
        self.db.collection(OTP_COLLECTION)
    }

    fn reset_tokens(&self) -> Collection<ResetTokenRecord> {
        self.db.collection(RESET_TOKEN_COLLECTION)
    }

    fn rate_limits(&self) -> Collection<Document> {
        self.db.collection(RATE_LIMIT_COLLECTION)
    }
}

#[async_trait]
impl ResetStore for MongoStore {
    async fn record_attempt(
        &self,
        identifier: &str,
        action: &str,
        max_attempts: u32,
        window: Duration,
    ) -> Result<bool> {
        let now = Utc::now();
        let now_bson = mongodb::bson::DateTime::from_chrono(now);
        let cutoff_bson = mongodb::bson::DateTime::from_chrono(now - window);

        // One findAndModify: drop timestamps that fell out of the window,
        // decide against the cap, and append the new attempt only when the
        // decision is positive. Concurrent callers for the same key serialize
        // on the document, so the cap cannot be overshot.
        let pipeline = vec![
            doc! { "$set": { "attempts": {
                "$filter": {
                    "input": { "$ifNull": ["$attempts", []] },
                    "as": "ts",
                    "cond": { "$gt": ["$$ts", cutoff_bson] },
                }
            }}},
            doc! { "$set": { "allowed": {
                "$lt": [{ "$size": "$attempts" }, max_attempts as i64]
            }}},
            doc! { "$set": { "attempts": {
                "$cond": [
                    "$allowed",
                    { "$concatArrays": ["$attempts", [now_bson]] },
                    "$attempts",
                ]
            }}},
        ];

        let updated = self
            .rate_limits()
            .find_one_and_update(
                doc! { "identifier": identifier, "action": action },
                pipeline,
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?;

        Ok(updated
            .map(|d| d.get_bool("allowed").unwrap_or(false))
            .unwrap_or(false))
    }

    async fn invalidate_active_otps(&self, email: &str, purpose: &str) -> Result<()> {
        self.otp_tokens()
            .update_many(
                doc! { "email": email, "purpose": purpose, "used": false },
                doc! { "$set": { "used": true } },
            )
            .await?;
        Ok(())
    }

    async fn insert_otp(&self, record: &OtpRecord) -> Result<()> {
        self.otp_tokens().insert_one(record).await?;
        Ok(())
    }

    async fn find_active_otp(&self, email: &str, purpose: &str) -> Result<Option<OtpRecord>> {
        let record = self
            .otp_tokens()
            .find_one(doc! { "email": email, "purpose": purpose, "used": false })
            .sort(doc! { "created_at": -1 })
            .await?;
        Ok(record)
    }

    async fn increment_otp_attempts(&self, id: &str) -> Result<Option<i32>> {
        let updated = self
            .otp_tokens()
            .find_one_and_update(doc! { "_id": id }, doc! { "$inc": { "attempts": 1 } })
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated.map(|r| r.attempts))
    }

    async fn mark_otp_used(&self, id: &str) -> Result<()> {
        self.otp_tokens()
            .update_one(doc! { "_id": id }, doc! { "$set": { "used": true } })
            .await?;
        Ok(())
    }

    async fn delete_otp(&self, id: &str) -> Result<()> {
        self.otp_tokens().delete_one(doc! { "_id": id }).await?;
        Ok(())
    }

    async fn insert_reset_token(&self, record: &ResetTokenRecord) -> Result<()> {
        self.reset_tokens().insert_one(record).await?;
        Ok(())
    }

    async fn find_active_reset_token(&self, token: &str) -> Result<Option<ResetTokenRecord>> {
        let record = self
            .reset_tokens()
            .find_one(doc! { "token": token, "used": false })
            .await?;
        Ok(record)
    }

    async fn mark_reset_token_used(&self, id: &str) -> Result<()> {
        self.reset_tokens()
            .update_one(doc! { "_id": id }, doc! { "$set": { "used": true } })
            .await?;
        Ok(())
    }

    async fn delete_reset_token(&self, id: &str) -> Result<()> {
        self.reset_tokens().delete_one(doc! { "_id": id }).await?;
        Ok(())
    }

    async fn delete_sibling_tokens(&self, email: &str, keep_id: &str) -> Result<u64> {
        let result = self
            .reset_tokens()
            .delete_many(doc! { "email": email, "_id": { "$ne": keep_id } })
            .await?;
        Ok(result.deleted_count)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = mongodb::bson::DateTime::from_chrono(now);
        let otps = self
            .otp_tokens()
            .delete_many(doc! { "expires_at": { "$lt": cutoff } })
            .await?;
        let tokens = self
            .reset_tokens()
            .delete_many(doc! { "expires_at": { "$lt": cutoff } })
            .await?;
        Ok(otps.deleted_count + tokens.deleted_count)
    }
}
