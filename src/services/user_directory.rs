use async_trait::async_trait;
use bcrypt::{hash, DEFAULT_COST};
use chrono::Utc;
use mongodb::bson::{doc, DateTime};
use mongodb::{Collection, Database};

use crate::errors::{AppError, Result};
use crate::models::user::User;

/// The identity store, seen through the two capabilities the reset protocol
/// needs: lookup by email and password update. User records are owned
/// elsewhere; this crate never mutates them beyond `update_password`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Stores a fresh hash of `new_password`; `confirm_email` additionally
    /// marks the address as verified (an OTP round-trip is proof of control).
    async fn update_password(
        &self,
        user: &User,
        new_password: &str,
        confirm_email: bool,
    ) -> Result<()>;
}

#[derive(Clone)]
pub struct MongoUserDirectory {
    db: Database,
}

impl MongoUserDirectory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }
}

#[async_trait]
impl UserDirectory for MongoUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = self.users().find_one(doc! { "email": email }).await?;
        Ok(user)
    }

    async fn update_password(
        &self,
        user: &User,
        new_password: &str,
        confirm_email: bool,
    ) -> Result<()> {
        let user_id = user._id.ok_or(AppError::UserNotFound)?;
        let password_hash = hash(new_password, DEFAULT_COST)?;

        let now = DateTime::from_chrono(Utc::now());
        let mut update = doc! {
            "password_hash": password_hash,
            "updated_at": now,
        };
        if confirm_email {
            update.insert("email_verified", true);
        }

        let result = self
            .users()
            .update_one(doc! { "_id": user_id }, doc! { "$set": update })
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::UserNotFound);
        }
        Ok(())
    }
}
