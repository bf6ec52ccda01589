use chrono::{Duration, Utc};
use std::sync::Arc;
use validator::ValidateEmail;

use crate::errors::{AppError, Result};
use crate::models::reset_token::ResetTokenRecord;
use crate::services::email_service::{password_reset_email, EmailSender};
use crate::services::otp_service::OtpService;
use crate::services::rate_limit_service::RateLimiter;
use crate::services::reset_token_service::ResetTokenService;
use crate::services::user_directory::UserDirectory;
use crate::storage::ResetStore;

pub const PASSWORD_RESET_PURPOSE: &str = "password_reset";

const REQUEST_OTP_ACTION: &str = "request_otp";
const VERIFY_OTP_ACTION: &str = "verify_otp";
const REQUEST_OTP_MAX_ATTEMPTS: u32 = 3;
const VERIFY_OTP_MAX_ATTEMPTS: u32 = 10;
const RATE_LIMIT_WINDOW_MINUTES: i64 = 15;

pub const OTP_TTL_MINUTES: i64 = 5;
pub const OTP_MAX_ATTEMPTS: i32 = 5;
pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;

/// Latency padding for the user-absent branch of `request_otp`, roughly
/// matching the success path so response timing does not betray whether an
/// account exists.
const USER_ABSENT_DELAY_MS: u64 = 100;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Orchestrates the three protocol steps against the ledgers, the identity
/// store and the mailer.
///
/// `request_otp` deliberately collapses "rate limited", "no such account"
/// and "OTP sent" into one observable outcome; the caller cannot probe for
/// account existence. `verify_otp` and `reset_password` surface their
/// failures distinctly, since by those stages the caller already holds a
/// real OTP or token.
pub struct PasswordResetService {
    users: Arc<dyn UserDirectory>,
    mailer: Arc<dyn EmailSender>,
    rate_limiter: RateLimiter,
    otps: OtpService,
    reset_tokens: ResetTokenService,
}

impl PasswordResetService {
    pub fn new(
        store: Arc<dyn ResetStore>,
        users: Arc<dyn UserDirectory>,
        mailer: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            users,
            mailer,
            rate_limiter: RateLimiter::new(store.clone()),
            otps: OtpService::new(store.clone()),
            reset_tokens: ResetTokenService::new(store),
        }
    }

    fn rate_limit_window() -> Duration {
        Duration::minutes(RATE_LIMIT_WINDOW_MINUTES)
    }

    /// Step 1: issue an OTP and email it. Returns `Ok(())` for every
    /// terminal branch except input validation and internal faults.
    pub async fn request_otp(&self, email: &str) -> Result<()> {
        let email = normalize_email(email);
        if !email.validate_email() {
            return Err(AppError::InvalidEmail);
        }

        let allowed = self
            .rate_limiter
            .allow(
                &email,
                REQUEST_OTP_ACTION,
                REQUEST_OTP_MAX_ATTEMPTS,
                Self::rate_limit_window(),
            )
            .await?;
        if !allowed {
            return Ok(());
        }

        let Some(_user) = self.users.find_by_email(&email).await? else {
            tokio::time::sleep(std::time::Duration::from_millis(USER_ABSENT_DELAY_MS)).await;
            return Ok(());
        };

        self.otps
            .invalidate_active(&email, PASSWORD_RESET_PURPOSE)
            .await?;

        let code = OtpService::generate_code();
        self.otps
            .issue(
                &email,
                PASSWORD_RESET_PURPOSE,
                &code,
                Duration::minutes(OTP_TTL_MINUTES),
                OTP_MAX_ATTEMPTS,
            )
            .await?;

        // The OTP is durably stored at this point; a transport hiccup must
        // not surface as a different response to the caller.
        let (subject, html) = password_reset_email(&code);
        if let Err(e) = self.mailer.send(&email, &subject, &html).await {
            tracing::error!("Failed to send OTP email: {}", e);
        }

        Ok(())
    }

    /// Step 2: check the OTP and trade it for a reset token.
    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<ResetTokenRecord> {
        let email = normalize_email(email);
        let otp = otp.trim();
        if !email.validate_email() {
            return Err(AppError::InvalidEmail);
        }
        if otp.len() != 6 || !otp.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::InvalidOtpFormat);
        }

        let allowed = self
            .rate_limiter
            .allow(
                &email,
                VERIFY_OTP_ACTION,
                VERIFY_OTP_MAX_ATTEMPTS,
                Self::rate_limit_window(),
            )
            .await?;
        if !allowed {
            return Err(AppError::RateLimited);
        }

        let record = self
            .otps
            .fetch_active(&email, PASSWORD_RESET_PURPOSE)
            .await?
            .ok_or(AppError::OtpNotFound)?;

        if record.is_expired(Utc::now()) {
            self.otps.delete(&record).await?;
            return Err(AppError::OtpExpired);
        }

        if record.attempts_exhausted() {
            self.otps.delete(&record).await?;
            return Err(AppError::MaxAttemptsExceeded);
        }

        if !self.otps.verify_code(otp, &record)? {
            let remaining = self.otps.record_failed_attempt(&record).await?;
            if remaining == 0 {
                return Err(AppError::MaxAttemptsExceeded);
            }
            return Err(AppError::OtpIncorrect {
                remaining_attempts: remaining,
            });
        }

        let token = self
            .reset_tokens
            .issue(&email, Duration::minutes(RESET_TOKEN_TTL_MINUTES))
            .await?;
        self.otps.consume(&record).await?;

        Ok(token)
    }

    /// Step 3: redeem the reset token and set the new password. Token
    /// unguessability is the brute-force control here, not a rate limit.
    pub async fn reset_password(&self, reset_token: &str, new_password: &str) -> Result<()> {
        validate_password_strength(new_password)?;

        let record = self
            .reset_tokens
            .fetch_active(reset_token.trim())
            .await?
            .ok_or(AppError::TokenInvalid)?;

        if record.is_expired(Utc::now()) {
            self.reset_tokens.delete(&record).await?;
            return Err(AppError::TokenExpired);
        }

        // The token referenced a user that disappeared: an internal
        // inconsistency, not a caller input error.
        let user = self
            .users
            .find_by_email(&record.email)
            .await?
            .ok_or(AppError::UserNotFound)?;

        self.users.update_password(&user, new_password, true).await?;

        self.reset_tokens.consume(&record).await?;
        self.reset_tokens
            .invalidate_siblings(&record.email, &record.id)
            .await?;

        Ok(())
    }
}

fn validate_password_strength(password: &str) -> Result<()> {
    if password.chars().count() < 8 {
        return Err(AppError::PasswordTooShort);
    }
    let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_uppercase || !has_lowercase || !has_digit {
        return Err(AppError::PasswordTooWeak);
    }
    Ok(())
}
