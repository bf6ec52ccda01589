// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    #[error("Hashing error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Email error: {0}")]
    Email(String),

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Invalid OTP format")]
    InvalidOtpFormat,

    #[error("Too many attempts. Please try again later.")]
    RateLimited,

    #[error("Invalid or expired OTP")]
    OtpNotFound,

    #[error("OTP has expired. Please request a new one.")]
    OtpExpired,

    #[error("Incorrect OTP")]
    OtpIncorrect { remaining_attempts: i32 },

    #[error("Maximum verification attempts exceeded. Please request a new OTP.")]
    MaxAttemptsExceeded,

    #[error("Invalid or expired reset token")]
    TokenInvalid,

    #[error("Reset token has expired. Please start the password reset process again.")]
    TokenExpired,

    #[error("Password must be at least 8 characters long")]
    PasswordTooShort,

    #[error("Password must contain at least one uppercase letter, one lowercase letter, and one number")]
    PasswordTooWeak,

    #[error("User not found")]
    UserNotFound,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::MongoDB(_) | AppError::Bcrypt(_) | AppError::Storage(_) | AppError::Email(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::RateLimited | AppError::MaxAttemptsExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::UserNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn code(&self) -> Option<&'static str> {
        match self {
            AppError::RateLimited => Some("RATE_LIMIT_EXCEEDED"),
            AppError::OtpNotFound => Some("OTP_NOT_FOUND"),
            AppError::OtpExpired => Some("OTP_EXPIRED"),
            AppError::OtpIncorrect { .. } => Some("OTP_INCORRECT"),
            AppError::MaxAttemptsExceeded => Some("MAX_ATTEMPTS_EXCEEDED"),
            AppError::TokenInvalid => Some("TOKEN_INVALID"),
            AppError::TokenExpired => Some("TOKEN_EXPIRED"),
            AppError::PasswordTooShort => Some("PASSWORD_TOO_SHORT"),
            AppError::PasswordTooWeak => Some("PASSWORD_TOO_WEAK"),
            AppError::UserNotFound => Some("USER_NOT_FOUND"),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal faults are logged in full but never leak detail to the caller.
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal error: {}", self);
            let body = Json(json!({ "error": "Internal server error" }));
            return (status, body).into_response();
        }

        let mut body = json!({ "error": self.to_string() });
        if let Some(code) = self.code() {
            body["code"] = json!(code);
        }
        if let AppError::OtpIncorrect { remaining_attempts } = &self {
            body["remaining_attempts"] = json!(remaining_attempts);
        }

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
