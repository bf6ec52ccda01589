use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::state::AppState;

/// Generic response for `request_otp`: identical for "sent", "rate limited"
/// and "no such account", so responses cannot be used to enumerate emails.
const GENERIC_OTP_MESSAGE: &str = "If the email exists, an OTP has been sent";

// Request DTOs
#[derive(Debug, Deserialize)]
pub struct RequestOtpRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub reset_token: String,
    pub new_password: String,
}

// Response DTOs
#[derive(Debug, Serialize)]
pub struct RequestOtpResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyOtpResponse {
    pub success: bool,
    pub reset_token: String,
    pub expires_at: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ResetPasswordResponse {
    pub success: bool,
    pub message: String,
    pub email_verified: bool,
}

// 1. Request password reset OTP
pub async fn request_password_otp(
    State(state): State<AppState>,
    Json(req): Json<RequestOtpRequest>,
) -> Result<Json<RequestOtpResponse>> {
    state.reset_service.request_otp(&req.email).await?;

    Ok(Json(RequestOtpResponse {
        success: true,
        message: GENERIC_OTP_MESSAGE.to_string(),
    }))
}

// 2. Verify OTP, hand out a reset token
pub async fn verify_password_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>> {
    let token = state.reset_service.verify_otp(&req.email, &req.otp).await?;

    Ok(Json(VerifyOtpResponse {
        success: true,
        reset_token: token.token,
        expires_at: token.expires_at.to_rfc3339(),
        message: "OTP verified successfully".to_string(),
    }))
}

// 3. Redeem the reset token, set the new password
pub async fn reset_password_with_token(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<ResetPasswordResponse>> {
    state
        .reset_service
        .reset_password(&req.reset_token, &req.new_password)
        .await?;

    Ok(Json(ResetPasswordResponse {
        success: true,
        message: "Password has been reset successfully".to_string(),
        email_verified: true,
    }))
}
