use axum::{routing::post, Router};

use crate::{handlers::password_reset, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        // Request OTP for password reset
        .route(
            "/request-password-otp",
            post(password_reset::request_password_otp),
        )
        // Verify OTP, receive a short-lived reset token
        .route(
            "/verify-password-otp",
            post(password_reset::verify_password_otp),
        )
        // Redeem the reset token to set a new password
        .route(
            "/reset-password-with-token",
            post(password_reset::reset_password_with_token),
        )
}
