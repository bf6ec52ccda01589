pub mod cleanup_service;
pub mod email_service;
pub mod otp_service;
pub mod password_reset_service;
pub mod rate_limit_service;
pub mod reset_token_service;
pub mod user_directory;
