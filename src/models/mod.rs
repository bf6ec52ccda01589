pub mod otp;
pub mod reset_token;
pub mod user;
