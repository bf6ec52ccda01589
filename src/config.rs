// config.rs
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_name: String,
    pub resend_api_key: String,
    pub mail_from: String,
    pub port: u16,
    pub host: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let resend_api_key = env::var("RESEND_API_KEY").unwrap_or_default();
        if resend_api_key.is_empty() {
            tracing::warn!("RESEND_API_KEY is not set; OTP emails will not be delivered");
        }

        AppConfig {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "resetdb".to_string()),
            resend_api_key,
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "Account Security <onboarding@resend.dev>".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("PORT must be a number"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
        }
    }
}
