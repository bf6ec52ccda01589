use async_trait::async_trait;
use reqwest::Client;

use crate::config::AppConfig;
use crate::errors::{AppError, Result};

const RESEND_API_URL: &str = "https://api.resend.com/emails";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()>;
}

/// Outbound email via the Resend HTTP API.
#[derive(Clone)]
pub struct ResendEmailSender {
    client: Client,
    api_key: String,
    from: String,
}

impl ResendEmailSender {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.resend_api_key.clone(),
            from: config.mail_from.clone(),
        }
    }
}

#[async_trait]
impl EmailSender for ResendEmailSender {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(AppError::Email("RESEND_API_KEY is not set".to_string()));
        }

        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from,
                "to": [to],
                "subject": subject,
                "html": html,
            }))
            .send()
            .await
            .map_err(|e| AppError::Email(format!("Resend API error: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::Email(format!(
                "Email sending failed with status: {}",
                response.status()
            )))
        }
    }
}

/// Subject and HTML body for the OTP email.
pub fn password_reset_email(code: &str) -> (String, String) {
    let subject = "Your password reset code".to_string();
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <style>
    body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; background: #f5f5f5; margin: 0; padding: 20px; }}
    .container {{ max-width: 600px; margin: 0 auto; background: white; border-radius: 16px; padding: 40px; }}
    .otp-box {{ background: #f0f9ff; border: 2px dashed #2196F3; border-radius: 12px; padding: 30px; text-align: center; margin: 30px 0; }}
    .otp-code {{ font-size: 42px; font-weight: 700; color: #1976D2; letter-spacing: 8px; font-family: 'Courier New', monospace; }}
    .warning {{ background: #fff3e0; border-left: 4px solid #ff9800; padding: 16px; margin: 20px 0; border-radius: 4px; }}
    .footer {{ text-align: center; color: #666; font-size: 14px; margin-top: 30px; padding-top: 20px; border-top: 1px solid #eee; }}
  </style>
</head>
<body>
  <div class="container">
    <h2 style="text-align: center; color: #333;">Password reset requested</h2>
    <p style="color: #666; line-height: 1.6;">
      We received a request to reset the password for your account.
      Use the code below to continue:
    </p>
    <div class="otp-box">
      <p style="margin: 0 0 10px; color: #666; font-size: 14px;">YOUR VERIFICATION CODE</p>
      <div class="otp-code">{code}</div>
      <p style="margin: 10px 0 0; color: #999; font-size: 12px;">This code is valid for 5 minutes</p>
    </div>
    <div class="warning">
      <strong>Security notice:</strong> never share this code with anyone.
      If you did not request a password reset, you can ignore this email.
    </div>
    <div class="footer">
      <p>This email was sent automatically, please do not reply.</p>
    </div>
  </div>
</body>
</html>"#
    );
    (subject, html)
}
