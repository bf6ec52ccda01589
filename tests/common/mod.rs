use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

use reset_api::models::user::User;
use reset_api::routes;
use reset_api::services::email_service::EmailSender;
use reset_api::services::password_reset_service::PasswordResetService;
use reset_api::services::user_directory::UserDirectory;
use reset_api::state::AppState;
use reset_api::storage::MemoryStore;
use reset_api::{AppError, Result};

/// Email sender that records messages instead of delivering them.
#[derive(Default)]
pub struct CapturingEmailSender {
    pub sent: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl EmailSender for CapturingEmailSender {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), html.to_string()));
        Ok(())
    }
}

/// Fixed user directory seeded with known accounts; records password updates.
#[derive(Default)]
pub struct StaticUserDirectory {
    users: Mutex<HashMap<String, User>>,
    pub password_updates: Mutex<Vec<(String, String, bool)>>,
}

impl StaticUserDirectory {
    pub fn with_users(emails: &[&str]) -> Self {
        let users = emails
            .iter()
            .map(|email| {
                (
                    email.to_string(),
                    User {
                        _id: Some(ObjectId::new()),
                        email: email.to_string(),
                        password_hash: "$2b$12$previous-hash".to_string(),
                        email_verified: false,
                        created_at: Utc::now(),
                        updated_at: Utc::now(),
                    },
                )
            })
            .collect();
        Self {
            users: Mutex::new(users),
            password_updates: Mutex::new(Vec::new()),
        }
    }

    pub fn email_verified(&self, email: &str) -> bool {
        self.users
            .lock()
            .unwrap()
            .get(email)
            .map(|u| u.email_verified)
            .unwrap_or(false)
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().get(email).cloned())
    }

    async fn update_password(
        &self,
        user: &User,
        new_password: &str,
        confirm_email: bool,
    ) -> Result<()> {
        let mut users = self.users.lock().unwrap();
        let stored = users.get_mut(&user.email).ok_or(AppError::UserNotFound)?;
        stored.password_hash = format!("$2b$12$rehash-of-{}", new_password);
        if confirm_email {
            stored.email_verified = true;
        }
        self.password_updates.lock().unwrap().push((
            user.email.clone(),
            new_password.to_string(),
            confirm_email,
        ));
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<CapturingEmailSender>,
    pub users: Arc<StaticUserDirectory>,
}

pub fn spawn_app(known_emails: &[&str]) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let mailer = Arc::new(CapturingEmailSender::default());
    let users = Arc::new(StaticUserDirectory::with_users(known_emails));

    let reset_service = Arc::new(PasswordResetService::new(
        store.clone(),
        users.clone(),
        mailer.clone(),
    ));
    let router = Router::new()
        .merge(routes::password_reset::routes())
        .with_state(AppState::new(reset_service));

    TestApp {
        router,
        store,
        mailer,
        users,
    }
}

pub async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// Pulls the 6-digit code out of a captured OTP email body.
pub fn extract_code(html: &str) -> String {
    html.as_bytes()
        .windows(6)
        .find(|w| w.iter().all(|b| b.is_ascii_digit()))
        .map(|w| String::from_utf8_lossy(w).into_owned())
        .expect("no 6-digit code in email body")
}

/// Last code mailed to anyone by this app.
pub fn last_mailed_code(app: &TestApp) -> String {
    let sent = app.mailer.sent.lock().unwrap();
    let (_, _, html) = sent.last().expect("no email was sent");
    extract_code(html)
}
