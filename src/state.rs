use std::sync::Arc;

use crate::services::password_reset_service::PasswordResetService;

#[derive(Clone)]
pub struct AppState {
    pub reset_service: Arc<PasswordResetService>,
}

impl AppState {
    pub fn new(reset_service: Arc<PasswordResetService>) -> Self {
        AppState { reset_service }
    }
}
