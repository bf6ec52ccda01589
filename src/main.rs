use axum::{http::Method, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use reset_api::config::AppConfig;
use reset_api::database::connection::get_db_client;
use reset_api::routes;
use reset_api::services::cleanup_service::CleanupService;
use reset_api::services::email_service::ResendEmailSender;
use reset_api::services::password_reset_service::PasswordResetService;
use reset_api::services::user_directory::MongoUserDirectory;
use reset_api::state::AppState;
use reset_api::storage::{MongoStore, ResetStore};

const CLEANUP_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = AppConfig::from_env();
    let db = get_db_client(&config).await;

    let store: Arc<dyn ResetStore> = Arc::new(MongoStore::new(db.clone()));
    let users = Arc::new(MongoUserDirectory::new(db));
    let mailer = Arc::new(ResendEmailSender::new(&config));

    let reset_service = Arc::new(PasswordResetService::new(store.clone(), users, mailer));
    let app_state = AppState::new(reset_service);

    let cleanup = Arc::new(CleanupService::new(store));
    tokio::spawn(cleanup.start(std::time::Duration::from_secs(CLEANUP_INTERVAL_SECS)));

    let app = build_router(app_state);
    start_server(app, &config).await;
}

fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .merge(routes::password_reset::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

async fn start_server(app: Router, config: &AppConfig) {
    let addr = SocketAddr::from((
        config.host.parse::<std::net::IpAddr>().unwrap_or_else(|_| [0, 0, 0, 0].into()),
        config.port,
    ));

    tracing::info!("Server starting on {}", addr);

    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    }
}

async fn root_handler() -> &'static str {
    "Password Reset API"
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
