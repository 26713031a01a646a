use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use citabot::clock::SystemClock;
use citabot::config::AppConfig;
use citabot::db;
use citabot::handlers;
use citabot::services::classifier::gemini::GeminiClassifier;
use citabot::services::classifier::IntentClassifier;
use citabot::services::mailer::resend::ResendSender;
use citabot::services::mailer::{DisabledSender, NotificationSender};
use citabot::state::AppState;
use citabot::store::SqliteReservationStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let db = Arc::new(Mutex::new(conn));

    let classifier: Option<Box<dyn IntentClassifier>> = if config.gemini_api_key.is_empty() {
        tracing::info!("GEMINI_API_KEY not set, running without the intent classifier");
        None
    } else {
        tracing::info!("using Gemini classifier (model: {})", config.gemini_model);
        Some(Box::new(GeminiClassifier::new(
            &config.gemini_api_key,
            &config.gemini_model,
        )))
    };

    let mailer: Box<dyn NotificationSender> = if config.resend_api_key.is_empty() {
        tracing::info!("RESEND_API_KEY not set, confirmation emails disabled");
        Box::new(DisabledSender)
    } else {
        Box::new(ResendSender::new(&config.resend_api_key, &config.from_email))
    };

    let state = Arc::new(AppState {
        store: Arc::new(SqliteReservationStore::new(db.clone())),
        db,
        config: config.clone(),
        classifier,
        mailer,
        clock: Box::new(SystemClock),
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/chat", post(handlers::chat::chat))
        .route(
            "/api/availability/check",
            get(handlers::availability::check),
        )
        .route(
            "/api/availability/suggest",
            get(handlers::availability::suggest),
        )
        .route("/api/availability/next", get(handlers::availability::next))
        .route(
            "/api/availability/summary",
            get(handlers::availability::summary),
        )
        .route("/api/book", post(handlers::booking::book))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
