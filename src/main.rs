//! Monument concierge - historical monument chat agent
//!
//! Answers monument questions in chat and e-mails an expanded guide once the
//! user has verified their address with a one-time passcode.

mod api;
mod config;
mod db;
mod delivery;
mod extract;
mod knowledge;
mod passcode;
mod runtime;
mod state_machine;

use api::{create_router, AppState};
use config::Config;
use db::Database;
use delivery::{LogDelivery, SendGridDelivery};
use knowledge::{
    AnswerService, CatalogAnswers, CatalogKnowledge, LoggingAnswers, MonumentCatalog, OpenAiAnswers,
};
use runtime::{ConversationRuntime, DatabaseStorage, DeliveryGateway};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "monument_concierge=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = Config::from_env();

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Initialize database
    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    // Housekeeping: expired passcodes and abandoned sessions
    let now = chrono::Utc::now();
    let session_cutoff = chrono::Duration::try_hours(config.session_ttl_hours)
        .and_then(|ttl| now.checked_sub_signed(ttl))
        .ok_or("CONCIERGE_SESSION_TTL_HOURS is out of range")?;
    let stats = db.purge_expired(now, session_cutoff)?;
    tracing::info!(
        passcodes = stats.passcodes,
        sessions = stats.sessions,
        "Purged expired records"
    );

    // Knowledge: catalog ranking plus model or catalog-text answers
    let catalog = MonumentCatalog::load(&config.catalog_path)?;
    tracing::info!(
        path = %config.catalog_path.display(),
        monuments = catalog.len(),
        "Monument catalog loaded"
    );

    let answers: Arc<dyn AnswerService> = match config.openai.clone() {
        Some(openai) => {
            tracing::info!(model = %openai.model, "Using chat-completions answers");
            Arc::new(LoggingAnswers::new(Arc::new(OpenAiAnswers::new(openai))))
        }
        None => {
            tracing::warn!("OPENAI_API_KEY not set; answers are composed from catalog text");
            Arc::new(LoggingAnswers::new(Arc::new(CatalogAnswers)))
        }
    };
    let knowledge = CatalogKnowledge::new(Arc::new(catalog), answers);

    // Delivery
    let delivery: Arc<dyn DeliveryGateway> = match config.sendgrid.clone() {
        Some(sendgrid) => {
            tracing::info!(sender = %sendgrid.sender, "Using SendGrid delivery");
            Arc::new(SendGridDelivery::new(sendgrid))
        }
        None => {
            tracing::warn!("SENDGRID_API_KEY not set; outbound e-mail is only logged");
            Arc::new(LogDelivery)
        }
    };

    // Create application state
    let runtime = ConversationRuntime::new(
        DatabaseStorage::new(db.clone()),
        knowledge,
        delivery,
        config.runtime_settings(),
    );
    let state = AppState::new(db, Arc::new(runtime));

    // Create router
    let origin = match config.cors_origin.as_deref() {
        Some(origin) => AllowOrigin::exact(origin.parse()?),
        None => AllowOrigin::any(),
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Monument concierge listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
