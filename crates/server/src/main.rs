//! Enquete-rs server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, http::HeaderValue, middleware};
use enquete_api::{RateLimiterState, middleware::AppState, router as api_router};
use enquete_common::Config;
use enquete_core::{
    AuthService, CommentService, ModerationService, PollService, UserService,
    scheduler::{SchedulerConfig, spawn_expiration_sweep},
};
use enquete_db::repositories::{
    CommentRepository, PollOptionRepository, PollRepository, ReportRepository, UserRepository,
    VoteRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    match origin.and_then(|o| o.parse::<HeaderValue>().ok()) {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env before anything reads the environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "enquete=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting enquete-rs server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = enquete_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    enquete_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let db = Arc::new(db);
    let user_repo = UserRepository::new(Arc::clone(&db));
    let poll_repo = PollRepository::new(Arc::clone(&db));
    let option_repo = PollOptionRepository::new(Arc::clone(&db));
    let vote_repo = VoteRepository::new(Arc::clone(&db));
    let comment_repo = CommentRepository::new(Arc::clone(&db));
    let report_repo = ReportRepository::new(Arc::clone(&db));

    // Initialize services
    let auth_service = AuthService::new(&config)?;
    let user_service = UserService::new(user_repo);
    let poll_service = PollService::new(poll_repo.clone(), option_repo, vote_repo);
    let comment_service = CommentService::new(comment_repo, poll_repo.clone());
    let moderation_service = ModerationService::new(report_repo, poll_repo);

    // Start the expiration sweep (runs once eagerly, then hourly)
    let sweep_handle = spawn_expiration_sweep(poll_service.clone(), SchedulerConfig::default());

    // Initialize the API rate limiter (in-memory; swap the store for
    // multi-instance deployments)
    let rate_limiter = RateLimiterState::in_memory();

    // Create app state
    let state = AppState {
        auth_service,
        user_service,
        poll_service,
        comment_service,
        moderation_service,
    };

    // Build router
    let app = Router::new()
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            enquete_api::rate_limit::rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            enquete_api::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config.server.cors_origin.as_deref()))
        .with_state(state);

    // Start server with graceful shutdown
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the sweep before exiting
    sweep_handle.abort();

    info!("Server shutdown complete");
    Ok(())
}
