//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        ConsoleDispatcher, ContactRouter, DbAdapter, MemoryAdapter, ResendEmailDispatcher,
        TwilioSmsDispatcher,
    },
    config::{Config, ConfigError},
    error::ApiError,
    web::{self, rest::ApiDoc, state::AppState, sweep_task::sweep_process},
};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use study_core::{CodeDispatcher, NotebookStore, SystemClock, UserStore};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Storage ---
    let (users, notebook_store): (Arc<dyn UserStore>, Arc<dyn NotebookStore>) =
        match &config.database_url {
            Some(database_url) => {
                info!("Connecting to database...");
                let db_pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(database_url)
                    .await?;
                let db_adapter = Arc::new(DbAdapter::new(db_pool));
                info!("Running database migrations...");
                db_adapter.run_migrations().await?;
                info!("Database migrations complete.");
                (db_adapter.clone(), db_adapter)
            }
            None => {
                warn!("DATABASE_URL is not set; using in-memory storage. Data will not survive a restart.");
                let memory = Arc::new(MemoryAdapter::new());
                (memory.clone(), memory)
            }
        };

    // --- 3. Initialize Code Dispatchers ---
    let ttl_minutes = config.otp_ttl_secs / 60;
    let http_client = reqwest::Client::new();

    let email: Arc<dyn CodeDispatcher> = match &config.email {
        Some(settings) => Arc::new(ResendEmailDispatcher::new(
            http_client.clone(),
            settings.clone(),
            ttl_minutes,
        )),
        None => {
            warn!("RESEND_API_KEY is not set; email codes will be written to the log.");
            Arc::new(ConsoleDispatcher::new(ttl_minutes))
        }
    };
    let sms: Arc<dyn CodeDispatcher> = match &config.sms {
        Some(settings) => Arc::new(TwilioSmsDispatcher::new(
            http_client,
            settings.clone(),
            ttl_minutes,
        )),
        None => {
            warn!("Twilio is not configured; SMS codes will be written to the log.");
            Arc::new(ConsoleDispatcher::new(ttl_minutes))
        }
    };
    let dispatcher = Arc::new(ContactRouter::new(email, sms));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        users,
        notebook_store,
        dispatcher,
        Arc::new(SystemClock),
    ));

    // --- 5. Spawn the Pending Verification Sweeper ---
    let cancellation_token = CancellationToken::new();
    let sweeper = tokio::spawn(sweep_process(
        app_state.pending_store(),
        Duration::from_secs(config.otp_sweep_interval_secs),
        cancellation_token.clone(),
    ));

    // --- 6. Create the Web Router ---
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string())
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    let app = Router::new()
        .merge(web::router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let shutdown_token = cancellation_token.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received");
        shutdown_token.cancel();
    })
    .await?;

    cancellation_token.cancel();
    if let Err(e) = sweeper.await {
        warn!("Sweeper task ended abnormally: {:?}", e);
    }
    Ok(())
}
