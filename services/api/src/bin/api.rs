//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{AdvisorModels, DbAdapter, OpenAiAdvisorAdapter},
    config::Config,
    error::ApiError,
    web::{self, rest::ApiDoc, Adapters, AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
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

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the AI Adapter ---
    let models = AdvisorModels {
        summary: config.summary_model.clone(),
        suggestion: config.suggestion_model.clone(),
        medical_record: config.record_model.clone(),
    };
    let advisor = match &config.openai_api_key {
        Some(key) => {
            let client = Client::with_config(OpenAIConfig::new().with_api_key(key));
            OpenAiAdvisorAdapter::new(client, models)
        }
        None => {
            warn!("OPENAI_API_KEY is not set; AI assistance is disabled.");
            OpenAiAdvisorAdapter::disabled(models)
        }
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(Adapters {
        chats: db_adapter.clone(),
        presence: db_adapter.clone(),
        profiles: db_adapter.clone(),
        identity: db_adapter,
        llm: Arc::new(advisor),
    }));

    // Counts left behind by a previous process would never come back down.
    app_state.presence.set_all_offline().await?;

    // --- 5. Create the Web Router ---
    let origin = config.frontend_url.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid FRONTEND_URL '{}': {}", config.frontend_url, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    let app = Router::new()
        .merge(web::router(app_state.clone()).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    app_state.tasks.drain().await;
    Ok(())
}
