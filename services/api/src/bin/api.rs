//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, OpenAiFaqAdapter, TokenIdentityAdapter},
    config::Config,
    error::ApiError,
    web::{api_router, rest::ApiDoc, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn generation_client(config: &Config) -> Result<Client<OpenAIConfig>, ApiError> {
    if config.generation_base_url.is_none() && config.openai_api_key.is_none() {
        return Err(ApiError::Startup(
            "Either OPENAI_API_KEY or GENERATION_BASE_URL is required".to_string(),
        ));
    }
    let mut openai_config = OpenAIConfig::new();
    if let Some(base_url) = &config.generation_base_url {
        info!("Using generation endpoint at {}", base_url);
        openai_config = openai_config.with_api_base(base_url);
    }
    if let Some(api_key) = &config.openai_api_key {
        openai_config = openai_config.with_api_key(api_key);
    }
    Ok(Client::with_config(openai_config))
}

fn cors_layer(config: &Config) -> Result<CorsLayer, ApiError> {
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Startup(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]))
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Configuration and logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!(
        model = %config.generation.model,
        max_faqs = config.generation.max_faqs,
        timeout = ?config.generation.timeout,
        "Configuration loaded."
    );

    // --- 2. Database ---
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    db_adapter.run_migrations().await?;
    info!("Database ready; migrations applied.");

    // --- 3. Adapters and shared state ---
    let generator = Arc::new(OpenAiFaqAdapter::new(generation_client(&config)?));
    let identity = Arc::new(TokenIdentityAdapter::new(
        &config.jwt_secret,
        db_adapter.clone(),
    ));
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        generator,
        identity,
    });

    // --- 4. Router ---
    let app = Router::new()
        .merge(api_router(app_state).layer(cors_layer(&config)?))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Serve ---
    info!("Listening on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
