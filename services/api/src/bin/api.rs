//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{db::DbAdapter, groq_llm::GroqCompletionAdapter},
    config::Config,
    error::ApiError,
    web::{
        chat_handler, chat_stats_handler, clear_session_handler, generate_content_handler,
        get_content_handler, health_handler, history_handler, rest::ApiDoc, root_handler,
        state::AppState, study_tips_handler, summarize_handler,
    },
};
use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use eduforge_core::{
    ChatSettings, ClientSettings, ContentSynthesizer, ConversationStore, CredentialPool,
    ResilientCompletionClient, SynthesizerSettings, SystemClock,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn cors_layer(config: &Config) -> Result<CorsLayer, ApiError> {
    let allow_origin = if config.allows_any_origin() {
        AllowOrigin::any()
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|origin| {
                origin
                    .parse::<HeaderValue>()
                    .map_err(|e| ApiError::Internal(format!("Invalid CORS origin '{}': {}", origin, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]))
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Completion Stack ---
    let credential_pool =
        CredentialPool::new(config.groq_api_keys.clone(), config.max_requests_per_key)?;
    info!(
        "Initialized credential pool with {} API keys",
        credential_pool.len()
    );
    let groq_adapter = Arc::new(
        GroqCompletionAdapter::new(config.groq_api_base.clone(), &config.groq_api_keys)
            .with_request_timeout(config.request_timeout),
    );
    let completion_client = Arc::new(ResilientCompletionClient::new(
        credential_pool,
        groq_adapter,
        ClientSettings {
            retry_backoff: config.retry_backoff,
        },
    ));

    let synthesizer = Arc::new(ContentSynthesizer::new(
        completion_client.clone(),
        SynthesizerSettings {
            model: config.content_model.clone(),
            ..SynthesizerSettings::default()
        },
    ));
    let conversations = Arc::new(ConversationStore::new(
        completion_client.clone(),
        Arc::new(SystemClock),
        ChatSettings {
            retention: config.session_retention,
            history_window: config.chat_history_window,
            long_conversation_threshold: config.long_conversation_threshold,
            model: config.chat_model.clone(),
            ..ChatSettings::default()
        },
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        completion_client,
        synthesizer,
        conversations,
    });

    // --- 5. Create the Web Router ---
    let api_routes = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/generate_content", post(generate_content_handler))
        .route("/content/{content_id}", get(get_content_handler))
        .route("/chat", post(chat_handler))
        .route("/chat/summarize", post(summarize_handler))
        .route("/chat/study_tips", post(study_tips_handler))
        .route("/chat/history/{session_id}", get(history_handler))
        .route("/chat/{session_id}", delete(clear_session_handler))
        .route("/admin/chat_stats", get(chat_stats_handler));

    let api_router = Router::new()
        .nest("/api", api_routes)
        .layer(cors_layer(&config)?)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
