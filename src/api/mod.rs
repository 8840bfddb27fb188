//! HTTP surface: router construction and server startup.

pub mod routes;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::agent::Agent;
use crate::config::Config;
use crate::index::{HashedBowEmbedding, PassageIndex};
use crate::llm::OpenAiChatClient;
use crate::store::ConversationStore;
use crate::tools::{ExtractLocations, GetWeather, QueryBook, ToolRegistry};
use crate::weather::WeatherService;

pub use routes::{AppState, RunLocks};

/// Build the application router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/chat/message", post(routes::send_message))
        .route("/chat/conversations", get(routes::list_conversations))
        .route(
            "/chat/conversations/:id",
            get(routes::get_conversation).delete(routes::delete_conversation),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Wire up every component from config and serve the API.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let embedder = Arc::new(HashedBowEmbedding::default());
    let index = Arc::new(PassageIndex::load(&config.index_path, embedder)?);

    let weather = Arc::new(WeatherService::new(config.openweather_api_key.clone()));

    let mut tools = ToolRegistry::new(Duration::from_secs(config.tool_timeout_secs));
    tools.register(Arc::new(QueryBook::new(index.clone(), config.top_k_results)));
    tools.register(Arc::new(ExtractLocations::new(
        index.clone(),
        config.top_k_results,
    )));
    tools.register(Arc::new(GetWeather::new(weather)));

    let llm = Arc::new(OpenAiChatClient::new(
        config.openai_endpoint.clone(),
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        config.openai_temperature,
    ));

    let agent = Agent::new(llm, tools, config.max_iterations, config.history_window);
    let store = ConversationStore::open(&config.database_path)?;

    let state = Arc::new(AppState {
        store,
        agent,
        run_locks: RunLocks::default(),
    });

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Travel Advisor listening");

    axum::serve(listener, router(state)).await?;
    Ok(())
}
