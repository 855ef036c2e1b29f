//! Main Entrypoint for the Improv API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the database connection pool and running migrations.
//! 3. Initializing shared services (the LLM client, scenario source and host persona).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use improv_api::{
    config::{Config, Provider, ScenarioSourceKind},
    db::Db,
    prompts::load_prompts,
    router::create_router,
    state::AppState,
};
use improv_core::{
    llm_client::{LLMClient, OpenAICompatibleClient},
    persona::PersonaPrompt,
    scenario::{LLMScenarioSource, ScenarioPool, ScenarioSource, StaticScenarioSource},
};
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
        return;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Database ---
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let db = Arc::new(Db::new(pool));
    db.run_migrations().await?;
    info!("Database connection established and migrations are up-to-date.");

    // --- 4. Initialize Shared Services ---
    let prompts = load_prompts(&config.prompts_path)?;
    let persona = Arc::new(PersonaPrompt::new(
        prompts
            .get("system_prompt")
            .context("system_prompt.md not found in prompts directory")?
            .clone(),
    ));

    let api_key = config
        .api_key()
        .context("No API key configured for the selected provider")?;
    let api_base = match config.provider {
        Provider::OpenAI => "https://api.openai.com/v1/",
        Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
    };
    info!(provider = ?config.provider, "Using LLM provider.");
    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(api_base);
    let llm_client: Arc<dyn LLMClient> = Arc::new(OpenAICompatibleClient::new(
        openai_config,
        config.chat_model.clone(),
    ));

    let scenario_source: Arc<dyn ScenarioSource> = match config.scenario_source {
        ScenarioSourceKind::Static => {
            let source = match &config.scenarios_path {
                Some(path) => StaticScenarioSource::from_file(path)?,
                None => StaticScenarioSource::builtin(),
            };
            // A static pool never changes, so a bad one is fatal at startup.
            let scenarios = source.load_scenarios(config.scenario_count).await?;
            let pool = ScenarioPool::new(scenarios, config.max_rounds)
                .context("Static scenario pool is unusable")?;
            info!(
                scenarios = pool.len(),
                max_rounds = config.max_rounds,
                "Static scenario pool validated."
            );
            Arc::new(source)
        }
        ScenarioSourceKind::Llm => {
            if !prompts.contains_key("generate_scenarios") {
                anyhow::bail!("generate_scenarios.md not found in prompts directory");
            }
            Arc::new(LLMScenarioSource::new(llm_client.clone(), prompts))
        }
    };

    let app_state = Arc::new(AppState {
        db,
        scenario_source,
        llm_client,
        persona,
        config: Arc::new(config.clone()),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        bind_address = %config.bind_address,
        max_rounds = config.max_rounds,
        order = ?config.scenario_order,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
