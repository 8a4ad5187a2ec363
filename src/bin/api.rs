use financial_advisor_agent::{
    agent::Orchestrator,
    api::{start_server, ApiState},
    config::Config,
    history::InMemoryHistoryStore,
    llm::build_model,
    market::{ChartApiBackend, MarketDataProvider},
    search::{HttpSearchBackend, WebSearchProvider},
    tools::create_registry,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("⚠️  Configuration error: {}", e);
            eprintln!("📌 AUTH_TOKEN must be set; see .env.example");
            std::process::exit(1);
        }
    };

    info!("🚀 Financial Advisor Agent - API Server");
    info!("📍 Port: {}", config.port);

    // Create components
    let market = Arc::new(MarketDataProvider::new(Box::new(ChartApiBackend::new(
        config.quote_api_url.clone(),
    ))));
    let search = Arc::new(WebSearchProvider::new(Box::new(HttpSearchBackend::new(
        config.search_api_url.clone(),
    ))));
    let registry = create_registry(market.clone(), search);
    let model = build_model(&config);
    let history = Arc::new(InMemoryHistoryStore::new());

    let orchestrator = Arc::new(Orchestrator::new(model, registry, history));

    let state = ApiState {
        orchestrator,
        market,
        auth_token: Arc::new(config.auth_token.clone()),
        my_number: Arc::new(config.my_number.clone()),
    };

    info!("✅ Agent initialized");
    info!("📡 Starting API server...");

    start_server(state, config.port).await?;

    Ok(())
}
