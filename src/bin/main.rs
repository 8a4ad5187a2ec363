use financial_advisor_agent::{
    agent::Orchestrator,
    history::InMemoryHistoryStore,
    llm::{ModelReply, ScriptedModel},
    market::{MarketDataProvider, QuoteBackend, PriceSeries},
    models::ToolCall,
    search::{SearchBackend, WebSearchProvider},
    tools::create_registry,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Offline quote backend so the demo runs without network access; the
/// provider's fallback path supplies simulated data.
struct OfflineBackend;

#[async_trait]
impl QuoteBackend for OfflineBackend {
    async fn daily_series(
        &self,
        _symbol: &str,
    ) -> financial_advisor_agent::Result<PriceSeries> {
        Err(financial_advisor_agent::error::AdvisorError::QuoteSourceError(
            "offline demo".to_string(),
        ))
    }
}

struct OfflineSearchBackend;

#[async_trait]
impl SearchBackend for OfflineSearchBackend {
    async fn search(
        &self,
        _query: &str,
        _max: usize,
    ) -> financial_advisor_agent::Result<Vec<financial_advisor_agent::SearchResult>> {
        Err(financial_advisor_agent::error::AdvisorError::SearchError(
            "offline demo".to_string(),
        ))
    }

    async fn search_news(
        &self,
        _query: &str,
        _max: usize,
    ) -> financial_advisor_agent::Result<Vec<financial_advisor_agent::NewsResult>> {
        Err(financial_advisor_agent::error::AdvisorError::SearchError(
            "offline demo".to_string(),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("Financial Advisor Agent demo starting");

    // Create components
    let market = Arc::new(MarketDataProvider::new(Box::new(OfflineBackend)));
    let search = Arc::new(WebSearchProvider::new(Box::new(OfflineSearchBackend)));
    let registry = create_registry(market, search);
    let history = Arc::new(InMemoryHistoryStore::new());

    // Scripted model: request a Nifty snapshot, then summarize.
    let model = Box::new(ScriptedModel::new(vec![
        Ok(ModelReply::ToolCalls(vec![ToolCall::new(
            "get_nifty_data",
            json!({}),
        )])),
        Ok(ModelReply::Answer(
            "Nifty is trading near its recent range. With simulated data in play, \
             treat levels as indicative and confirm against a live source before acting."
                .to_string(),
        )),
    ]));

    let agent = Orchestrator::new(model, registry, history);

    let outcome = agent
        .handle_turn("demo-user", "How is the Nifty doing today?")
        .await;

    println!("\n=== ADVISOR RESPONSE ===");
    println!("{}", outcome.answer);
    println!("\nTools used:");
    for (i, tool) in outcome.tools_used.iter().enumerate() {
        println!("  {}: {}", i + 1, tool);
    }

    Ok(())
}
