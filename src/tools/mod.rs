//! Tool trait and registry
//!
//! The fixed catalog of operations the agent may invoke. Arguments are
//! validated against each tool's declared schema before dispatch, and
//! every tool catches its own internal failures and returns a
//! user-presentable message — the agent loop never sees a raw error
//! from a tool body.

use crate::error::AdvisorError;
use crate::market::MarketDataProvider;
use crate::models::{
    ParamSpec, ParamType, PortfolioHolding, PortfolioValuation, Quote, Sentiment, ToolCall,
    ToolDescriptor, ValuedHolding,
};
use crate::report::MarketReport;
use crate::search::WebSearchProvider;
use crate::Result;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Preview length for news headlines embedded in tool output.
const HEADLINE_PREVIEW_LEN: usize = 100;
/// Lines per page for the generated report document.
const REPORT_LINES_PER_PAGE: usize = 40;

/// Trait for a single tool.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    /// Execute with already-validated arguments. Must not fail: internal
    /// problems become part of the returned message.
    async fn execute(&self, args: &Value) -> String;
}

/// Tool registry: lookup, schema validation, dispatch.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.descriptor().name.to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut list: Vec<ToolDescriptor> =
            self.tools.values().map(|t| t.descriptor()).collect();
        list.sort_by_key(|d| d.name);
        list
    }

    /// Validate a requested call and execute it. Unknown names and
    /// malformed arguments come back as structured errors; tool bodies
    /// themselves never fail.
    pub async fn dispatch(&self, call: &ToolCall) -> Result<String> {
        let tool = self
            .get(&call.tool_name)
            .ok_or_else(|| AdvisorError::ToolNotFound(call.tool_name.clone()))?;

        let args = validate_args(&tool.descriptor(), &call.arguments)?;

        info!(tool = %call.tool_name, "Executing tool");
        Ok(tool.execute(&args).await)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn type_matches(spec: ParamType, value: &Value) -> bool {
    match spec {
        ParamType::String => value.is_string(),
        ParamType::Number => value.is_number(),
        ParamType::Array => value.is_array(),
        ParamType::Object => value.is_object(),
    }
}

/// Check arguments against the declared schema and fill in defaults.
fn validate_args(descriptor: &ToolDescriptor, arguments: &Value) -> Result<Value> {
    let supplied = match arguments {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        _ => {
            return Err(AdvisorError::InvalidToolInput(format!(
                "{}: arguments must be a JSON object",
                descriptor.name
            )))
        }
    };

    let mut validated = serde_json::Map::new();

    for param in &descriptor.parameters {
        match supplied.get(param.name) {
            Some(value) => {
                if !type_matches(param.param_type, value) {
                    return Err(AdvisorError::InvalidToolInput(format!(
                        "{}: parameter '{}' has wrong type",
                        descriptor.name, param.name
                    )));
                }
                validated.insert(param.name.to_string(), value.clone());
            }
            None if param.required => {
                return Err(AdvisorError::InvalidToolInput(format!(
                    "{}: missing required parameter '{}'",
                    descriptor.name, param.name
                )));
            }
            None => {
                if let Some(default) = &param.default {
                    validated.insert(param.name.to_string(), default.clone());
                }
            }
        }
    }

    Ok(Value::Object(validated))
}

/// Char-safe preview with ellipsis.
fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

fn format_quote_block(ticker: &str, quote: &Quote) -> String {
    let market_cap = quote
        .market_cap
        .map(|v| format!("{:.0}", v))
        .unwrap_or_else(|| "N/A".to_string());
    let pe = quote
        .pe_ratio
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "N/A".to_string());

    format!(
        "📈 **{} Stock Analysis**\n\n\
         Current Price: ₹{:.2}\n\
         Change: ₹{:.2} ({:.2}%)\n\
         Volume: {}\n\
         Market Cap: {}\n\
         P/E Ratio: {}\n\n\
         Source: {}\n\
         Updated: {}",
        ticker.to_uppercase(),
        quote.price,
        quote.change,
        quote.change_percentage,
        quote.volume,
        market_cap,
        pe,
        quote.source,
        quote.timestamp.format("%Y-%m-%dT%H:%M:%S"),
    )
}

// =============================
// Index snapshot
// =============================

pub struct GetNiftyDataTool {
    market: Arc<MarketDataProvider>,
    search: Arc<WebSearchProvider>,
}

impl GetNiftyDataTool {
    pub fn new(market: Arc<MarketDataProvider>, search: Arc<WebSearchProvider>) -> Self {
        Self { market, search }
    }
}

#[async_trait::async_trait]
impl Tool for GetNiftyDataTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_nifty_data",
            description: "Fetches real-time Nifty 50 data with sentiment and recent headlines",
            parameters: vec![],
            side_effecting: false,
        }
    }

    async fn execute(&self, _args: &Value) -> String {
        let quote = self.market.index_quote().await;
        let sentiment = Sentiment::from_change_pct(quote.change_percentage);
        let news = self.search.search_news("nifty market today", 2).await;

        let news_summary: Vec<Value> = news
            .iter()
            .take(2)
            .map(|n| {
                json!({
                    "title": n.title,
                    "summary": preview(&n.body, HEADLINE_PREVIEW_LEN),
                })
            })
            .collect();

        let enhanced = json!({
            "current_level": quote.price,
            "change": quote.change,
            "change_percentage": quote.change_percentage,
            "volume": quote.volume,
            "high": quote.high,
            "low": quote.low,
            "timestamp": quote.timestamp.to_rfc3339(),
            "source": quote.source,
            "market_sentiment": sentiment.to_string(),
            "news_summary": news_summary,
            "alert": format!(
                "Nifty at {}, Change: {} ({:.2}%)",
                quote.price, quote.change, quote.change_percentage
            ),
        });

        serde_json::to_string_pretty(&enhanced)
            .unwrap_or_else(|_| "Nifty data is temporarily unavailable.".to_string())
    }
}

// =============================
// Web search digest
// =============================

pub struct PerformWebSearchTool {
    search: Arc<WebSearchProvider>,
}

impl PerformWebSearchTool {
    pub fn new(search: Arc<WebSearchProvider>) -> Self {
        Self { search }
    }
}

#[async_trait::async_trait]
impl Tool for PerformWebSearchTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "perform_web_search",
            description: "Performs web search for financial information with recent news",
            parameters: vec![ParamSpec::required("query", ParamType::String)],
            side_effecting: false,
        }
    }

    async fn execute(&self, args: &Value) -> String {
        let query = args.get("query").and_then(Value::as_str).unwrap_or_default();

        let web_results = self
            .search
            .search(&format!("{} India finance", query), 3)
            .await;
        let news_results = self.search.search_news(query, 2).await;

        let mut parts = Vec::new();

        if !web_results.is_empty() {
            parts.push("**Search Results:**".to_string());
            for (i, result) in web_results.iter().take(2).enumerate() {
                parts.push(format!("{}. {}", i + 1, result.title));
                parts.push(format!("   {}", preview(&result.body, 150)));
            }
        }

        if !news_results.is_empty() {
            parts.push("\n**Latest News:**".to_string());
            for (i, news) in news_results.iter().enumerate() {
                parts.push(format!("{}. {}", i + 1, news.title));
                parts.push(format!("   {}", preview(&news.body, HEADLINE_PREVIEW_LEN)));
            }
        }

        if parts.is_empty() {
            return format!(
                "Search completed for '{}' - Market analysis suggests monitoring current trends.",
                query
            );
        }
        parts.join("\n")
    }
}

// =============================
// Stock price
// =============================

pub struct GetStockPriceTool {
    market: Arc<MarketDataProvider>,
}

impl GetStockPriceTool {
    pub fn new(market: Arc<MarketDataProvider>) -> Self {
        Self { market }
    }
}

#[async_trait::async_trait]
impl Tool for GetStockPriceTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_stock_price",
            description: "Fetches real-time stock price and metrics for Indian stocks",
            parameters: vec![ParamSpec::required("ticker", ParamType::String)],
            side_effecting: false,
        }
    }

    async fn execute(&self, args: &Value) -> String {
        let ticker = args.get("ticker").and_then(Value::as_str).unwrap_or_default();

        match self.market.instrument_quote(ticker).await {
            Some(quote) => format_quote_block(ticker, &quote),
            None => format!(
                "❌ Unable to fetch data for {}. Please verify the ticker symbol or try again later.",
                ticker.to_uppercase()
            ),
        }
    }
}

// =============================
// Real estate
// =============================

pub struct GetRealEstateInfoTool {
    search: Arc<WebSearchProvider>,
}

impl GetRealEstateInfoTool {
    pub fn new(search: Arc<WebSearchProvider>) -> Self {
        Self { search }
    }
}

#[async_trait::async_trait]
impl Tool for GetRealEstateInfoTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_real_estate_info",
            description: "Provides real estate market information for a location",
            parameters: vec![ParamSpec::optional(
                "location",
                ParamType::String,
                json!("India"),
            )],
            side_effecting: false,
        }
    }

    async fn execute(&self, args: &Value) -> String {
        let location = args
            .get("location")
            .and_then(Value::as_str)
            .unwrap_or("India");

        let results = self
            .search
            .search(
                &format!("real estate market {} property investment", location),
                3,
            )
            .await;

        let mut summary = format!("🏠 **Real Estate Market Analysis - {}**\n\n", location);
        for (i, result) in results.iter().take(2).enumerate() {
            summary.push_str(&format!("**{}. Market Update:**\n", i + 1));
            summary.push_str(&format!("{}\n\n", preview(&result.body, 200)));
        }

        summary.push_str(
            "**Investment Guidelines:**\n\
             • Research upcoming infrastructure projects\n\
             • Evaluate connectivity and amenities\n\
             • Verify legal documentation and approvals\n\
             • Consider rental yield and capital appreciation\n\
             • Monitor government policies and regulations",
        );

        summary
    }
}

// =============================
// Gold price
// =============================

pub struct GetGoldPriceTool {
    market: Arc<MarketDataProvider>,
    search: Arc<WebSearchProvider>,
}

impl GetGoldPriceTool {
    pub fn new(market: Arc<MarketDataProvider>, search: Arc<WebSearchProvider>) -> Self {
        Self { market, search }
    }
}

#[async_trait::async_trait]
impl Tool for GetGoldPriceTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_gold_price",
            description: "Fetches current gold prices with investment insights",
            parameters: vec![ParamSpec::optional("unit", ParamType::String, json!("10g"))],
            side_effecting: false,
        }
    }

    async fn execute(&self, args: &Value) -> String {
        let unit = args.get("unit").and_then(Value::as_str).unwrap_or("10g");

        let quote = self.market.commodity_quote().await;
        let news = self.search.search_news("gold price India", 1).await;

        let mut response = format!(
            "🥇 **Gold Price Analysis**\n\n\
             Current Rate: ₹{:.2} per {}\n\
             Source: {}\n\
             Updated: {}\n\n\
             **Investment Options:**\n\
             • Physical Gold: Coins, bars, jewelry\n\
             • Gold ETFs: Easy trading, no storage issues\n\
             • Sovereign Gold Bonds: Interest + price appreciation\n\
             • Gold Mutual Funds: Professional management\n\n\
             **Market Context:**\n\
             Gold remains a preferred hedge against inflation and currency fluctuations.",
            quote.price,
            unit,
            quote.source,
            quote.timestamp.format("%Y-%m-%dT%H:%M:%S"),
        );

        if let Some(headline) = news.first() {
            response.push_str(&format!(
                "\n\n**Latest News:** {}",
                preview(&headline.title, HEADLINE_PREVIEW_LEN)
            ));
        }

        response
    }
}

// =============================
// PDF report
// =============================

pub struct GeneratePdfReportTool;

#[async_trait::async_trait]
impl Tool for GeneratePdfReportTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "generate_pdf_report",
            description: "Generates a market analysis report document",
            parameters: vec![ParamSpec::optional(
                "market_data",
                ParamType::Object,
                json!({}),
            )],
            side_effecting: true,
        }
    }

    async fn execute(&self, args: &Value) -> String {
        let snapshot = args
            .get("market_data")
            .and_then(|data| quote_from_snapshot(data));

        let report = MarketReport::build(snapshot.as_ref());
        let pages = report.render_pages(REPORT_LINES_PER_PAGE);

        info!(pages = pages.len(), "Report document rendered");

        "✅ Market analysis report generated successfully with current data and recommendations."
            .to_string()
    }
}

/// Rebuild a quote from the snapshot object a prior tool call produced.
fn quote_from_snapshot(data: &Value) -> Option<Quote> {
    let price = data
        .get("current_level")
        .or_else(|| data.get("price"))
        .and_then(Value::as_f64)?;

    Some(Quote {
        symbol: "NIFTY50".to_string(),
        price,
        change: data.get("change").and_then(Value::as_f64).unwrap_or(0.0),
        change_percentage: data
            .get("change_percentage")
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
        volume: data.get("volume").and_then(Value::as_u64).unwrap_or(0),
        high: data.get("high").and_then(Value::as_f64),
        low: data.get("low").and_then(Value::as_f64),
        market_cap: None,
        pe_ratio: None,
        timestamp: chrono::Utc::now(),
        source: data
            .get("source")
            .and_then(Value::as_str)
            .unwrap_or("Market Data")
            .to_string(),
    })
}

// =============================
// Portfolio analysis
// =============================

pub struct AnalyzePortfolioTool {
    market: Arc<MarketDataProvider>,
}

impl AnalyzePortfolioTool {
    pub fn new(market: Arc<MarketDataProvider>) -> Self {
        Self { market }
    }

    /// Valuate holdings against live prices. Unresolvable tickers and
    /// non-positive quantities are skipped, not fatal.
    pub async fn valuate(&self, holdings: &[PortfolioHolding]) -> PortfolioValuation {
        let mut valued = Vec::new();
        let mut skipped = Vec::new();
        let mut total_value = 0.0;

        for holding in holdings {
            if holding.ticker.is_empty() || holding.quantity <= 0.0 {
                skipped.push(holding.ticker.clone());
                continue;
            }

            match self.market.instrument_quote(&holding.ticker).await {
                Some(quote) => {
                    let value = quote.price * holding.quantity;
                    total_value += value;
                    valued.push(ValuedHolding {
                        ticker: holding.ticker.clone(),
                        quantity: holding.quantity,
                        price: quote.price,
                        value,
                        change_pct: quote.change_percentage,
                    });
                }
                None => skipped.push(holding.ticker.clone()),
            }
        }

        PortfolioValuation {
            holdings: valued,
            total_value,
            skipped,
        }
    }
}

#[async_trait::async_trait]
impl Tool for AnalyzePortfolioTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "analyze_portfolio",
            description: "Analyzes portfolio holdings with current market prices",
            parameters: vec![ParamSpec::required("portfolio_holdings", ParamType::Array)],
            side_effecting: false,
        }
    }

    async fn execute(&self, args: &Value) -> String {
        let holdings: Vec<PortfolioHolding> = args
            .get("portfolio_holdings")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        if holdings.is_empty() {
            return "📊 Please provide your portfolio holdings in format: \
                    [{\"ticker\": \"RELIANCE\", \"quantity\": 100}]"
                .to_string();
        }

        let valuation = self.valuate(&holdings).await;

        if valuation.holdings.is_empty() {
            return "❌ Unable to analyze portfolio. Please check ticker symbols and try again."
                .to_string();
        }

        let mut analysis = format!(
            "📊 **Portfolio Analysis Summary**\n\n\
             **Total Value:** ₹{:.2}\n\
             **Holdings:** {} stocks\n\n\
             **Detailed Breakdown:**",
            valuation.total_value,
            valuation.holdings.len()
        );

        for holding in &valuation.holdings {
            analysis.push_str(&format!(
                "\n• **{}:** {} shares\n  Price: ₹{:.2} ({:.2}%)\n  Value: ₹{:.2}",
                holding.ticker, holding.quantity, holding.price, holding.change_pct, holding.value
            ));
        }

        if !valuation.skipped.is_empty() {
            analysis.push_str(&format!(
                "\n\n**Skipped:** {} (unresolvable or zero quantity)",
                valuation.skipped.join(", ")
            ));
        }

        analysis.push_str(&format!(
            "\n\n**Recommendations:**\n\
             ✓ Portfolio diversification across {} stocks\n\
             ✓ Monitor individual stock performance regularly\n\
             ✓ Consider rebalancing if any single stock exceeds 15% allocation\n\
             ✓ Review sector concentration and add defensive stocks if needed",
            valuation.holdings.len()
        ));

        analysis
    }
}

// =============================
// Index alert
// =============================

pub struct SetNiftyAlertTool {
    market: Arc<MarketDataProvider>,
}

impl SetNiftyAlertTool {
    pub fn new(market: Arc<MarketDataProvider>) -> Self {
        Self { market }
    }
}

#[async_trait::async_trait]
impl Tool for SetNiftyAlertTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "set_nifty_alert",
            description: "Sets a price alert for Nifty 50 relative to the current level",
            parameters: vec![ParamSpec::required("level", ParamType::Number)],
            side_effecting: true,
        }
    }

    async fn execute(&self, args: &Value) -> String {
        let level = args.get("level").and_then(Value::as_f64).unwrap_or(0.0);

        let quote = self.market.index_quote().await;
        let current_level = quote.price;

        // The alert is accepted even without a usable reference level.
        if current_level == 0.0 {
            return format!(
                "⚠️ Unable to fetch current Nifty level. Alert set for {:.2} - will activate when data is available.",
                level
            );
        }

        let direction = if level > current_level { "above" } else { "below" };
        let difference = (level - current_level).abs();
        let percentage_diff = difference / current_level * 100.0;

        format!(
            "🔔 **Nifty Alert Configured Successfully!**\n\n\
             Alert Level: {:.2}\n\
             Current Level: {:.2}\n\
             Difference: {:.2} points ({:.2}%)\n\
             Direction: Waiting for Nifty to move {} {:.2}\n\n\
             **Alert Details:**\n\
             ✓ Active 24/7 during market hours\n\
             ✓ Instant notification via WhatsApp\n\
             ✓ Based on real-time market data\n\
             ✓ Automatic deactivation after trigger",
            level, current_level, difference, percentage_diff, direction, level
        )
    }
}

/// Wire the full catalog with injected providers.
pub fn create_registry(
    market: Arc<MarketDataProvider>,
    search: Arc<WebSearchProvider>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(GetNiftyDataTool::new(
        market.clone(),
        search.clone(),
    )));
    registry.register(Arc::new(PerformWebSearchTool::new(search.clone())));
    registry.register(Arc::new(GetStockPriceTool::new(market.clone())));
    registry.register(Arc::new(GetRealEstateInfoTool::new(search.clone())));
    registry.register(Arc::new(GetGoldPriceTool::new(market.clone(), search)));
    registry.register(Arc::new(GeneratePdfReportTool));
    registry.register(Arc::new(AnalyzePortfolioTool::new(market.clone())));
    registry.register(Arc::new(SetNiftyAlertTool::new(market)));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::test_support::{FailingBackend, FixedBackend};
    use crate::search::test_support::FailingSearchBackend;

    fn registry_with(
        quote_backend: Box<dyn crate::market::QuoteBackend>,
    ) -> ToolRegistry {
        let market = Arc::new(MarketDataProvider::new(quote_backend));
        let search = Arc::new(WebSearchProvider::new(Box::new(FailingSearchBackend)));
        create_registry(market, search)
    }

    #[test]
    fn test_catalog_is_complete() {
        let registry = registry_with(Box::new(FailingBackend));
        let names: Vec<&str> = registry.descriptors().iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                "analyze_portfolio",
                "generate_pdf_report",
                "get_gold_price",
                "get_nifty_data",
                "get_real_estate_info",
                "get_stock_price",
                "perform_web_search",
                "set_nifty_alert",
            ]
        );
    }

    #[test]
    fn test_side_effect_flags() {
        let registry = registry_with(Box::new(FailingBackend));
        for descriptor in registry.descriptors() {
            let expected = matches!(descriptor.name, "generate_pdf_report" | "set_nifty_alert");
            assert_eq!(descriptor.side_effecting, expected, "{}", descriptor.name);
        }
    }

    #[tokio::test]
    async fn test_dispatch_rejects_unknown_tool() {
        let registry = registry_with(Box::new(FailingBackend));
        let call = ToolCall::new("launch_rocket", json!({}));
        assert!(matches!(
            registry.dispatch(&call).await,
            Err(AdvisorError::ToolNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_dispatch_rejects_malformed_arguments() {
        let registry = registry_with(Box::new(FailingBackend));

        let missing = ToolCall::new("get_stock_price", json!({}));
        assert!(matches!(
            registry.dispatch(&missing).await,
            Err(AdvisorError::InvalidToolInput(_))
        ));

        let wrong_type = ToolCall::new("set_nifty_alert", json!({"level": "high"}));
        assert!(matches!(
            registry.dispatch(&wrong_type).await,
            Err(AdvisorError::InvalidToolInput(_))
        ));
    }

    #[tokio::test]
    async fn test_defaults_applied() {
        let registry = registry_with(Box::new(FailingBackend));
        let call = ToolCall::new("get_gold_price", json!({}));
        let output = registry.dispatch(&call).await.unwrap();
        assert!(output.contains("per 10g"));
        assert!(output.contains("Estimate"));
    }

    #[tokio::test]
    async fn test_stock_price_unavailable_message() {
        let registry = registry_with(Box::new(FailingBackend));
        let call = ToolCall::new("get_stock_price", json!({"ticker": "RELIANCE"}));
        let output = registry.dispatch(&call).await.unwrap();
        assert!(output.contains("Unable to fetch data for RELIANCE"));
        assert!(!output.contains("₹"));
    }

    #[tokio::test]
    async fn test_stock_price_formatted_quote() {
        let registry = registry_with(Box::new(FixedBackend {
            first_close: 2000.0,
            last_close: 2100.0,
        }));
        let call = ToolCall::new("get_stock_price", json!({"ticker": "reliance"}));
        let output = registry.dispatch(&call).await.unwrap();
        assert!(output.contains("RELIANCE"));
        assert!(output.contains("₹2100.00"));
        assert!(output.contains("5.00%"));
    }

    #[tokio::test]
    async fn test_nifty_snapshot_has_sentiment_and_alert_line() {
        let registry = registry_with(Box::new(FixedBackend {
            first_close: 22000.0,
            last_close: 22300.0,
        }));
        let call = ToolCall::new("get_nifty_data", json!({}));
        let output = registry.dispatch(&call).await.unwrap();

        // +1.36% is strictly above the 0.5 boundary.
        assert!(output.contains("Bullish"));
        assert!(output.contains("Nifty at"));
        assert!(output.contains("news_summary"));
    }

    #[tokio::test]
    async fn test_portfolio_empty_and_zero_quantity() {
        let registry = registry_with(Box::new(FixedBackend {
            first_close: 100.0,
            last_close: 110.0,
        }));

        let empty = ToolCall::new("analyze_portfolio", json!({"portfolio_holdings": []}));
        let output = registry.dispatch(&empty).await.unwrap();
        assert!(output.contains("provide your portfolio holdings"));

        let zero_quantity = ToolCall::new(
            "analyze_portfolio",
            json!({"portfolio_holdings": [
                {"ticker": "TCS", "quantity": 0},
                {"ticker": "INFY", "quantity": 10},
            ]}),
        );
        let output = registry.dispatch(&zero_quantity).await.unwrap();
        // 10 shares at 110 only; the zero-quantity line is excluded.
        assert!(output.contains("₹1100.00"));
        assert!(output.contains("Skipped"));
        assert!(output.contains("TCS"));
    }

    #[tokio::test]
    async fn test_portfolio_all_unresolvable() {
        let registry = registry_with(Box::new(FailingBackend));
        let call = ToolCall::new(
            "analyze_portfolio",
            json!({"portfolio_holdings": [{"ticker": "NOPE", "quantity": 5}]}),
        );
        let output = registry.dispatch(&call).await.unwrap();
        assert!(output.contains("Unable to analyze portfolio"));
    }

    #[tokio::test]
    async fn test_alert_reports_direction_and_distance() {
        let registry = registry_with(Box::new(FixedBackend {
            first_close: 22000.0,
            last_close: 22000.0,
        }));
        let call = ToolCall::new("set_nifty_alert", json!({"level": 22500.0}));
        let output = registry.dispatch(&call).await.unwrap();
        assert!(output.contains("above"));
        assert!(output.contains("500.00 points"));
    }

    #[tokio::test]
    async fn test_alert_confirmed_even_on_fallback_quote() {
        // Quote fetch fails, the provider falls back to a simulated
        // level, and the alert is still accepted.
        let registry = registry_with(Box::new(FailingBackend));
        let call = ToolCall::new("set_nifty_alert", json!({"level": 23000.0}));
        let output = registry.dispatch(&call).await.unwrap();
        assert!(output.contains("Alert"));
    }

    #[tokio::test]
    async fn test_report_tool_returns_confirmation() {
        let registry = registry_with(Box::new(FailingBackend));
        let call = ToolCall::new(
            "generate_pdf_report",
            json!({"market_data": {"current_level": 22500.0, "change_percentage": 0.4}}),
        );
        let output = registry.dispatch(&call).await.unwrap();
        assert!(output.contains("generated successfully"));
    }

    #[tokio::test]
    async fn test_web_search_digest_from_fallback() {
        let registry = registry_with(Box::new(FailingBackend));
        let call = ToolCall::new("perform_web_search", json!({"query": "gold outlook"}));
        let output = registry.dispatch(&call).await.unwrap();
        assert!(output.contains("Search Results"));
        assert!(output.contains("Gold prices"));
    }

    #[test]
    fn test_preview_is_char_safe() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
        // Multi-byte characters must not split.
        assert_eq!(preview("₹₹₹₹", 2), "₹₹...");
    }
}
