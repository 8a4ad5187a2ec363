//! Market data provider with graceful fallback
//!
//! A single bounded attempt against the live chart API; any failure or
//! empty series triggers the local fallback policy. Synthetic quotes are
//! produced only for the benchmark index and the commodity, never for a
//! named instrument the user asked about.

use crate::error::AdvisorError;
use crate::models::{change_percentage, round2, Quote};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Benchmark index symbol (Nifty 50 on the chart API).
pub const INDEX_SYMBOL: &str = "^NSEI";
/// Gold ETF used as the commodity proxy.
pub const GOLD_ETF_SYMBOL: &str = "GOLDBEES.NS";

/// Baseline the simulated index quote is perturbed around.
const INDEX_BASELINE: f64 = 22478.60;
/// Flat estimate used when the gold ETF series is unavailable (₹ per 10g).
const GOLD_ESTIMATE_PER_10G: f64 = 1000.0;
/// Rough ETF-price to per-10g conversion factor.
const GOLD_ETF_TO_10G: f64 = 25.0;

/// One observed sample in a daily window.
#[derive(Debug, Clone)]
pub struct PriceSample {
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: u64,
}

/// Series data returned by a quote backend for one instrument.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    pub samples: Vec<PriceSample>,
    /// Reference close supplied by the backend for named instruments.
    pub previous_close: Option<f64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
}

/// Seam for the live quote source. Test doubles implement this to force
/// failures or fixed series.
#[async_trait]
pub trait QuoteBackend: Send + Sync {
    async fn daily_series(&self, symbol: &str) -> Result<PriceSeries>;
}

/// Chart API backend (Yahoo-style v8 chart endpoint).
pub struct ChartApiBackend {
    client: Client,
    base_url: String,
}

impl ChartApiBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn parse_series(body: &Value) -> Result<PriceSeries> {
        let result = body
            .pointer("/chart/result/0")
            .ok_or_else(|| AdvisorError::QuoteSourceError("No chart result".to_string()))?;

        let meta = result.get("meta");
        let previous_close = meta
            .and_then(|m| m.get("chartPreviousClose").or_else(|| m.get("previousClose")))
            .and_then(Value::as_f64);

        let quote = result
            .pointer("/indicators/quote/0")
            .ok_or_else(|| AdvisorError::QuoteSourceError("No quote indicators".to_string()))?;

        let closes = quote.get("close").and_then(Value::as_array);
        let highs = quote.get("high").and_then(Value::as_array);
        let lows = quote.get("low").and_then(Value::as_array);
        let volumes = quote.get("volume").and_then(Value::as_array);

        let mut samples = Vec::new();
        if let Some(closes) = closes {
            for (i, close) in closes.iter().enumerate() {
                // The chart API pads series with nulls; skip them.
                let Some(close) = close.as_f64() else { continue };
                let at = |arr: Option<&Vec<Value>>| {
                    arr.and_then(|a| a.get(i)).and_then(Value::as_f64)
                };
                samples.push(PriceSample {
                    close,
                    high: at(highs).unwrap_or(close),
                    low: at(lows).unwrap_or(close),
                    volume: at(volumes).unwrap_or(0.0) as u64,
                });
            }
        }

        Ok(PriceSeries {
            samples,
            previous_close,
            market_cap: None,
            pe_ratio: None,
        })
    }
}

#[async_trait]
impl QuoteBackend for ChartApiBackend {
    async fn daily_series(&self, symbol: &str) -> Result<PriceSeries> {
        let url = format!(
            "{}/v8/finance/chart/{}?range=1d&interval=5m",
            self.base_url, symbol
        );

        let response = self.client.get(&url).send().await.map_err(|e| {
            AdvisorError::QuoteSourceError(format!("Chart request failed for {}: {}", symbol, e))
        })?;

        if !response.status().is_success() {
            return Err(AdvisorError::QuoteSourceError(format!(
                "Chart API returned {} for {}",
                response.status(),
                symbol
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            AdvisorError::QuoteSourceError(format!("Invalid chart response: {}", e))
        })?;

        Self::parse_series(&body)
    }
}

/// Normalize bare tickers to the NSE suffix the chart API expects.
fn normalize_symbol(symbol: &str) -> String {
    let upper = symbol.trim().to_uppercase();
    if upper.ends_with(".NS") || upper.ends_with(".BO") || upper.starts_with('^') {
        upper
    } else {
        format!("{}.NS", upper)
    }
}

/// Build a quote from a non-empty series: current is the last sample of
/// the window, previous is the supplied reference close or the first sample.
fn quote_from_series(symbol: &str, series: &PriceSeries, source: &str) -> Option<Quote> {
    let last = series.samples.last()?;
    let first = series.samples.first()?;
    let previous = series.previous_close.unwrap_or(first.close);
    let change = last.close - previous;

    let high = series
        .samples
        .iter()
        .map(|s| s.high)
        .fold(f64::MIN, f64::max);
    let low = series
        .samples
        .iter()
        .map(|s| s.low)
        .fold(f64::MAX, f64::min);
    let volume: u64 = series.samples.iter().map(|s| s.volume).sum();

    Some(Quote {
        symbol: symbol.to_string(),
        price: round2(last.close),
        change: round2(change),
        change_percentage: change_percentage(change, previous),
        volume,
        high: Some(round2(high)),
        low: Some(round2(low)),
        market_cap: series.market_cap,
        pe_ratio: series.pe_ratio.map(round2),
        timestamp: Utc::now(),
        source: source.to_string(),
    })
}

/// Centralized provider for real-time quotes with local fallbacks.
pub struct MarketDataProvider {
    backend: Box<dyn QuoteBackend>,
}

impl MarketDataProvider {
    pub fn new(backend: Box<dyn QuoteBackend>) -> Self {
        Self { backend }
    }

    /// Benchmark index quote. Never fails: any backend error or empty
    /// series yields a simulated quote tagged "Simulated Data".
    pub async fn index_quote(&self) -> Quote {
        match self.backend.daily_series(INDEX_SYMBOL).await {
            Ok(series) => {
                if let Some(quote) = quote_from_series("NIFTY50", &series, "Chart API") {
                    return quote;
                }
                warn!("Index series was empty, using simulated quote");
            }
            Err(e) => {
                warn!("Index fetch failed, using simulated quote: {}", e);
            }
        }
        simulated_index_quote()
    }

    /// Named-instrument quote. No synthetic fallback here: a symbol that
    /// cannot be resolved returns `None` so callers report "unavailable"
    /// instead of presenting invented numbers.
    pub async fn instrument_quote(&self, symbol: &str) -> Option<Quote> {
        let normalized = normalize_symbol(symbol);
        match self.backend.daily_series(&normalized).await {
            Ok(series) => quote_from_series(&normalized, &series, "Chart API"),
            Err(e) => {
                warn!("Instrument fetch failed for {}: {}", normalized, e);
                None
            }
        }
    }

    /// Gold quote derived from the ETF price. Falls back to a flat
    /// estimate tagged "Market Estimate".
    pub async fn commodity_quote(&self) -> Quote {
        match self.backend.daily_series(GOLD_ETF_SYMBOL).await {
            Ok(series) => {
                if let Some(etf) = quote_from_series(GOLD_ETF_SYMBOL, &series, "Gold ETF (GOLDBEES)") {
                    return Quote {
                        symbol: "GOLD-10G".to_string(),
                        price: round2(etf.price * GOLD_ETF_TO_10G),
                        change: round2(etf.change * GOLD_ETF_TO_10G),
                        change_percentage: etf.change_percentage,
                        ..etf
                    };
                }
                warn!("Gold series was empty, using estimate");
            }
            Err(e) => {
                warn!("Gold fetch failed, using estimate: {}", e);
            }
        }
        estimated_gold_quote()
    }
}

fn simulated_index_quote() -> Quote {
    let mut rng = rand::thread_rng();
    let change: f64 = rng.gen_range(-200.0..200.0);
    let price = INDEX_BASELINE + change;

    Quote {
        symbol: "NIFTY50".to_string(),
        price: round2(price),
        change: round2(change),
        change_percentage: change_percentage(change, INDEX_BASELINE),
        volume: rng.gen_range(10_000_000..15_000_000),
        high: Some(round2(INDEX_BASELINE + change.abs() + rng.gen_range(0.0..50.0))),
        low: Some(round2(INDEX_BASELINE - change.abs() - rng.gen_range(0.0..50.0))),
        market_cap: None,
        pe_ratio: None,
        timestamp: Utc::now(),
        source: "Simulated Data".to_string(),
    }
}

fn estimated_gold_quote() -> Quote {
    Quote {
        symbol: "GOLD-10G".to_string(),
        price: GOLD_ESTIMATE_PER_10G,
        change: 0.0,
        change_percentage: 0.0,
        volume: 0,
        high: None,
        low: None,
        market_cap: None,
        pe_ratio: None,
        timestamp: Utc::now(),
        source: "Market Estimate".to_string(),
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    /// Backend that fails every request.
    pub struct FailingBackend;

    #[async_trait]
    impl QuoteBackend for FailingBackend {
        async fn daily_series(&self, symbol: &str) -> Result<PriceSeries> {
            Err(AdvisorError::QuoteSourceError(format!(
                "forced failure for {}",
                symbol
            )))
        }
    }

    /// Backend returning a fixed two-sample series for every symbol.
    pub struct FixedBackend {
        pub first_close: f64,
        pub last_close: f64,
    }

    #[async_trait]
    impl QuoteBackend for FixedBackend {
        async fn daily_series(&self, _symbol: &str) -> Result<PriceSeries> {
            Ok(PriceSeries {
                samples: vec![
                    PriceSample {
                        close: self.first_close,
                        high: self.first_close,
                        low: self.first_close,
                        volume: 1000,
                    },
                    PriceSample {
                        close: self.last_close,
                        high: self.last_close,
                        low: self.last_close,
                        volume: 2000,
                    },
                ],
                previous_close: None,
                market_cap: None,
                pe_ratio: None,
            })
        }
    }

    /// Backend returning an empty series (no samples at all).
    pub struct EmptyBackend;

    #[async_trait]
    impl QuoteBackend for EmptyBackend {
        async fn daily_series(&self, _symbol: &str) -> Result<PriceSeries> {
            Ok(PriceSeries::default())
        }
    }
}
