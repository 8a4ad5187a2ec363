//! Core data models for the financial advisor agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Quotes =================
//

/// A point-in-time market reading for an index, stock or commodity.
///
/// `source` always records provenance: a live source name, or
/// "Simulated Data" / "Market Estimate" when locally generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percentage: f64,
    pub volume: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pe_ratio: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

impl Quote {
    /// True when the quote was generated locally rather than fetched live.
    pub fn is_synthetic(&self) -> bool {
        self.source.contains("Simulated") || self.source.contains("Estimate")
    }
}

/// Change percentage with a defined-zero guard: a zero previous close
/// yields 0%, never a division fault.
pub fn change_percentage(change: f64, previous_close: f64) -> f64 {
    if previous_close == 0.0 {
        0.0
    } else {
        round2(change / previous_close * 100.0)
    }
}

/// Round to two decimals, the precision every quote field carries.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

//
// ================= Sentiment =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    /// Strict boundaries: exactly 0.5 is still Neutral.
    pub fn from_change_pct(change_pct: f64) -> Self {
        if change_pct > 0.5 {
            Sentiment::Bullish
        } else if change_pct < -0.5 {
            Sentiment::Bearish
        } else {
            Sentiment::Neutral
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Sentiment::Bullish => "Bullish",
            Sentiment::Bearish => "Bearish",
            Sentiment::Neutral => "Neutral",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Search =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub body: String,
    /// Empty for canned fallback entries.
    pub link: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsResult {
    pub title: String,
    pub body: String,
    pub url: String,
    pub date: String,
    pub source: String,
}

//
// ================= Portfolio =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioHolding {
    pub ticker: String,
    #[serde(default)]
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuedHolding {
    pub ticker: String,
    pub quantity: f64,
    pub price: f64,
    pub value: f64,
    pub change_pct: f64,
}

/// Derived valuation. Holdings that could not be resolved or had
/// non-positive quantity are reported in `skipped`, never dropped silently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioValuation {
    pub holdings: Vec<ValuedHolding>,
    pub total_value: f64,
    pub skipped: Vec<String>,
}

//
// ================= Chat / Turn =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Tool invocations requested by an assistant message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// For tool-role messages: the call this result answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn plain(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::Assistant, content)
    }

    /// Assistant message carrying tool-call requests. The calls must be
    /// echoed back before their results, per the chat-completions
    /// message contract.
    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: String::new(),
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    /// Tool-role result message referencing the call it answers.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// A tool invocation requested by the model. `call_id` keeps the wire
/// identifier the backend issued so result messages can reference it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(tool_name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            call_id: Uuid::new_v4().to_string(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// One executed (call, result) pair accumulated within a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolStep {
    pub call: ToolCall,
    pub result: String,
}

//
// ================= Tool Schema =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Array,
    Object,
}

/// Declared parameter of a tool, checked before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub param_type: ParamType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl ParamSpec {
    pub fn required(name: &'static str, param_type: ParamType) -> Self {
        Self { name, param_type, required: true, default: None }
    }

    pub fn optional(
        name: &'static str,
        param_type: ParamType,
        default: serde_json::Value,
    ) -> Self {
        Self { name, param_type, required: false, default: Some(default) }
    }
}

/// Catalog entry the model selects tools from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ParamSpec>,
    pub side_effecting: bool,
}
