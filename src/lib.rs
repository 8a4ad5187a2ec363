//! Financial Advisor Agent
//!
//! A conversational financial advisory assistant for Indian markets:
//! - Live Nifty 50, stock, gold and real estate data with graceful
//!   synthetic fallbacks
//! - Web and news search with canned keyword fallbacks
//! - Per-user conversation history with similarity retrieval
//! - A schema-typed tool catalog driven by a pluggable language model
//! - REST surface: webhook, health, market status and token-gated query
//!
//! TURN LOOP:
//! HISTORY → MODEL → TOOLS → MODEL → ... → ANSWER

pub mod agent;
pub mod api;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod market;
pub mod models;
pub mod report;
pub mod search;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use config::{Config, ModelChoice};
