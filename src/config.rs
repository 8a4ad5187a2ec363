//! Runtime configuration
//!
//! All environment access happens here, once at startup. The rest of
//! the crate receives an explicit `Config` instead of ambient lookups.

use crate::error::AdvisorError;
use crate::Result;
use std::env;

/// Model backend selector. Two recognized values: a hosted backend
/// ("groq") and a local one ("ollama").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelChoice {
    Groq,
    Ollama,
}

impl ModelChoice {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "groq" => Ok(ModelChoice::Groq),
            "ollama" => Ok(ModelChoice::Ollama),
            other => Err(AdvisorError::ConfigError(format!(
                "Invalid LLM_MODEL_CHOICE '{}'. Use 'groq' or 'ollama'.",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Hosted model API key. Empty key degrades model calls to errors,
    /// it is not startup-fatal (the agent still answers with apologies).
    pub groq_api_key: String,
    pub ollama_url: String,
    pub model_choice: ModelChoice,

    /// Quote chart API base URL. Optional: provider falls back per policy.
    pub quote_api_url: String,
    /// Search API base URL. Optional: provider falls back to canned data.
    pub search_api_url: String,

    /// Bearer token for the authenticated query surface. Required.
    pub auth_token: String,
    /// Identity string returned by the validate endpoint.
    pub my_number: String,

    pub port: u16,
}

impl Config {
    /// Load from the environment. A missing AUTH_TOKEN is the one
    /// startup-fatal condition; everything else has a workable default.
    pub fn from_env() -> Result<Self> {
        let auth_token = env::var("AUTH_TOKEN").map_err(|_| {
            AdvisorError::ConfigError(
                "AUTH_TOKEN is not set; the authenticated query surface cannot start"
                    .to_string(),
            )
        })?;

        let model_choice = ModelChoice::parse(
            &env::var("LLM_MODEL_CHOICE").unwrap_or_else(|_| "groq".to_string()),
        )?;

        let port = env::var("PORT")
            .or_else(|_| env::var("API_PORT"))
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .map_err(|e| AdvisorError::ConfigError(format!("Invalid PORT: {}", e)))?;

        Ok(Self {
            groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
            ollama_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model_choice,
            quote_api_url: env::var("QUOTE_API_URL")
                .unwrap_or_else(|_| "https://query1.finance.yahoo.com".to_string()),
            search_api_url: env::var("SEARCH_API_URL").unwrap_or_default(),
            auth_token,
            my_number: env::var("MY_NUMBER").unwrap_or_default(),
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_choice_parsing() {
        assert_eq!(ModelChoice::parse("groq").unwrap(), ModelChoice::Groq);
        assert_eq!(ModelChoice::parse("Ollama").unwrap(), ModelChoice::Ollama);
        assert!(ModelChoice::parse("claude").is_err());
    }
}
