//! Agent orchestrator
//!
//! Drives one conversational turn: retrieve the user's relevant
//! history, prompt the model with the tool catalog, execute requested
//! tools, feed results back, and return a final answer. The loop is
//! bounded, model failures map to typed apology branches, and history
//! persistence is best-effort only.

use crate::history::HistoryStore;
use crate::llm::{LanguageModel, ModelError, ModelReply};
use crate::models::{ChatMessage, ToolCall, ToolStep};
use crate::tools::ToolRegistry;
use std::sync::Arc;
use tracing::{info, warn};

/// Upper bound on model/tool round-trips within a single turn.
pub const MAX_TOOL_ITERATIONS: usize = 10;

/// History entries retrieved per turn.
const HISTORY_K: usize = 5;

const CAPACITY_APOLOGY: &str = "I apologize, but I'm currently experiencing high demand. \
Please try again in a few moments.";

const TIMEOUT_APOLOGY: &str = "I apologize for the delay. The request timed out. \
Please try asking your question again.";

const ITERATION_FALLBACK: &str = "I apologize, but I couldn't complete the analysis within \
a reasonable number of steps. Please try rephrasing your question.";

/// Result of one handled turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub answer: String,
    /// Names of tools executed during the turn, in order.
    pub tools_used: Vec<String>,
}

impl TurnOutcome {
    fn answer_only(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            tools_used: Vec::new(),
        }
    }
}

/// Immutable snapshot of a turn in progress. Each tool step yields a
/// new context instead of mutating the previous one.
#[derive(Debug, Clone)]
struct TurnContext {
    messages: Vec<ChatMessage>,
    steps: Vec<ToolStep>,
}

impl TurnContext {
    fn new(system_prompt: String, user_input: &str) -> Self {
        Self {
            messages: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(user_input),
            ],
            steps: Vec::new(),
        }
    }

    /// Echo the model's tool-call request as an assistant message. The
    /// chat-completions contract requires it to precede the results.
    fn with_tool_calls(&self, calls: &[ToolCall]) -> Self {
        let mut next = self.clone();
        next.messages
            .push(ChatMessage::assistant_tool_calls(calls.to_vec()));
        next
    }

    fn with_step(&self, step: ToolStep) -> Self {
        let mut next = self.clone();
        next.messages.push(ChatMessage::tool_result(
            step.call.call_id.clone(),
            step.result.clone(),
        ));
        next.steps.push(step);
        next
    }

    fn tools_used(&self) -> Vec<String> {
        self.steps
            .iter()
            .map(|step| step.call.tool_name.clone())
            .collect()
    }
}

fn system_prompt(history: &[String]) -> String {
    let mut prompt = String::from(
        "You are a knowledgeable financial advisor assistant specializing in Indian markets: \
         NSE/BSE equities, the Nifty 50 index, gold and real estate. \
         Use the available tools to fetch current data before answering. \
         Be concise, practical and specific, and remind users that investments carry risk.",
    );

    if !history.is_empty() {
        prompt.push_str("\n\nRelevant conversation history:\n");
        for line in history {
            prompt.push_str(line);
            prompt.push('\n');
        }
    }

    prompt
}

/// Agent orchestrator with injected model, tool registry and history.
pub struct Orchestrator {
    model: Box<dyn LanguageModel>,
    registry: ToolRegistry,
    history: Arc<dyn HistoryStore>,
}

impl Orchestrator {
    pub fn new(
        model: Box<dyn LanguageModel>,
        registry: ToolRegistry,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            model,
            registry,
            history,
        }
    }

    /// Handle one user turn. Always returns presentable text, never an
    /// error.
    pub async fn handle_turn(&self, user_id: &str, input: &str) -> TurnOutcome {
        let history = match self.history.retrieve(user_id, input, HISTORY_K).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(user_id = %user_id, "History retrieval failed: {}", e);
                Vec::new()
            }
        };

        let descriptors = self.registry.descriptors();
        let mut context = TurnContext::new(system_prompt(&history), input);

        for iteration in 0..MAX_TOOL_ITERATIONS {
            let reply = match self.model.generate(&context.messages, &descriptors).await {
                Ok(reply) => reply,
                Err(ModelError::RateLimited) => {
                    warn!(user_id = %user_id, "Model over capacity");
                    return TurnOutcome::answer_only(CAPACITY_APOLOGY);
                }
                Err(ModelError::Timeout) => {
                    warn!(user_id = %user_id, "Model request timed out");
                    return TurnOutcome::answer_only(TIMEOUT_APOLOGY);
                }
                Err(ModelError::Other(raw)) => {
                    warn!(user_id = %user_id, "Model failure: {}", raw);
                    return TurnOutcome::answer_only(format!(
                        "I apologize, but I encountered an error processing your request: {}",
                        raw
                    ));
                }
            };

            match reply {
                ModelReply::Answer(answer) => {
                    info!(
                        user_id = %user_id,
                        iterations = iteration,
                        tools = context.steps.len(),
                        "Turn completed"
                    );
                    self.persist(user_id, input, &answer).await;
                    return TurnOutcome {
                        answer,
                        tools_used: context.tools_used(),
                    };
                }
                ModelReply::ToolCalls(calls) => {
                    context = context.with_tool_calls(&calls);
                    for call in calls {
                        let result = match self.registry.dispatch(&call).await {
                            Ok(output) => output,
                            // Unknown names and bad arguments go back to
                            // the model as text so it can self-correct.
                            Err(e) => format!("Tool error: {}", e),
                        };
                        context = context.with_step(ToolStep { call, result });
                    }
                }
            }
        }

        warn!(user_id = %user_id, "Tool iteration limit reached");
        self.persist(user_id, input, ITERATION_FALLBACK).await;
        TurnOutcome {
            answer: ITERATION_FALLBACK.to_string(),
            tools_used: context.tools_used(),
        }
    }

    /// Best-effort history write; failures are logged, never surfaced.
    /// The two lines are written independently so one failed write does
    /// not drop the other half of the exchange.
    async fn persist(&self, user_id: &str, input: &str, answer: &str) {
        if let Err(e) = self.history.record(user_id, &format!("Human: {}", input)).await {
            warn!(user_id = %user_id, "Failed to record user message: {}", e);
        }
        if let Err(e) = self.history.record(user_id, &format!("AI: {}", answer)).await {
            warn!(user_id = %user_id, "Failed to record assistant message: {}", e);
        }
    }
}
