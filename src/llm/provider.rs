//! LLM Provider trait definition
//!
//! The one contract every agent node needs from the text-generation model:
//! full message history (plus the tools it may request) in, one complete
//! response out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::Message;
use crate::tools::ToolDefinition;

/// Token usage statistics from a completion.
///
/// ```
/// use launch_intel::llm::TokenUsage;
///
/// let mut total = TokenUsage::new(100, 50);
/// total += TokenUsage::new(20, 5);
/// assert_eq!(total.total_tokens, 175);
/// ```
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input_tokens: input,
            output_tokens: output,
            total_tokens: input + output,
        }
    }

    /// Create from rig-core Usage struct
    pub fn from_rig_usage(usage: &rig::completion::Usage) -> Self {
        Self::new(usage.input_tokens, usage.output_tokens)
    }
}

impl std::ops::Add for TokenUsage {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
        }
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

/// LLM completion response
#[derive(Debug, Clone)]
pub struct LLMResponse {
    /// Agent message; may carry tool call requests
    pub message: Message,
    /// Token usage statistics (if the provider reports them)
    pub usage: Option<TokenUsage>,
}

impl LLMResponse {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Core LLM Provider trait
///
/// Request/response only: if a provider streams internally it must still
/// hand back one complete response per call. A returned `Err` is fatal for
/// the current graph run, there is no fallback model.
///
/// # Example Implementation
///
/// ```rust,ignore
/// struct Canned;
///
/// #[async_trait]
/// impl LLMProvider for Canned {
///     async fn complete(&self, _: &[Message], _: &[ToolDefinition]) -> Result<LLMResponse> {
///         Ok(LLMResponse::new(Message::agent("END")))
///     }
///
///     fn name(&self) -> &str { "canned" }
/// }
/// ```
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion for `messages`, allowing requests for `tools`.
    async fn complete(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LLMResponse>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
