//! Adapter for using a Rig agent as an `LLMProvider`
//!
//! Rig normally runs the tool-calling loop itself. Here we only use its
//! completion API: tool definitions are forwarded so the model can emit
//! tool calls, and the agent node decides what to do with them.

use async_trait::async_trait;
use std::sync::Arc;

use rig::agent::Agent;
use rig::client::CompletionClient;
use rig::completion::{Completion, CompletionModel, Message as RigMessage, ToolDefinition as RigToolDefinition};
use rig::message::{AssistantContent, ToolCall as RigToolCall};
use rig::providers::gemini;
use rig::OneOrMany;
use tracing::debug;

use super::provider::{LLMProvider, LLMResponse, TokenUsage};
use crate::error::{LaunchIntelError, Result};
use crate::state::{Message, Role, ToolCall};
use crate::tools::ToolDefinition;

/// Build the Gemini-backed provider used in production.
///
/// The key is handed to the client directly; the process environment is
/// left alone.
pub fn gemini_provider(api_key: &str, model: &str, temperature: f64) -> Result<Arc<dyn LLMProvider>> {
    let client = gemini::Client::new(api_key)
        .map_err(|e| LaunchIntelError::Llm(format!("failed to build gemini client: {}", e)))?;

    let agent = client.agent(model).temperature(temperature).build();

    Ok(Arc::new(RigProvider::with_names(agent, "gemini", model)))
}

/// Adapter that wraps a Rig `Agent<M>` to implement `LLMProvider`.
pub struct RigProvider<M>
where
    M: CompletionModel + Send + Sync,
{
    agent: Arc<Agent<M>>,
    provider_name: String,
    model_name: String,
}

impl<M> RigProvider<M>
where
    M: CompletionModel + Send + Sync,
{
    /// Create adapter with provider/model names for logging.
    pub fn with_names(agent: Agent<M>, provider_name: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            agent: Arc::new(agent),
            provider_name: provider_name.into(),
            model_name: model_name.into(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[async_trait]
impl<M> LLMProvider for RigProvider<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    async fn complete(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LLMResponse> {
        let (prompt, history) = build_rig_conversation(messages);
        debug!(
            model = %self.model_name,
            history = history.len(),
            tools = tools.len(),
            "Sending completion request"
        );

        let mut builder = self
            .agent
            .completion(prompt, history)
            .await
            .map_err(|e| LaunchIntelError::Llm(format!("{} request failed: {}", self.provider_name, e)))?;

        let rig_tools = to_rig_tool_definitions(tools);
        if !rig_tools.is_empty() {
            builder = builder.tools(rig_tools);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LaunchIntelError::Llm(format!("{} completion failed: {}", self.provider_name, e)))?;

        let message = message_from_rig_choice(&response.choice);
        let usage = TokenUsage::from_rig_usage(&response.usage);

        let mut llm_response = LLMResponse::new(message);
        if usage.total_tokens > 0 {
            llm_response = llm_response.with_usage(usage);
        }

        Ok(llm_response)
    }

    fn name(&self) -> &str {
        &self.provider_name
    }
}

impl<M> std::fmt::Debug for RigProvider<M>
where
    M: CompletionModel + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RigProvider")
            .field("provider_name", &self.provider_name)
            .field("model_name", &self.model_name)
            .finish()
    }
}

/// Split our history into Rig's (prompt, chat history) pair.
///
/// The last message becomes the prompt.
fn build_rig_conversation(messages: &[Message]) -> (RigMessage, Vec<RigMessage>) {
    let mut rig_messages: Vec<RigMessage> = messages
        .iter()
        .map(|message| match message.role {
            Role::User => RigMessage::user(message.content.clone()),
            Role::Agent => convert_agent_message(message),
            Role::ToolResult => convert_tool_result(message),
        })
        .collect();

    let prompt = rig_messages.pop().unwrap_or_else(|| RigMessage::user(""));
    (prompt, rig_messages)
}

fn convert_agent_message(message: &Message) -> RigMessage {
    let mut contents = Vec::new();

    if !message.content.is_empty() {
        contents.push(AssistantContent::text(message.content.clone()));
    }

    if let Some(tool_calls) = &message.tool_calls {
        for call in tool_calls {
            contents.push(AssistantContent::tool_call(
                call.id.clone(),
                call.name.clone(),
                call.arguments.clone(),
            ));
        }
    }

    let content = OneOrMany::many(contents).unwrap_or_else(|_| OneOrMany::one(AssistantContent::text("")));

    RigMessage::Assistant { id: None, content }
}

fn convert_tool_result(message: &Message) -> RigMessage {
    let tool_id = message
        .tool_call_id
        .clone()
        .unwrap_or_else(|| "tool".to_string());
    RigMessage::tool_result(tool_id, message.content.clone())
}

fn to_rig_tool_definitions(tools: &[ToolDefinition]) -> Vec<RigToolDefinition> {
    tools
        .iter()
        .map(|tool| RigToolDefinition {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        })
        .collect()
}

fn message_from_rig_choice(choice: &OneOrMany<AssistantContent>) -> Message {
    let mut content_parts = Vec::new();
    let mut tool_calls = Vec::new();

    for item in choice.iter() {
        match item {
            AssistantContent::Text(text) => content_parts.push(text.text.clone()),
            AssistantContent::ToolCall(tool_call) => tool_calls.push(convert_rig_tool_call(tool_call)),
            _ => {}
        }
    }

    let content = content_parts.join("");

    if tool_calls.is_empty() {
        Message::agent(&content)
    } else {
        Message::agent_with_tool_calls(&content, tool_calls)
    }
}

fn convert_rig_tool_call(tool_call: &RigToolCall) -> ToolCall {
    ToolCall {
        id: tool_call.id.clone(),
        name: tool_call.function.name.clone(),
        arguments: tool_call.function.arguments.clone(),
    }
}
