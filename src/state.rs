//! # Shared State
//!
//! The message history threaded through one graph run. It is the only
//! channel between nodes: a node reads the whole history and hands back new
//! messages, which the graph appends at the end.

use serde::{Deserialize, Serialize};

/// Who produced a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
    ToolResult,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A single unit of conversation.
///
/// Messages are never edited after creation. `SharedState` only hands out
/// shared references, so once a message is in the history it stays as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,

    /// Display name of the agent that wrote this message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// For tool results: the id of the call being answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
            name: None,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn agent(content: &str) -> Self {
        Self {
            role: Role::Agent,
            content: content.to_string(),
            name: None,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn agent_with_tool_calls(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(tool_calls),
            ..Self::agent(content)
        }
    }

    pub fn tool_result(content: &str, tool_call_id: &str) -> Self {
        Self {
            role: Role::ToolResult,
            content: content.to_string(),
            name: None,
            tool_calls: None,
            tool_call_id: Some(tool_call_id.to_string()),
        }
    }

    /// Attach the author's display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|tc| !tc.is_empty())
    }

    /// The same message with any tool requests dropped.
    pub fn without_tool_calls(mut self) -> Self {
        self.tool_calls = None;
        self
    }
}

/// Append-only message history for one analysis run.
///
/// # Rust Concept: Encapsulation
///
/// The vector is private. The only mutating methods are `append` and
/// `extend`, so no node can delete or reorder earlier messages.
#[derive(Debug, Clone, Serialize)]
pub struct SharedState {
    messages: Vec<Message>,
}

impl SharedState {
    /// Start a run from its initial instruction (message 0).
    pub fn new(initial: Message) -> Self {
        Self {
            messages: vec![initial],
        }
    }

    pub fn from_instruction(instruction: &str) -> Self {
        Self::new(Message::user(instruction))
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Content of the last message, the run's visible result.
    pub fn last_content(&self) -> &str {
        self.last().map(|m| m.content.as_str()).unwrap_or_default()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    /// All tool-result messages, oldest first.
    pub fn tool_results(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role == Role::ToolResult)
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}
