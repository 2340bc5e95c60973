//! LLM provider abstraction
//!
//! ```text
//! AgentNode / SupervisorNode
//!         │ complete(messages, tools)
//!         ▼
//!   LLMProvider (trait)
//!         │ implemented by
//!         ▼
//!   RigProvider  ──►  rig-core Gemini client
//! ```

mod provider;
mod rig_adapter;

pub use provider::{LLMProvider, LLMResponse, TokenUsage};
pub use rig_adapter::{gemini_provider, RigProvider};
