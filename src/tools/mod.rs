//! # Tools Module
//!
//! The tool layer agents may call mid-turn: `search` and `crawl`, both backed
//! by Firecrawl. Tools always answer with text. A failed fetch comes back as
//! an error-prefixed string so the model can work around the gap.

pub mod firecrawl;
mod web;

pub use firecrawl::{FirecrawlClient, FirecrawlError, ScrapedPage, SearchHit, WebBackend};
pub use web::{CrawlTool, SearchTool, CRAWL_ERROR_PREFIX, SEARCH_ERROR_PREFIX};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::state::ToolCall;

/// Description of a tool, sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: serde_json::Value,
}

/// A callable tool.
///
/// # Rust Concept: Object-Safe Async Traits
///
/// `#[async_trait]` boxes the returned futures so we can keep tools as
/// `Arc<dyn Tool>` and look them up by name at runtime.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Run the tool. There is no error channel: failures are reported in the text.
    async fn call(&self, arguments: serde_json::Value) -> String;
}

pub type DynTool = Arc<dyn Tool>;

/// The set of tools one agent role is allowed to use.
#[derive(Clone, Default)]
pub struct Toolbox {
    tools: Vec<DynTool>,
}

impl Toolbox {
    pub fn new(tools: Vec<DynTool>) -> Self {
        Self { tools }
    }

    /// `search` and `crawl` over the given backend.
    pub fn web(backend: Arc<dyn WebBackend>, excerpt_chars: usize) -> Self {
        Self::new(vec![
            Arc::new(SearchTool::new(backend.clone()).with_excerpt_chars(excerpt_chars)),
            Arc::new(CrawlTool::new(backend)),
        ])
    }

    /// Keep only the tools whose names are listed.
    pub fn restricted_to(&self, names: &[&str]) -> Self {
        let tools = self
            .tools
            .iter()
            .filter(|t| names.contains(&t.definition().name.as_str()))
            .cloned()
            .collect();
        Self { tools }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.definition().name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute one requested call. Unknown tools produce text, not an error.
    pub async fn execute(&self, call: &ToolCall) -> String {
        match self.tools.iter().find(|t| t.definition().name == call.name) {
            Some(tool) => {
                debug!(tool = %call.name, call_id = %call.id, "Executing tool call");
                tool.call(call.arguments.clone()).await
            }
            None => {
                warn!(tool = %call.name, "Model requested a tool this role cannot use");
                format!("Unknown tool: {}", call.name)
            }
        }
    }
}

impl std::fmt::Debug for Toolbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolbox")
            .field("tools", &self.names())
            .finish()
    }
}
