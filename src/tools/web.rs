//! `search` and `crawl`, the two tools every analyst gets.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::firecrawl::{SearchHit, WebBackend};
use super::{Tool, ToolDefinition};

/// Every failed search starts with this.
pub const SEARCH_ERROR_PREFIX: &str = "Error during search:";

/// Every failed crawl starts with this.
pub const CRAWL_ERROR_PREFIX: &str = "Error during crawl:";

/// Page text kept per search hit.
const DEFAULT_EXCERPT_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
}

#[derive(Debug, Deserialize)]
struct CrawlArgs {
    url: String,
}

/// Broad web search. Best for initial research.
pub struct SearchTool {
    backend: Arc<dyn WebBackend>,
    excerpt_chars: usize,
}

impl SearchTool {
    pub fn new(backend: Arc<dyn WebBackend>) -> Self {
        Self {
            backend,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        }
    }

    /// Limit how much page text each hit contributes.
    pub fn with_excerpt_chars(mut self, chars: usize) -> Self {
        self.excerpt_chars = chars;
        self
    }

    /// Run a query and format the hits, or describe the failure.
    pub async fn search(&self, query: &str) -> String {
        info!(query = %query, "Performing web search");

        match self.backend.search(query).await {
            Ok(hits) => {
                info!(query = %query, count = hits.len(), "Search completed");
                format_hits(query, &hits, self.excerpt_chars)
            }
            Err(e) => {
                warn!(query = %query, error = %e, "Search failed");
                format!("{} {}", SEARCH_ERROR_PREFIX, e)
            }
        }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search".to_string(),
            description: "Search the web for a given query and return the results. \
                          This is best used for broad, initial research."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, arguments: serde_json::Value) -> String {
        match serde_json::from_value::<SearchArgs>(arguments) {
            Ok(args) => self.search(&args.query).await,
            Err(e) => format!("{} invalid arguments: {}", SEARCH_ERROR_PREFIX, e),
        }
    }
}

/// Fetch the main content of one URL. Best when a specific link needs reading.
pub struct CrawlTool {
    backend: Arc<dyn WebBackend>,
}

impl CrawlTool {
    pub fn new(backend: Arc<dyn WebBackend>) -> Self {
        Self { backend }
    }

    pub async fn crawl(&self, url: &str) -> String {
        info!(url = %url, "Crawling page");

        match self.backend.scrape(url).await {
            Ok(page) => format!("Crawled content from {}:\n{}", url, page.markdown),
            Err(e) => {
                warn!(url = %url, error = %e, "Crawl failed");
                format!("{} {}", CRAWL_ERROR_PREFIX, e)
            }
        }
    }
}

#[async_trait]
impl Tool for CrawlTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "crawl".to_string(),
            description: "Crawl a specific URL to get its main content. \
                          This is best used when you have a specific link you need to analyze."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "The absolute URL to fetch"
                    }
                },
                "required": ["url"]
            }),
        }
    }

    async fn call(&self, arguments: serde_json::Value) -> String {
        match serde_json::from_value::<CrawlArgs>(arguments) {
            Ok(args) => self.crawl(&args.url).await,
            Err(e) => format!("{} invalid arguments: {}", CRAWL_ERROR_PREFIX, e),
        }
    }
}

fn format_hits(query: &str, hits: &[SearchHit], excerpt_chars: usize) -> String {
    let mut output = format!("Search results for '{}':\n", query);

    if hits.is_empty() {
        output.push_str("No results found.\n");
        return output;
    }

    for (i, hit) in hits.iter().enumerate() {
        output.push_str(&format!(
            "{}. **{}**\n   URL: {}\n",
            i + 1,
            hit.title.as_deref().unwrap_or("Untitled"),
            hit.url
        ));
        if let Some(description) = hit.description.as_deref().filter(|d| !d.is_empty()) {
            output.push_str(&format!("   {}\n", description));
        }
        if let Some(markdown) = hit.markdown.as_deref().filter(|m| !m.is_empty()) {
            output.push_str(&format!("   Content: {}\n", excerpt(markdown, excerpt_chars)));
        }
    }

    output
}

/// Cut to at most `max` characters, on a char boundary.
fn excerpt(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...[truncated]", &text[..cut]),
        None => text.to_string(),
    }
}
