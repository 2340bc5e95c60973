//! # Agent Module
//!
//! The three specialist analysts and the node that runs one of them.
//!
//! A node turn reads the shared history, adds its role directive, and lets
//! the model call `search`/`crawl` as often as it needs (up to a bound)
//! before it writes its analysis. The graph only ever sees the result: the
//! tool exchange plus exactly one terminal message.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::llm::{LLMProvider, TokenUsage};
use crate::state::{Message, SharedState};
use crate::tools::Toolbox;

/// Default number of tool-call rounds per node turn.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 5;

/// Added to the model input once the tool budget is spent.
const TOOL_BUDGET_EXHAUSTED: &str = "You have used all of your tool calls for this turn. \
Do not request any more tools. Write your analysis now using only the evidence gathered above, \
and say plainly where data could not be found.";

const LAUNCH_ANALYST_INSTRUCTION: &str = r#"
You are the **Product Launch Analyst**. Your role is to analyze a competitor's product launch strategy.
Focus on positioning, messaging, launch tactics, and differentiation.
Use the provided tools to search for launch announcements, product pages, and press releases.
Present your findings as a concise analysis.
"#;

const SENTIMENT_ANALYST_INSTRUCTION: &str = r#"
You are the **Market Sentiment Specialist**. Your job is to find out what the market is saying about a product.
Search for reviews, social media discussions (e.g., on Reddit, Twitter), and forum comments.
Summarize the key positive and negative sentiment drivers.
"#;

const METRICS_ANALYST_INSTRUCTION: &str = r#"
You are the **Launch Metrics Specialist**. Your task is to find publicly available data and KPIs related to a product launch.
Look for user numbers, adoption rates, press coverage mentions, and any reported performance indicators.
Provide a summary of the quantitative and qualitative signals of the launch's success.
"#;

/// Appended to every specialist directive.
const EVIDENCE_RULES: &str = "If a tool returns an error, note that the data is missing. \
Never invent figures that no tool result supports.";

// =============================================================================
// SPECIALISTS
// =============================================================================

/// The three analysts the supervisor can delegate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialist {
    LaunchAnalyst,
    SentimentAnalyst,
    MetricsAnalyst,
}

impl Specialist {
    pub const ALL: [Specialist; 3] = [
        Specialist::LaunchAnalyst,
        Specialist::SentimentAnalyst,
        Specialist::MetricsAnalyst,
    ];

    /// Graph node name.
    pub fn node_name(&self) -> &'static str {
        match self {
            Specialist::LaunchAnalyst => "launch_analyst",
            Specialist::SentimentAnalyst => "sentiment_analyst",
            Specialist::MetricsAnalyst => "metrics_analyst",
        }
    }

    /// Display name. This is also the routing label the supervisor answers with.
    pub fn label(&self) -> &'static str {
        match self {
            Specialist::LaunchAnalyst => "Product Launch Analyst",
            Specialist::SentimentAnalyst => "Market Sentiment Specialist",
            Specialist::MetricsAnalyst => "Launch Metrics Specialist",
        }
    }

    /// One-line description for the team roster.
    pub fn summary(&self) -> &'static str {
        match self {
            Specialist::LaunchAnalyst => "GTM strategist",
            Specialist::SentimentAnalyst => "Consumer perception guru",
            Specialist::MetricsAnalyst => "Performance analyst",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            Specialist::LaunchAnalyst => LAUNCH_ANALYST_INSTRUCTION,
            Specialist::SentimentAnalyst => SENTIMENT_ANALYST_INSTRUCTION,
            Specialist::MetricsAnalyst => METRICS_ANALYST_INSTRUCTION,
        }
    }
}

impl fmt::Display for Specialist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.node_name())
    }
}

// =============================================================================
// ROLE DESCRIPTOR
// =============================================================================

/// Static configuration of one role: who it is, what it is told, which
/// tools it may use. Built once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRole {
    pub name: String,
    pub instruction: String,
    pub allowed_tools: Vec<String>,
}

impl AgentRole {
    pub fn new(name: impl Into<String>, instruction: impl Into<String>, allowed_tools: &[&str]) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
            allowed_tools: allowed_tools.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Descriptor for a specialist: its instruction plus `search` and `crawl`.
    pub fn specialist(specialist: Specialist) -> Self {
        let instruction = format!("{}\n{}", specialist.instruction().trim(), EVIDENCE_RULES);
        Self::new(specialist.label(), instruction, &["search", "crawl"])
    }

    pub fn directive(&self) -> Message {
        Message::user(&self.instruction)
    }
}

// =============================================================================
// NODE TURN
// =============================================================================

/// What one node turn hands back to the graph.
#[derive(Debug, Clone)]
pub struct NodeTurn {
    /// Agent messages carrying tool calls, each followed by its tool results.
    pub exchange: Vec<Message>,
    /// The one terminal message of the turn.
    pub reply: Message,
    pub usage: TokenUsage,
}

impl NodeTurn {
    pub fn tool_call_count(&self) -> usize {
        self.exchange
            .iter()
            .filter_map(|m| m.tool_calls.as_ref())
            .map(Vec::len)
            .sum()
    }

    /// Messages to append, in order.
    pub fn into_messages(self) -> Vec<Message> {
        let mut messages = self.exchange;
        messages.push(self.reply);
        messages
    }
}

// =============================================================================
// AGENT NODE
// =============================================================================

/// Runs one role against the shared history.
///
/// # Rust Concept: Shared Ownership with Arc
///
/// The provider and role are behind `Arc` so every node (and every
/// concurrent run) can share them without copying.
#[derive(Clone)]
pub struct AgentNode {
    role: Arc<AgentRole>,
    llm: Arc<dyn LLMProvider>,
    toolbox: Toolbox,
    max_tool_rounds: usize,
}

impl AgentNode {
    /// The toolbox is narrowed to the role's allowed tools.
    pub fn new(role: AgentRole, llm: Arc<dyn LLMProvider>, toolbox: &Toolbox) -> Self {
        let allowed: Vec<&str> = role.allowed_tools.iter().map(String::as_str).collect();
        let toolbox = toolbox.restricted_to(&allowed);

        Self {
            role: Arc::new(role),
            llm,
            toolbox,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn role(&self) -> &AgentRole {
        &self.role
    }

    /// Execute one turn.
    ///
    /// Model failures propagate (fatal for the run). Tool failures do not:
    /// they arrive as error-prefixed tool-result text.
    pub async fn run(&self, state: &SharedState) -> Result<NodeTurn> {
        info!(agent = %self.role.name, history = state.len(), "Agent turn starting");

        let mut context: Vec<Message> = state.messages().to_vec();
        context.push(self.role.directive());

        let definitions = self.toolbox.definitions();
        let mut exchange = Vec::new();
        let mut usage = TokenUsage::default();

        let mut round = 0;
        loop {
            let budget_spent = round >= self.max_tool_rounds;
            let offered = if budget_spent || self.toolbox.is_empty() {
                Vec::new()
            } else {
                definitions.clone()
            };
            if budget_spent && round > 0 {
                warn!(agent = %self.role.name, rounds = round, "Tool budget exhausted, asking for final answer");
                context.push(Message::user(TOOL_BUDGET_EXHAUSTED));
            }

            debug!(agent = %self.role.name, round, tools = offered.len(), "Calling model");
            let response = self.llm.complete(&context, &offered).await?;
            if let Some(u) = response.usage {
                usage += u;
            }
            let message = response.message.with_name(self.role.name.clone());

            if !message.has_tool_calls() {
                info!(agent = %self.role.name, rounds = round, "Agent turn finished");
                return Ok(NodeTurn {
                    exchange,
                    reply: message,
                    usage,
                });
            }

            if offered.is_empty() {
                warn!(agent = %self.role.name, "Model requested tools that were not offered; dropping them");
                return Ok(NodeTurn {
                    exchange,
                    reply: message.without_tool_calls(),
                    usage,
                });
            }

            let calls = message.tool_calls.clone().unwrap_or_default();
            context.push(message.clone());
            exchange.push(message);

            // One at a time, in the order requested.
            for call in &calls {
                let output = self.toolbox.execute(call).await;
                let result = Message::tool_result(&output, &call.id).with_name(call.name.clone());
                context.push(result.clone());
                exchange.push(result);
            }
            round += 1;
        }
    }
}

impl fmt::Debug for AgentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentNode")
            .field("role", &self.role.name)
            .field("provider", &self.llm.name())
            .field("toolbox", &self.toolbox)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .finish()
    }
}

// =============================================================================
// UNIT TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LaunchIntelError;
    use crate::llm::LLMResponse;
    use crate::state::{Role, ToolCall};
    use crate::tools::{FirecrawlError, ScrapedPage, SearchHit, ToolDefinition, WebBackend};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed list of model responses and records what it was offered
    struct ScriptedLLM {
        responses: Mutex<VecDeque<Result<Message>>>,
        offered_tools: Mutex<Vec<usize>>,
        inputs: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedLLM {
        fn new(responses: Vec<Result<Message>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                offered_tools: Mutex::new(Vec::new()),
                inputs: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedLLM {
        async fn complete(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LLMResponse> {
            self.offered_tools.lock().unwrap().push(tools.len());
            self.inputs.lock().unwrap().push(messages.to_vec());
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Message::agent("out of script")));
            next.map(|m| LLMResponse::new(m).with_usage(TokenUsage::new(10, 5)))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct StaticWeb;

    #[async_trait]
    impl WebBackend for StaticWeb {
        async fn search(&self, _query: &str) -> std::result::Result<Vec<SearchHit>, FirecrawlError> {
            Ok(vec![SearchHit {
                url: "https://acme.example/launch".to_string(),
                title: Some("Acme launch".to_string()),
                description: None,
                markdown: None,
            }])
        }

        async fn scrape(&self, _url: &str) -> std::result::Result<ScrapedPage, FirecrawlError> {
            Err(FirecrawlError::Timeout)
        }
    }

    fn search_call(id: &str) -> Message {
        Message::agent_with_tool_calls(
            "",
            vec![ToolCall::new(id, "search", serde_json::json!({"query": "Acme launch"}))],
        )
    }

    fn node(llm: Arc<ScriptedLLM>) -> AgentNode {
        let toolbox = Toolbox::web(Arc::new(StaticWeb), 500);
        AgentNode::new(AgentRole::specialist(Specialist::LaunchAnalyst), llm, &toolbox)
    }

    #[test]
    fn test_labels_are_distinct() {
        let labels: std::collections::HashSet<_> = Specialist::ALL.iter().map(|s| s.label()).collect();
        assert_eq!(labels.len(), 3);
        assert_eq!(Specialist::SentimentAnalyst.to_string(), "sentiment_analyst");
    }

    #[test]
    fn test_specialist_role_descriptor() {
        let role = AgentRole::specialist(Specialist::MetricsAnalyst);

        assert_eq!(role.name, "Launch Metrics Specialist");
        assert!(role.instruction.contains("KPIs"));
        assert!(role.instruction.contains("Never invent figures"));
        assert_eq!(role.allowed_tools, vec!["search", "crawl"]);
        assert_eq!(role.directive().role, Role::User);
    }

    #[tokio::test]
    async fn test_turn_without_tools() {
        let llm = Arc::new(ScriptedLLM::new(vec![Ok(Message::agent("Analysis."))]));
        let state = SharedState::from_instruction("Analyze Acme");

        let turn = node(llm.clone()).run(&state).await.unwrap();

        assert!(turn.exchange.is_empty());
        assert_eq!(turn.reply.content, "Analysis.");
        assert_eq!(turn.reply.name.as_deref(), Some("Product Launch Analyst"));
        assert_eq!(turn.usage.total_tokens, 15);

        // The model saw the history plus the directive, which is not part of the turn.
        let inputs = llm.inputs.lock().unwrap();
        assert_eq!(inputs[0].len(), 2);
        assert!(inputs[0][1].content.contains("Product Launch Analyst"));
    }

    #[tokio::test]
    async fn test_tool_loop_yields_one_terminal_message() {
        let llm = Arc::new(ScriptedLLM::new(vec![
            Ok(search_call("c1")),
            Ok(Message::agent_with_tool_calls(
                "",
                vec![ToolCall::new("c2", "crawl", serde_json::json!({"url": "https://acme.example/launch"}))],
            )),
            Ok(Message::agent("Acme positions Rocket as premium.")),
        ]));
        let state = SharedState::from_instruction("Analyze Acme");

        let turn = node(llm).run(&state).await.unwrap();

        assert_eq!(turn.tool_call_count(), 2);
        assert_eq!(turn.exchange.len(), 4);
        assert!(turn.exchange[1].content.starts_with("Search results for 'Acme launch':"));
        assert!(turn.exchange[3].content.starts_with("Error during crawl:"));
        assert!(!turn.reply.has_tool_calls());

        let messages = turn.into_messages();
        assert_eq!(messages.iter().filter(|m| m.role == Role::Agent && !m.has_tool_calls()).count(), 1);
    }

    #[tokio::test]
    async fn test_tool_budget_forces_final_answer() {
        let llm = Arc::new(ScriptedLLM::new(vec![
            Ok(search_call("c1")),
            Ok(search_call("c2")),
            Ok(Message::agent("Done with what I have.")),
        ]));
        let state = SharedState::from_instruction("Analyze Acme");

        let turn = node(llm.clone())
            .with_max_tool_rounds(2)
            .run(&state)
            .await
            .unwrap();

        assert_eq!(turn.tool_call_count(), 2);
        assert_eq!(turn.reply.content, "Done with what I have.");
        // Tools offered on the first two calls, withheld on the last.
        assert_eq!(*llm.offered_tools.lock().unwrap(), vec![2, 2, 0]);
    }

    #[tokio::test]
    async fn test_tool_requests_after_budget_are_dropped() {
        let llm = Arc::new(ScriptedLLM::new(vec![
            Ok(search_call("c1")),
            Ok(Message::agent_with_tool_calls(
                "Partial analysis.",
                vec![ToolCall::new("c2", "search", serde_json::json!({"query": "more"}))],
            )),
        ]));
        let state = SharedState::from_instruction("Analyze Acme");

        let turn = node(llm).with_max_tool_rounds(1).run(&state).await.unwrap();

        assert_eq!(turn.reply.content, "Partial analysis.");
        assert!(!turn.reply.has_tool_calls());
    }

    #[tokio::test]
    async fn test_model_failure_is_fatal() {
        let llm = Arc::new(ScriptedLLM::new(vec![
            Ok(search_call("c1")),
            Err(LaunchIntelError::Llm("quota exceeded".to_string())),
        ]));
        let state = SharedState::from_instruction("Analyze Acme");

        let err = node(llm).run(&state).await.unwrap_err();
        assert!(matches!(err, LaunchIntelError::Llm(ref msg) if msg.contains("quota")));
    }

    #[tokio::test]
    async fn test_disallowed_tool_becomes_text() {
        let llm = Arc::new(ScriptedLLM::new(vec![
            Ok(Message::agent_with_tool_calls(
                "",
                vec![ToolCall::new("c1", "send_email", serde_json::json!({}))],
            )),
            Ok(Message::agent("Could not email anyone.")),
        ]));
        let state = SharedState::from_instruction("Analyze Acme");

        let turn = node(llm).run(&state).await.unwrap();
        assert_eq!(turn.exchange[1].content, "Unknown tool: send_email");
    }
}
