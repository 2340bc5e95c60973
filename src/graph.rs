//! # Coordination Graph
//!
//! The state machine that runs one analysis:
//!
//! ```text
//!                ┌──────────────── fixed edge ────────────────┐
//!                ▼                                            │
//!   entry ─► supervisor ─┬─ "Product Launch Analyst" ─► launch_analyst
//!                        ├─ "Market Sentiment Specialist" ─► sentiment_analyst
//!                        ├─ "Launch Metrics Specialist" ─► metrics_analyst
//!                        └─ report / "END" ─► end
//! ```
//!
//! Nodes run strictly one after another. Each run owns its `SharedState`,
//! so independent runs can execute concurrently on the same graph.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::agent::{AgentNode, AgentRole, Specialist, DEFAULT_MAX_TOOL_ROUNDS};
use crate::config::{Config, UnrecognizedRoutePolicy};
use crate::error::{LaunchIntelError, Result};
use crate::llm::{gemini_provider, LLMProvider, TokenUsage};
use crate::state::{Message, SharedState};
use crate::supervisor::{compose_fallback_report, RoutingDecision, SupervisorNode, SUPERVISOR_LABEL};
use crate::tools::{FirecrawlClient, Toolbox, WebBackend};

// =============================================================================
// NODES AND TRANSITIONS
// =============================================================================

/// A state of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Supervisor,
    Specialist(Specialist),
    End,
}

impl NodeId {
    pub fn name(&self) -> &'static str {
        match self {
            NodeId::Supervisor => "supervisor",
            NodeId::Specialist(s) => s.node_name(),
            NodeId::End => "end",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeId::End)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a routing decision leads.
///
/// `None` for an unrecognized reply: what happens then is a policy choice,
/// made by the graph, not a transition.
pub fn route(decision: &RoutingDecision) -> Option<NodeId> {
    match decision {
        RoutingDecision::RouteTo(specialist) => Some(NodeId::Specialist(*specialist)),
        RoutingDecision::Finish(_) => Some(NodeId::End),
        RoutingDecision::Unrecognized(_) => None,
    }
}

// =============================================================================
// SETTINGS
// =============================================================================

/// Limits and policies for a graph run.
#[derive(Debug, Clone)]
pub struct GraphSettings {
    pub max_tool_rounds: usize,
    pub max_steps: usize,
    pub unrecognized_route_policy: UnrecognizedRoutePolicy,
    pub max_reprompts: usize,
    /// Page text kept per search hit
    pub excerpt_chars: usize,
    pub run_timeout: Option<Duration>,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            max_steps: 25,
            unrecognized_route_policy: UnrecognizedRoutePolicy::default(),
            max_reprompts: 1,
            excerpt_chars: 2000,
            run_timeout: None,
        }
    }
}

impl From<&Config> for GraphSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_tool_rounds: config.max_tool_rounds,
            max_steps: config.max_graph_steps,
            unrecognized_route_policy: config.unrecognized_route_policy,
            max_reprompts: config.max_reprompts,
            excerpt_chars: config.max_content_chars,
            run_timeout: config.run_timeout,
        }
    }
}

// =============================================================================
// RUN OUTCOME
// =============================================================================

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: SharedState,
    /// Every node executed, in order, ending in `end`.
    pub path: Vec<NodeId>,
    pub usage: TokenUsage,
}

impl RunOutcome {
    /// The text to show the user: the last message's content.
    pub fn report(&self) -> &str {
        self.state.last_content()
    }

    /// Node executions, not counting `end`.
    pub fn steps(&self) -> usize {
        self.path.iter().filter(|n| !n.is_terminal()).count()
    }
}

// =============================================================================
// COORDINATION GRAPH
// =============================================================================

/// The compiled team: supervisor plus one node per specialist.
///
/// # Rust Concept: Immutable Sharing
///
/// `invoke` takes `&self`. All per-run data lives in a local `Run`, so one
/// graph can serve many concurrent requests.
pub struct CoordinationGraph {
    supervisor: SupervisorNode,
    specialists: HashMap<Specialist, AgentNode>,
    settings: GraphSettings,
}

impl CoordinationGraph {
    pub fn new(llm: Arc<dyn LLMProvider>, backend: Arc<dyn WebBackend>, settings: GraphSettings) -> Self {
        let toolbox = Toolbox::web(backend, settings.excerpt_chars);

        let specialists = Specialist::ALL
            .iter()
            .map(|s| {
                let node = AgentNode::new(AgentRole::specialist(*s), llm.clone(), &toolbox)
                    .with_max_tool_rounds(settings.max_tool_rounds);
                (*s, node)
            })
            .collect();

        Self {
            supervisor: SupervisorNode::new(llm),
            specialists,
            settings,
        }
    }

    /// Build the production graph: Gemini for text, Firecrawl for the web.
    ///
    /// Fails with `MissingCredential` before anything is constructed if
    /// either key is absent.
    pub fn from_config(config: &Config) -> Result<Self> {
        let credentials = config.credentials()?;
        config.validate()?;

        let llm = gemini_provider(&credentials.google_api_key, &config.model, config.temperature)?;
        let backend = FirecrawlClient::new(credentials.firecrawl_api_key)
            .with_base_url(config.firecrawl_url.clone())
            .with_timeout(config.http_timeout)
            .with_search_limit(config.search_limit);

        info!(model = %config.model, firecrawl = %config.firecrawl_url, "Coordination graph ready");
        Ok(Self::new(llm, Arc::new(backend), GraphSettings::from(config)))
    }

    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    /// Run the graph to `end`, honoring the configured run timeout if any.
    pub async fn run(&self, state: SharedState) -> Result<RunOutcome> {
        match self.settings.run_timeout {
            Some(budget) => self.invoke_with_timeout(state, budget).await,
            None => self.invoke(state).await,
        }
    }

    /// Abort with `Timeout` if the run takes longer than `budget`.
    pub async fn invoke_with_timeout(&self, state: SharedState, budget: Duration) -> Result<RunOutcome> {
        match tokio::time::timeout(budget, self.invoke(state)).await {
            Ok(result) => result,
            Err(_) => {
                error!(budget = ?budget, "Analysis run timed out");
                Err(LaunchIntelError::Timeout(budget))
            }
        }
    }

    /// Run the graph from the supervisor until `end`.
    pub async fn invoke(&self, state: SharedState) -> Result<RunOutcome> {
        info!(messages = state.len(), "Graph run starting");
        let mut run = Run::new(state);
        let mut current = NodeId::Supervisor;

        while !current.is_terminal() {
            if run.steps >= self.settings.max_steps {
                error!(limit = self.settings.max_steps, "Graph step limit reached");
                return Err(LaunchIntelError::StepLimit(self.settings.max_steps));
            }
            run.steps += 1;
            run.path.push(current);
            let before = run.state.len();

            current = match current {
                NodeId::Supervisor => self.supervisor_step(&mut run).await?,
                NodeId::Specialist(specialist) => self.specialist_step(&mut run, specialist).await?,
                NodeId::End => NodeId::End,
            };

            debug!(
                step = run.steps,
                appended = run.state.len() - before,
                next = %current,
                "Node finished"
            );
        }

        run.path.push(NodeId::End);
        info!(
            steps = run.steps,
            messages = run.state.len(),
            total_tokens = run.usage.total_tokens,
            "Graph run finished"
        );

        Ok(RunOutcome {
            state: run.state,
            path: run.path,
            usage: run.usage,
        })
    }

    async fn supervisor_step(&self, run: &mut Run) -> Result<NodeId> {
        let correction = run.correction.take();
        let turn = self.supervisor.run(&run.state, correction.as_deref()).await?;
        run.usage += turn.usage;
        run.state.append(turn.reply);

        if let Some(next) = route(&turn.decision) {
            run.reprompts = 0;
            return Ok(next);
        }

        let raw = match turn.decision {
            RoutingDecision::Unrecognized(raw) => raw,
            _ => String::new(),
        };

        match self.settings.unrecognized_route_policy {
            UnrecognizedRoutePolicy::Fail => Err(LaunchIntelError::UnrecognizedRoute(raw)),
            UnrecognizedRoutePolicy::Reprompt if run.reprompts < self.settings.max_reprompts => {
                run.reprompts += 1;
                warn!(attempt = run.reprompts, "Re-prompting supervisor");
                run.correction = Some(SupervisorNode::correction_note(&raw));
                Ok(NodeId::Supervisor)
            }
            _ => {
                warn!("Finishing with a fallback report");
                let report = compose_fallback_report(&raw, &run.state);
                run.state.append(Message::agent(&report).with_name(SUPERVISOR_LABEL));
                Ok(NodeId::End)
            }
        }
    }

    async fn specialist_step(&self, run: &mut Run, specialist: Specialist) -> Result<NodeId> {
        let node = self
            .specialists
            .get(&specialist)
            .ok_or_else(|| LaunchIntelError::Config(format!("no node registered for {}", specialist)))?;

        let turn = node.run(&run.state).await?;
        info!(specialist = %specialist, tool_calls = turn.tool_call_count(), "Specialist reported");
        run.usage += turn.usage;
        run.state.extend(turn.into_messages());

        Ok(NodeId::Supervisor)
    }
}

impl fmt::Debug for CoordinationGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinationGraph")
            .field("supervisor", &self.supervisor)
            .field("specialists", &self.specialists.len())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Per-run bookkeeping.
struct Run {
    state: SharedState,
    path: Vec<NodeId>,
    usage: TokenUsage,
    steps: usize,
    /// Consecutive unrecognized supervisor replies
    reprompts: usize,
    correction: Option<String>,
}

impl Run {
    fn new(state: SharedState) -> Self {
        Self {
            state,
            path: Vec::new(),
            usage: TokenUsage::default(),
            steps: 0,
            reprompts: 0,
            correction: None,
        }
    }
}
