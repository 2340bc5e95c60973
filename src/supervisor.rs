//! # Supervisor Module
//!
//! The coordinating node. Its reply is read twice: once as a routing
//! decision, and (on the finishing path) as the report the user sees.
//!
//! Free text is turned into a [`RoutingDecision`] here, at the boundary.
//! The graph only ever matches on the enum.

use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use crate::agent::Specialist;
use crate::error::Result;
use crate::llm::{LLMProvider, TokenUsage};
use crate::state::{Message, Role, SharedState, ToolCall};

pub const SUPERVISOR_LABEL: &str = "Supervisor";
pub const SUPERVISOR_SUMMARY: &str = "Team coordinator";

/// Label that ends the run without another specialist turn.
pub const FINISH_LABEL: &str = "END";

const SEARCH_TOOL: &str = "search";
const CRAWL_TOOL: &str = "crawl";

const SUPERVISOR_INSTRUCTION: &str = r#"
You are the **Supervisor** of a product intelligence team. Your job is to coordinate the work of three specialists:
{team}

Based on the user's request, delegate the task to the appropriate specialist.
Once the specialist has provided their report, review it and, if sufficient, create a final, well-structured markdown report for the user.
The final report must include a "Sources" section listing all URLs that were crawled or searched.
"#;

const FALLBACK_CAVEAT: &str = "> **Note:** the supervisor did not return a recognized routing decision, \
so this report was assembled from its last reply and may be incomplete.";

/// The `URL:` line written for every search hit.
static HIT_URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*URL:\s*(https?://\S+)\s*$").unwrap());

// =============================================================================
// ROUTING DECISION
// =============================================================================

/// The supervisor's reply, interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    RouteTo(Specialist),
    /// The run is over. Carries the text to show the user.
    Finish(String),
    Unrecognized(String),
}

impl RoutingDecision {
    /// Interpret supervisor output.
    ///
    /// A final report is recognized before labels are tried, so a report
    /// that happens to mention a specialist never routes anywhere. Labels
    /// must match exactly once surrounding whitespace is trimmed.
    pub fn classify(text: &str) -> Self {
        if is_final_report(text) {
            return RoutingDecision::Finish(text.to_string());
        }

        let label = text.trim();
        if label == FINISH_LABEL {
            return RoutingDecision::Finish(text.to_string());
        }

        match Specialist::ALL.iter().find(|s| s.label() == label) {
            Some(specialist) => RoutingDecision::RouteTo(*specialist),
            None => RoutingDecision::Unrecognized(text.to_string()),
        }
    }
}

/// Does the text contain a "Sources" heading line?
///
/// Markdown decoration (`#`, `*`, `:`) around the word is ignored, as is case.
pub fn is_final_report(text: &str) -> bool {
    text.lines().any(|line| {
        line.trim_matches(|c: char| c == '#' || c == '*' || c == ':' || c.is_whitespace())
            .eq_ignore_ascii_case("sources")
    })
}

/// Everything the supervisor is allowed to answer with, besides a report.
pub fn route_labels() -> Vec<&'static str> {
    Specialist::ALL
        .iter()
        .map(|s| s.label())
        .chain(std::iter::once(FINISH_LABEL))
        .collect()
}

/// Display name and one-line description of every team member.
pub fn team_roster() -> Vec<(&'static str, &'static str)> {
    Specialist::ALL
        .iter()
        .map(|s| (s.label(), s.summary()))
        .chain(std::iter::once((SUPERVISOR_LABEL, SUPERVISOR_SUMMARY)))
        .collect()
}

// =============================================================================
// SOURCE LEDGER
// =============================================================================

/// What the run searched for and fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLedger {
    pub queries: Vec<String>,
    pub urls: Vec<String>,
}

impl SourceLedger {
    /// Walk the history oldest first. Queries and crawl targets come from
    /// the tool-call arguments, so a failed call is still listed. Search
    /// hits come from the `URL:` lines of successful search results. Links
    /// inside crawled pages and error text are not sources. Duplicates are
    /// dropped, first occurrence wins.
    pub fn from_state(state: &SharedState) -> Self {
        let mut ledger = Self::default();

        for message in state.messages() {
            match message.role {
                Role::Agent => {
                    for call in message.tool_calls.iter().flatten() {
                        ledger.record_call(call);
                    }
                }
                Role::ToolResult if message.name.as_deref() == Some(SEARCH_TOOL) => {
                    for caps in HIT_URL_RE.captures_iter(&message.content) {
                        push_unique(&mut ledger.urls, caps[1].to_string());
                    }
                }
                _ => {}
            }
        }

        ledger
    }

    fn record_call(&mut self, call: &ToolCall) {
        let argument = |key: &str| {
            call.arguments
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        match call.name.as_str() {
            SEARCH_TOOL => {
                if let Some(query) = argument("query") {
                    push_unique(&mut self.queries, query);
                }
            }
            CRAWL_TOOL => {
                if let Some(url) = argument("url") {
                    push_unique(&mut self.urls, url);
                }
            }
            _ => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty() && self.urls.is_empty()
    }

    /// A markdown "Sources" section.
    pub fn render(&self) -> String {
        let mut out = String::from("## Sources\n");
        if self.is_empty() {
            out.push_str("- No sources were searched or crawled in this run.\n");
            return out;
        }
        for query in &self.queries {
            out.push_str(&format!("- Search: \"{}\"\n", query));
        }
        for url in &self.urls {
            out.push_str(&format!("- {}\n", url));
        }
        out
    }
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}

/// Report used when the supervisor never produced a usable decision.
pub fn compose_fallback_report(raw: &str, state: &SharedState) -> String {
    let body = raw.trim();
    let body = if body.is_empty() { "No final report was produced." } else { body };
    format!(
        "{}\n\n{}\n\n{}",
        body,
        FALLBACK_CAVEAT,
        SourceLedger::from_state(state).render()
    )
}

// =============================================================================
// SUPERVISOR NODE
// =============================================================================

/// One supervisor turn.
#[derive(Debug, Clone)]
pub struct SupervisorTurn {
    pub reply: Message,
    pub decision: RoutingDecision,
    pub usage: TokenUsage,
}

/// The supervisor never calls tools; it only reads the history.
#[derive(Clone)]
pub struct SupervisorNode {
    llm: Arc<dyn LLMProvider>,
}

impl SupervisorNode {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self { llm }
    }

    /// Directive for the current history: role framing, the label table and
    /// the sources gathered so far.
    pub fn directive(&self, state: &SharedState) -> String {
        let team = Specialist::ALL
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {}", i + 1, s.label()))
            .collect::<Vec<_>>()
            .join("\n");

        let labels = route_labels()
            .iter()
            .map(|l| format!("- {}", l))
            .collect::<Vec<_>>()
            .join("\n");

        let ledger = SourceLedger::from_state(state);
        let sources = if ledger.is_empty() {
            "No sources have been gathered yet.".to_string()
        } else {
            ledger.render()
        };

        format!(
            "{}\nTo delegate, reply with exactly one of these labels and nothing else:\n{}\n\
Reply {} alone only if the team cannot make further progress.\n\
To finish, reply with the final report. Its \"Sources\" heading is what marks it as final.\n\n\
Sources gathered so far:\n{}\n\nThe user's request is the first message above.",
            SUPERVISOR_INSTRUCTION.replace("{team}", &team).trim(),
            labels,
            FINISH_LABEL,
            sources.trim_end()
        )
    }

    /// Run one turn. `correction` is added to the model input when the
    /// previous reply could not be interpreted.
    pub async fn run(&self, state: &SharedState, correction: Option<&str>) -> Result<SupervisorTurn> {
        let mut context = state.messages().to_vec();
        context.push(Message::user(&self.directive(state)));
        if let Some(note) = correction {
            context.push(Message::user(note));
        }

        debug!(history = state.len(), reprompt = correction.is_some(), "Supervisor deciding");
        let response = self.llm.complete(&context, &[]).await?;

        if response.message.has_tool_calls() {
            warn!("Supervisor requested tools; ignoring them");
        }
        let reply = response.message.without_tool_calls().with_name(SUPERVISOR_LABEL);

        let decision = RoutingDecision::classify(&reply.content);
        match &decision {
            RoutingDecision::RouteTo(s) => info!(specialist = %s, "Supervisor delegated"),
            RoutingDecision::Finish(_) => info!("Supervisor finished"),
            RoutingDecision::Unrecognized(raw) => {
                warn!(chars = raw.len(), "Supervisor reply is neither a label nor a report")
            }
        }

        Ok(SupervisorTurn {
            reply,
            decision,
            usage: response.usage.unwrap_or_default(),
        })
    }

    /// Corrective note for a reprompt.
    pub fn correction_note(previous: &str) -> String {
        let preview: String = previous.trim().chars().take(200).collect();
        format!(
            "Your previous reply (\"{}\") was neither a routing label nor a final report. \
Reply with exactly one of: {}. Or write the final report, including a \"Sources\" section.",
            preview,
            route_labels().join(", ")
        )
    }
}

impl std::fmt::Debug for SupervisorNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorNode")
            .field("provider", &self.llm.name())
            .finish()
    }
}
