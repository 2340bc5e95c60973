//! # Launch Intel
//!
//! A supervisor-led team of LLM agents that researches product launches.
//!
//! ```text
//! AnalysisRequest ─► SharedState ─► CoordinationGraph::invoke
//!                                     │
//!                    supervisor ◄─────┴────► specialist (search / crawl)
//!                        │
//!                        └─► end: last message is the report
//! ```
//!
//! ## Modules
//! - [`state`]: messages and the append-only run history
//! - [`tools`]: `search` / `crawl` over Firecrawl, soft-failing to text
//! - [`llm`]: the model contract and its Gemini (rig-core) adapter
//! - [`agent`]: specialist roles and the bounded tool-calling node
//! - [`supervisor`]: routing decisions, final report detection, sources
//! - [`graph`]: the state machine tying it together
//! - [`request`]: building the initial instruction
//! - [`config`]: environment-driven settings

pub mod agent;
pub mod config;
pub mod error;
pub mod graph;
pub mod llm;
pub mod request;
pub mod state;
pub mod supervisor;
pub mod tools;

pub use agent::{AgentNode, AgentRole, NodeTurn, Specialist};
pub use config::{Config, UnrecognizedRoutePolicy};
pub use error::{LaunchIntelError, Result};
pub use graph::{CoordinationGraph, GraphSettings, NodeId, RunOutcome};
pub use request::{AnalysisKind, AnalysisRequest};
pub use state::{Message, Role, SharedState, ToolCall};
pub use supervisor::{RoutingDecision, SupervisorNode};
