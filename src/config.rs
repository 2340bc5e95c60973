//! # Configuration Module
//!
//! Loads settings from environment variables (and a `.env` file, if any).
//! It demonstrates several important Rust patterns:
//! - The Default trait for sensible defaults
//! - Injecting the environment as a closure so loading is testable
//! - Parsing strings into typed values with `FromStr`

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{LaunchIntelError, Result};
use crate::tools::firecrawl::DEFAULT_BASE_URL;

pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
pub const FIRECRAWL_API_KEY: &str = "FIRECRAWL_API_KEY";

// =============================================================================
// UNRECOGNIZED ROUTE POLICY
// =============================================================================

/// What the graph does when the supervisor answers with something that is
/// neither a known label nor a final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnrecognizedRoutePolicy {
    /// Ask the supervisor again (bounded), then finish with what it said.
    #[default]
    Reprompt,
    /// Finish immediately with the supervisor's text as the report.
    Finish,
    /// Abort the run with an error.
    Fail,
}

impl FromStr for UnrecognizedRoutePolicy {
    type Err = LaunchIntelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reprompt" => Ok(Self::Reprompt),
            "finish" => Ok(Self::Finish),
            "fail" => Ok(Self::Fail),
            other => Err(LaunchIntelError::Config(format!(
                "UNRECOGNIZED_ROUTE_POLICY must be reprompt, finish or fail, got: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for UnrecognizedRoutePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reprompt => "reprompt",
            Self::Finish => "finish",
            Self::Fail => "fail",
        };
        f.write_str(name)
    }
}

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================

/// Main configuration for the launch intelligence team.
///
/// # Rust Concept: Option for "may be absent"
///
/// The two API keys are `Option<String>`: a missing key is not a load
/// error. It only matters when a run is about to start (see `credentials`).
#[derive(Clone)]
pub struct Config {
    /// Key for the Gemini text-generation model
    pub google_api_key: Option<String>,

    /// Key for the Firecrawl search/crawl API
    pub firecrawl_api_key: Option<String>,

    pub model: String,

    /// 0.0 keeps answers deterministic
    pub temperature: f64,

    pub firecrawl_url: String,

    /// Results requested per search
    pub search_limit: usize,

    /// Page text kept per search hit
    pub max_content_chars: usize,

    pub http_timeout: Duration,

    /// Tool-call rounds per specialist turn
    pub max_tool_rounds: usize,

    /// Node executions per run
    pub max_graph_steps: usize,

    pub unrecognized_route_policy: UnrecognizedRoutePolicy,

    pub max_reprompts: usize,

    /// Wall-clock budget for one run; `None` means unbounded
    pub run_timeout: Option<Duration>,

    pub log_level: String,
}

// =============================================================================
// DEFAULT IMPLEMENTATION
// =============================================================================
impl Default for Config {
    fn default() -> Self {
        Self {
            google_api_key: None,
            firecrawl_api_key: None,
            model: "gemini-1.5-pro-latest".to_string(),
            temperature: 0.0,
            firecrawl_url: DEFAULT_BASE_URL.to_string(),
            search_limit: 5,
            max_content_chars: 2000,
            http_timeout: Duration::from_secs(30),
            max_tool_rounds: 5,
            // Matches the usual recursion limit of a graph runtime.
            max_graph_steps: 25,
            unrecognized_route_policy: UnrecognizedRoutePolicy::Reprompt,
            max_reprompts: 1,
            run_timeout: None,
            log_level: "info".to_string(),
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl Config {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first, if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    ///
    /// # Rust Concept: Closures as Parameters
    ///
    /// `impl Fn(&str) -> Option<String>` accepts `env::var` in production and
    /// a `HashMap` lookup in tests, without touching global state.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        // Empty keys are treated as unset.
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        config.google_api_key = non_empty(GOOGLE_API_KEY);
        config.firecrawl_api_key = non_empty(FIRECRAWL_API_KEY);

        if let Some(val) = non_empty("GEMINI_MODEL") {
            config.model = val;
        }
        if let Some(val) = non_empty("FIRECRAWL_API_URL") {
            config.firecrawl_url = val.trim_end_matches('/').to_string();
        }
        if let Some(val) = non_empty("TEMPERATURE") {
            config.temperature = parse_var("TEMPERATURE", &val)?;
        }
        if let Some(val) = non_empty("SEARCH_LIMIT") {
            config.search_limit = parse_var("SEARCH_LIMIT", &val)?;
        }
        if let Some(val) = non_empty("MAX_CONTENT_CHARS") {
            config.max_content_chars = parse_var("MAX_CONTENT_CHARS", &val)?;
        }
        if let Some(val) = non_empty("HTTP_TIMEOUT_SECS") {
            config.http_timeout = Duration::from_secs(parse_var("HTTP_TIMEOUT_SECS", &val)?);
        }
        if let Some(val) = non_empty("MAX_TOOL_ROUNDS") {
            config.max_tool_rounds = parse_var("MAX_TOOL_ROUNDS", &val)?;
        }
        if let Some(val) = non_empty("MAX_GRAPH_STEPS") {
            config.max_graph_steps = parse_var("MAX_GRAPH_STEPS", &val)?;
        }
        if let Some(val) = non_empty("UNRECOGNIZED_ROUTE_POLICY") {
            config.unrecognized_route_policy = val.parse()?;
        }
        if let Some(val) = non_empty("MAX_REPROMPTS") {
            config.max_reprompts = parse_var("MAX_REPROMPTS", &val)?;
        }
        if let Some(val) = non_empty("RUN_TIMEOUT_SECS") {
            config.run_timeout = Some(Duration::from_secs(parse_var("RUN_TIMEOUT_SECS", &val)?));
        }
        if let Some(val) = non_empty("RUST_LOG") {
            config.log_level = val;
        }

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(LaunchIntelError::Config(format!(
                "Temperature must be between 0.0 and 2.0, got: {}",
                self.temperature
            )));
        }

        if self.model.trim().is_empty() {
            return Err(LaunchIntelError::Config("GEMINI_MODEL cannot be empty".to_string()));
        }

        if self.search_limit == 0 {
            return Err(LaunchIntelError::Config("SEARCH_LIMIT must be at least 1".to_string()));
        }

        if self.max_content_chars == 0 {
            return Err(LaunchIntelError::Config("MAX_CONTENT_CHARS must be at least 1".to_string()));
        }

        // supervisor + one specialist + supervisor is the shortest useful run
        if self.max_graph_steps < 3 {
            return Err(LaunchIntelError::Config(format!(
                "MAX_GRAPH_STEPS must be at least 3, got: {}",
                self.max_graph_steps
            )));
        }

        if self.http_timeout.is_zero() {
            return Err(LaunchIntelError::Config("HTTP_TIMEOUT_SECS must be positive".to_string()));
        }

        if self.run_timeout.is_some_and(|t| t.is_zero()) {
            return Err(LaunchIntelError::Config("RUN_TIMEOUT_SECS must be positive".to_string()));
        }

        Ok(())
    }

    /// Both API keys, model key first.
    ///
    /// Fails with `MissingCredential` naming the first key that is absent.
    pub fn credentials(&self) -> Result<Credentials> {
        let google = self
            .google_api_key
            .clone()
            .ok_or(LaunchIntelError::MissingCredential(GOOGLE_API_KEY))?;
        let firecrawl = self
            .firecrawl_api_key
            .clone()
            .ok_or(LaunchIntelError::MissingCredential(FIRECRAWL_API_KEY))?;

        Ok(Credentials {
            google_api_key: google,
            firecrawl_api_key: firecrawl,
        })
    }

    /// Names of the credentials that are not set, in check order.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.google_api_key.is_none() {
            missing.push(GOOGLE_API_KEY);
        }
        if self.firecrawl_api_key.is_none() {
            missing.push(FIRECRAWL_API_KEY);
        }
        missing
    }
}

// Keys are redacted so `{:?}` can go to the logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| if key.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Config")
            .field("google_api_key", &redact(&self.google_api_key))
            .field("firecrawl_api_key", &redact(&self.firecrawl_api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("firecrawl_url", &self.firecrawl_url)
            .field("search_limit", &self.search_limit)
            .field("max_content_chars", &self.max_content_chars)
            .field("http_timeout", &self.http_timeout)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("max_graph_steps", &self.max_graph_steps)
            .field("unrecognized_route_policy", &self.unrecognized_route_policy)
            .field("max_reprompts", &self.max_reprompts)
            .field("run_timeout", &self.run_timeout)
            .finish()
    }
}

/// The two keys a run needs, both present.
#[derive(Clone)]
pub struct Credentials {
    pub google_api_key: String,
    pub firecrawl_api_key: String,
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| LaunchIntelError::Config(format!("{} has an invalid value {:?}: {}", key, value, e)))
}

// =============================================================================
// UNIT TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.model, "gemini-1.5-pro-latest");
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.firecrawl_url, "https://api.firecrawl.dev");
        assert_eq!(config.search_limit, 5);
        assert_eq!(config.max_graph_steps, 25);
        assert_eq!(config.unrecognized_route_policy, UnrecognizedRoutePolicy::Reprompt);
        assert!(config.run_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_vars_overrides() {
        let config = load(&[
            ("GOOGLE_API_KEY", "g-key"),
            ("FIRECRAWL_API_KEY", "fc-key"),
            ("GEMINI_MODEL", "gemini-2.0-flash"),
            ("TEMPERATURE", "0.4"),
            ("FIRECRAWL_API_URL", "http://localhost:3002/"),
            ("MAX_TOOL_ROUNDS", "2"),
            ("UNRECOGNIZED_ROUTE_POLICY", "Fail"),
            ("RUN_TIMEOUT_SECS", "90"),
        ])
        .unwrap();

        assert_eq!(config.model, "gemini-2.0-flash");
        assert!((config.temperature - 0.4).abs() < f64::EPSILON);
        assert_eq!(config.firecrawl_url, "http://localhost:3002");
        assert_eq!(config.max_tool_rounds, 2);
        assert_eq!(config.unrecognized_route_policy, UnrecognizedRoutePolicy::Fail);
        assert_eq!(config.run_timeout, Some(Duration::from_secs(90)));

        let creds = config.credentials().unwrap();
        assert_eq!(creds.google_api_key, "g-key");
        assert_eq!(creds.firecrawl_api_key, "fc-key");
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let err = load(&[("SEARCH_LIMIT", "lots")]).unwrap_err();
        assert!(matches!(err, LaunchIntelError::Config(ref msg) if msg.contains("SEARCH_LIMIT")));
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        assert!(load(&[("UNRECOGNIZED_ROUTE_POLICY", "guess")]).is_err());
    }

    #[test]
    fn test_missing_credentials_named_in_order() {
        let config = load(&[]).unwrap();
        assert!(matches!(
            config.credentials(),
            Err(LaunchIntelError::MissingCredential("GOOGLE_API_KEY"))
        ));
        assert_eq!(config.missing_credentials(), vec![GOOGLE_API_KEY, FIRECRAWL_API_KEY]);

        let config = load(&[("GOOGLE_API_KEY", "g-key")]).unwrap();
        assert!(matches!(
            config.credentials(),
            Err(LaunchIntelError::MissingCredential("FIRECRAWL_API_KEY"))
        ));
    }

    #[test]
    fn test_empty_key_counts_as_missing() {
        let config = load(&[("GOOGLE_API_KEY", "  "), ("FIRECRAWL_API_KEY", "fc-key")]).unwrap();
        assert_eq!(config.missing_credentials(), vec![GOOGLE_API_KEY]);
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let mut config = Config::default();
        config.temperature = 3.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.max_graph_steps = 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.run_timeout = Some(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_content_chars_rejected() {
        let config = load(&[("MAX_CONTENT_CHARS", "0")]).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, LaunchIntelError::Config(ref msg) if msg.contains("MAX_CONTENT_CHARS")));
    }

    #[test]
    fn test_debug_redacts_keys() {
        let config = load(&[("GOOGLE_API_KEY", "super-secret")]).unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<set>"));
    }
}
