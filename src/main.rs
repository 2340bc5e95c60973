//! # Launch Intel CLI
//!
//! Ask the launch intelligence team about a company or product.
//!
//! ## Quick Start
//! ```bash
//! cargo run -- "Humane Pin" --analysis sentiment
//! ```

// =============================================================================
// IMPORTS
// =============================================================================
use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use launch_intel::supervisor::{team_roster, FINISH_LABEL};
use launch_intel::{AnalysisKind, AnalysisRequest, Config, CoordinationGraph, LaunchIntelError};

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
/// # Rust Concept: Derive Macros with Clap
///
/// Clap's derive feature lets us define CLI arguments as a struct.
/// `ValueEnum` turns `AnalysisKind` into a checked `--analysis` value.
#[derive(Parser, Debug)]
#[command(
    name = "launch-intel",
    version,
    about = "A team of AI analysts that researches product launches",
    long_about = r#"
Launch Intel - product launch intelligence from a coordinated agent team.

A supervisor delegates your request to one of three specialists:
  - Product Launch Analyst       (competitor launch strategy)
  - Market Sentiment Specialist  (reviews and social chatter)
  - Launch Metrics Specialist    (public KPIs and coverage)
The specialist searches and crawls the web, then the supervisor writes a
markdown report with a Sources section.

PREREQUISITES:
  GOOGLE_API_KEY     Gemini API key
  FIRECRAWL_API_KEY  Firecrawl API key
Both may also be placed in a .env file.

EXAMPLES:
  launch-intel "Rabbit R1"
  launch-intel --analysis metrics "Perplexity"
  launch-intel --status
"#
)]
struct Args {
    /// Company or product to analyze
    #[arg(value_name = "COMPANY", required_unless_present = "status")]
    company: Option<String>,

    #[arg(
        short = 'a',
        long = "analysis",
        value_enum,
        default_value_t = AnalysisKind::Competitor,
        help = "Kind of analysis to run"
    )]
    analysis: AnalysisKind,

    /// Gemini model (overrides GEMINI_MODEL)
    #[arg(short = 'm', long = "model", help = "Gemini model to use", env = "GEMINI_MODEL")]
    model: Option<String>,

    #[arg(
        short = 't',
        long = "timeout",
        value_name = "SECS",
        help = "Abort the analysis after this many seconds",
        env = "RUN_TIMEOUT_SECS"
    )]
    timeout: Option<u64>,

    /// Print readiness and the team roster, then exit
    #[arg(long = "status", default_value = "false")]
    status: bool,

    #[arg(
        short = 'v',
        long = "verbose",
        help = "Enable verbose/debug logging",
        default_value = "false"
    )]
    verbose: bool,
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            report_failure(&e);
            return Ok(ExitCode::FAILURE);
        }
    };

    init_logging(args.verbose, &config.log_level)?;

    if args.status {
        print_status(&config);
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(model) = args.model {
        info!(model = %model, "Using model from command line");
        config.model = model;
    }
    if let Some(secs) = args.timeout {
        config.run_timeout = Some(Duration::from_secs(secs));
    }

    let company = args.company.unwrap_or_default();
    let request = match AnalysisRequest::new(args.analysis, &company) {
        Ok(request) => request,
        Err(e) => {
            report_failure(&e);
            return Ok(ExitCode::FAILURE);
        }
    };

    // Readiness is checked before anything is built.
    let graph = match CoordinationGraph::from_config(&config) {
        Ok(graph) => graph,
        Err(e) => {
            report_failure(&e);
            return Ok(ExitCode::FAILURE);
        }
    };

    info!(
        company = %request.subject(),
        analysis = %request.kind(),
        model = %config.model,
        "Gemini team is analyzing"
    );

    match graph.run(request.into_state()).await {
        Ok(outcome) => {
            let report = outcome.report().trim();
            println!("\n{}", "=".repeat(60));
            println!("{} ANALYSIS: {}", args.analysis.to_string().to_uppercase(), company.trim());
            println!("{}\n", "=".repeat(60));
            if report == FINISH_LABEL {
                println!("The team ended the run without writing a report.");
            } else {
                println!("{}", report);
            }
            println!("\n{}", "=".repeat(60));

            info!(
                steps = outcome.steps(),
                input_tokens = outcome.usage.input_tokens,
                output_tokens = outcome.usage.output_tokens,
                "Analysis completed"
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "Analysis failed");
            report_failure(&e);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Print the failure once, on stderr. The caller exits with `ExitCode::FAILURE`
/// instead of returning the error, so it is not printed a second time.
fn report_failure(e: &LaunchIntelError) {
    eprintln!("\n{}", failure_message(e));
}

/// One visible line per failure class, plus a hint where we have one.
fn failure_message(e: &LaunchIntelError) -> String {
    match e {
        LaunchIntelError::MissingCredential(key) => format!(
            "❌ System not ready: {} is not set\n\n💡 Tip: export {} or add it to a .env file",
            key, key
        ),
        LaunchIntelError::Llm(msg) => format!(
            "❌ Model failure: {}\n\n💡 Tip: check your Gemini quota and GOOGLE_API_KEY",
            msg
        ),
        LaunchIntelError::Timeout(budget) => {
            format!("⏱  Analysis timed out after {}s", budget.as_secs())
        }
        LaunchIntelError::Config(_) => format!("❌ {}", e),
        other => format!("❌ Analysis failed: {}", other),
    }
}

fn print_status(config: &Config) {
    let missing = config.missing_credentials();
    println!("System Status");
    if missing.is_empty() {
        println!("  ✅ Gemini Intelligence Team ready (model: {})", config.model);
    } else {
        println!("  ❌ API keys required: {} not set", missing.join(", "));
    }

    println!("\nCoordinated Team");
    for (name, summary) in team_roster() {
        println!("  {:<30} {}", name, summary);
    }
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// Initialize the tracing subscriber for structured logging.
///
/// Logs go to stderr so stdout carries only the report.
fn init_logging(verbose: bool, default_level: &str) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(default_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["test", "Acme Corp"]);
        assert_eq!(args.company.as_deref(), Some("Acme Corp"));
        assert_eq!(args.analysis, AnalysisKind::Competitor);
        assert!(!args.status);
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_with_flags() {
        let args = Args::parse_from([
            "test",
            "--analysis",
            "sentiment",
            "--verbose",
            "--model",
            "gemini-2.0-flash",
            "--timeout",
            "120",
            "Humane Pin",
        ]);

        assert_eq!(args.company.as_deref(), Some("Humane Pin"));
        assert_eq!(args.analysis, AnalysisKind::Sentiment);
        assert!(args.verbose);
        assert_eq!(args.model, Some("gemini-2.0-flash".to_string()));
        assert_eq!(args.timeout, Some(120));
    }

    #[test]
    fn test_status_needs_no_company() {
        let args = Args::parse_from(["test", "--status"]);
        assert!(args.status);
        assert!(args.company.is_none());
    }

    #[test]
    fn test_company_required_otherwise() {
        assert!(Args::try_parse_from(["test", "--analysis", "metrics"]).is_err());
    }

    #[test]
    fn test_failure_message_names_error_once() {
        let msg = failure_message(&LaunchIntelError::MissingCredential("FIRECRAWL_API_KEY"));
        assert_eq!(msg.matches("System not ready").count(), 1);
        assert!(msg.contains("FIRECRAWL_API_KEY"));

        let msg = failure_message(&LaunchIntelError::Config("SEARCH_LIMIT must be at least 1".to_string()));
        assert_eq!(msg, "❌ Configuration error: SEARCH_LIMIT must be at least 1");

        let msg = failure_message(&LaunchIntelError::Timeout(Duration::from_secs(90)));
        assert!(msg.contains("timed out after 90s"));
    }

    #[test]
    fn test_unknown_analysis_rejected() {
        assert!(Args::try_parse_from(["test", "--analysis", "pricing", "Acme"]).is_err());
    }
}
