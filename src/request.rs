//! Analysis requests: a subject plus the kind of analysis wanted, turned
//! into the initial instruction of a run.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::agent::Specialist;
use crate::error::{LaunchIntelError, Result};
use crate::state::SharedState;

/// The three analyses a user can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Competitor launch strategy
    Competitor,
    /// Market sentiment
    Sentiment,
    /// Launch metrics
    Metrics,
}

impl AnalysisKind {
    /// The specialist the instruction delegates to.
    pub fn specialist(&self) -> Specialist {
        match self {
            AnalysisKind::Competitor => Specialist::LaunchAnalyst,
            AnalysisKind::Sentiment => Specialist::SentimentAnalyst,
            AnalysisKind::Metrics => Specialist::MetricsAnalyst,
        }
    }

    fn topic(&self) -> &'static str {
        match self {
            AnalysisKind::Competitor => "launch strategy",
            AnalysisKind::Sentiment => "market sentiment",
            AnalysisKind::Metrics => "launch metrics",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisKind::Competitor => "competitor",
            AnalysisKind::Sentiment => "sentiment",
            AnalysisKind::Metrics => "metrics",
        };
        f.write_str(name)
    }
}

/// One user request. A fresh `SharedState` is created from it per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    kind: AnalysisKind,
    subject: String,
}

impl AnalysisRequest {
    /// Rejects a blank subject.
    pub fn new(kind: AnalysisKind, subject: &str) -> Result<Self> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(LaunchIntelError::InvalidRequest(
                "a company or product name is required".to_string(),
            ));
        }

        Ok(Self {
            kind,
            subject: subject.to_string(),
        })
    }

    pub fn kind(&self) -> AnalysisKind {
        self.kind
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// e.g. "Analyze the launch strategy for Acme Corp. Delegate to the Product Launch Analyst."
    pub fn instruction(&self) -> String {
        format!(
            "Analyze the {} for {}. Delegate to the {}.",
            self.kind.topic(),
            self.subject,
            self.kind.specialist().label()
        )
    }

    pub fn into_state(self) -> SharedState {
        SharedState::from_instruction(&self.instruction())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instructions() {
        let cases = [
            (
                AnalysisKind::Competitor,
                "Analyze the launch strategy for Acme Corp. Delegate to the Product Launch Analyst.",
            ),
            (
                AnalysisKind::Sentiment,
                "Analyze the market sentiment for Acme Corp. Delegate to the Market Sentiment Specialist.",
            ),
            (
                AnalysisKind::Metrics,
                "Analyze the launch metrics for Acme Corp. Delegate to the Launch Metrics Specialist.",
            ),
        ];

        for (kind, expected) in cases {
            let request = AnalysisRequest::new(kind, "  Acme Corp ").unwrap();
            assert_eq!(request.instruction(), expected);
        }
    }

    #[test]
    fn test_blank_subject_rejected() {
        let err = AnalysisRequest::new(AnalysisKind::Metrics, "   ").unwrap_err();
        assert!(matches!(err, LaunchIntelError::InvalidRequest(_)));
    }

    #[test]
    fn test_into_state_starts_fresh() {
        let state = AnalysisRequest::new(AnalysisKind::Sentiment, "Rabbit R1")
            .unwrap()
            .into_state();

        assert_eq!(state.len(), 1);
        assert!(state.last_content().contains("Rabbit R1"));
    }
}
