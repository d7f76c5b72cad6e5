//! Insight identifiers and server envelopes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Kind of server-computed insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    /// Workspace dashboard summary.
    Dashboard,
    /// Co-founder alignment score.
    FounderAlignment,
    /// Idea validation analysis.
    IdeaAnalysis,
    /// Investor readiness assessment.
    InvestorReadiness,
}

impl InsightKind {
    pub const ALL: [InsightKind; 4] = [
        InsightKind::Dashboard,
        InsightKind::FounderAlignment,
        InsightKind::IdeaAnalysis,
        InsightKind::InvestorReadiness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InsightKind::Dashboard => "dashboard",
            InsightKind::FounderAlignment => "founder_alignment",
            InsightKind::IdeaAnalysis => "idea_analysis",
            InsightKind::InvestorReadiness => "investor_readiness",
        }
    }

    /// Parse a kind name, case-insensitive, `-` or `_` separated.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|k| k.as_str() == normalized)
    }
}

impl std::fmt::Display for InsightKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one independent synchronization stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InsightSubjectKey {
    pub subject_id: String,
    pub kind: InsightKind,
}

impl InsightSubjectKey {
    pub fn new(subject_id: impl Into<String>, kind: InsightKind) -> Self {
        Self {
            subject_id: subject_id.into(),
            kind,
        }
    }
}

impl std::fmt::Display for InsightSubjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.subject_id)
    }
}

/// One atomic server response: the current payload (if computed) together
/// with the number of jobs queued ahead of it.
///
/// `payload` and `queue_depth` always come from the same response; callers
/// must decide on both together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightEnvelope<T = serde_json::Value> {
    pub payload: Option<T>,
    #[serde(default)]
    pub queue_depth: u32,
}

impl<T> InsightEnvelope<T> {
    /// Envelope carrying a computed payload.
    pub fn ready(payload: T) -> Self {
        Self {
            payload: Some(payload),
            queue_depth: 0,
        }
    }

    /// Envelope with no payload yet.
    pub fn pending(queue_depth: u32) -> Self {
        Self {
            payload: None,
            queue_depth,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.payload.is_some()
    }
}

impl InsightEnvelope<serde_json::Value> {
    /// Decode the JSON payload into a concrete type.
    pub fn decode<U: DeserializeOwned>(self) -> Result<InsightEnvelope<U>> {
        let payload = match self.payload {
            Some(value) => Some(serde_json::from_value(value)?),
            None => None,
        };
        Ok(InsightEnvelope {
            payload,
            queue_depth: self.queue_depth,
        })
    }
}
