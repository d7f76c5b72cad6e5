//! Insight command for Foundry.
//!
//! Publishes and inspects envelopes in the file-backed insight store, and
//! lists the compute triggers that sync sessions have recorded.

use serde::Serialize;
use serde_json::Value;

use crate::insight::{
    FileInsightStore, InsightEnvelope, InsightKind, InsightStore, InsightSubjectKey, TriggerRecord,
};

/// What to do with the store.
#[derive(Debug, Clone, PartialEq)]
pub enum InsightAction {
    /// Publish an envelope; `payload: None` publishes a pending one.
    Put {
        key: InsightSubjectKey,
        payload: Option<Value>,
        queue_depth: u32,
    },
    Show {
        key: InsightSubjectKey,
    },
    Triggers,
}

/// Options for the insight command.
#[derive(Debug, Clone, Default)]
pub struct InsightOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the insight command.
#[derive(Debug, Clone, Serialize)]
pub struct InsightOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub envelope: Option<InsightEnvelope>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<TriggerRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InsightOutput {
    fn empty() -> Self {
        Self {
            success: true,
            subject: None,
            envelope: None,
            triggers: Vec::new(),
            error: None,
        }
    }

    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::empty()
        }
    }
}

/// Build a subject key from a kind name and a subject id.
pub fn parse_subject(kind: &str, subject_id: &str) -> Option<InsightSubjectKey> {
    let kind = InsightKind::parse(kind)?;
    Some(InsightSubjectKey::new(subject_id, kind))
}

/// The insight command implementation.
pub struct InsightCommand {
    store: FileInsightStore,
}

impl InsightCommand {
    pub fn new(store: FileInsightStore) -> Self {
        Self { store }
    }

    pub async fn run(&self, action: &InsightAction) -> InsightOutput {
        match action {
            InsightAction::Put {
                key,
                payload,
                queue_depth,
            } => {
                let envelope = InsightEnvelope {
                    payload: payload.clone(),
                    queue_depth: *queue_depth,
                };
                match self.store.write_envelope(key, &envelope).await {
                    Ok(()) => InsightOutput {
                        subject: Some(key.to_string()),
                        envelope: Some(envelope),
                        ..InsightOutput::empty()
                    },
                    Err(e) => InsightOutput::failure(e.to_string()),
                }
            }
            InsightAction::Show { key } => match self.store.fetch_insight(key).await {
                Ok(envelope) => InsightOutput {
                    subject: Some(key.to_string()),
                    envelope: Some(envelope),
                    ..InsightOutput::empty()
                },
                Err(e) => InsightOutput::failure(e.to_string()),
            },
            InsightAction::Triggers => match self.store.read_triggers().await {
                Ok(triggers) => InsightOutput {
                    triggers,
                    ..InsightOutput::empty()
                },
                Err(e) => InsightOutput::failure(e.to_string()),
            },
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &InsightOutput, options: &InsightOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        if let Some(error) = &output.error {
            return format!("Error: {}\n", error);
        }

        if let (Some(subject), Some(envelope)) = (&output.subject, &output.envelope) {
            return match &envelope.payload {
                Some(payload) => format!(
                    "{}: ready\n{}\n",
                    subject,
                    serde_json::to_string_pretty(payload).unwrap_or_default()
                ),
                None => format!(
                    "{}: pending ({} queued ahead)\n",
                    subject, envelope.queue_depth
                ),
            };
        }

        if output.triggers.is_empty() {
            return "No compute triggers recorded.\n".to_string();
        }
        output
            .triggers
            .iter()
            .map(|t| {
                format!(
                    "{}  {}/{}\n",
                    t.ts.format("%Y-%m-%d %H:%M:%S"),
                    t.kind,
                    t.subject_id
                )
            })
            .collect()
    }
}
