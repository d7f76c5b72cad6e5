//! Access command for Foundry.
//!
//! Shows the access tier of every screen (or one screen) for a workspace,
//! either from its stored progression or from an explicit step.

use serde::Serialize;

use crate::core::{AccessPolicy, AccessTier, ScreenId, WorkspaceProgression};
use crate::error::{FailOpen, Result};
use crate::workspace::WorkspaceStore;

/// Options for the access command.
#[derive(Debug, Clone, Default)]
pub struct AccessOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Classify at this step instead of the stored progression.
    pub step: Option<u32>,
    /// Only this screen (raw id).
    pub screen: Option<String>,
}

/// One row of the access table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenAccess {
    pub screen: String,
    pub title: String,
    pub group: String,
    pub tier: AccessTier,
}

/// Output format for the access command.
#[derive(Debug, Clone, Serialize)]
pub struct AccessOutput {
    pub success: bool,
    pub workspace_id: String,
    /// Step the table was computed at (`None` means no progression).
    pub step: Option<u32>,
    pub screens: Vec<ScreenAccess>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AccessOutput {
    /// Whether every listed screen is reachable.
    pub fn all_reachable(&self) -> bool {
        self.screens.iter().all(|s| s.tier.is_reachable())
    }
}

/// The access command implementation.
pub struct AccessCommand<W: WorkspaceStore> {
    store: W,
    policy: AccessPolicy,
}

impl<W: WorkspaceStore> AccessCommand<W> {
    pub fn new(store: W, policy: AccessPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn run(&self, workspace_id: &str, options: &AccessOptions) -> AccessOutput {
        let progression = match options.step {
            Some(step) => Some(WorkspaceProgression::new(workspace_id).with_step(step)),
            None => {
                let loaded: Result<Option<WorkspaceProgression>> =
                    self.store.get_progression(workspace_id).await;
                loaded.fail_open_default("loading progression")
            }
        };

        let screens = match &options.screen {
            Some(raw) => match ScreenId::parse(raw) {
                Some(screen) => vec![screen],
                None => {
                    return AccessOutput {
                        success: false,
                        workspace_id: workspace_id.to_string(),
                        step: progression.as_ref().map(|p| p.onboarding_step),
                        screens: vec![ScreenAccess {
                            screen: raw.clone(),
                            title: String::new(),
                            group: String::new(),
                            tier: self.policy.classify_id(raw, progression.as_ref()),
                        }],
                        error: Some(format!("unknown screen: {}", raw)),
                    };
                }
            },
            None => ScreenId::ALL.to_vec(),
        };

        let rows = screens
            .into_iter()
            .map(|screen| {
                let descriptor = screen.descriptor();
                ScreenAccess {
                    screen: screen.as_str().to_string(),
                    title: descriptor.title.to_string(),
                    group: descriptor.group.as_str().to_string(),
                    tier: self.policy.classify(screen, progression.as_ref()),
                }
            })
            .collect();

        AccessOutput {
            success: true,
            workspace_id: workspace_id.to_string(),
            step: progression.as_ref().map(|p| p.onboarding_step),
            screens: rows,
            error: None,
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &AccessOutput, options: &AccessOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_text(output)
        }
    }

    fn format_text(&self, output: &AccessOutput) -> String {
        let mut text = match output.step {
            Some(step) => format!("Workspace {} at step {}\n\n", output.workspace_id, step),
            None => format!(
                "Workspace {} has no progression (treated as step 0)\n\n",
                output.workspace_id
            ),
        };
        if let Some(error) = &output.error {
            text.push_str(&format!("Error: {}\n", error));
        }
        for row in &output.screens {
            text.push_str(&format!(
                "  {:<10} {:<20} {}\n",
                row.tier.as_str(),
                row.screen,
                row.title
            ));
        }
        text
    }
}
