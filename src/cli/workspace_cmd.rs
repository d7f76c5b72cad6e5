//! Workspace command for Foundry.
//!
//! Shows and updates a workspace's progression: advance onboarding, reset it,
//! or change the company stage.

use serde::Serialize;

use crate::core::{Stage, WorkspaceProgression};
use crate::workspace::WorkspaceStore;

/// What to do with the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceAction {
    Show,
    Advance(u32),
    Reset(u32),
    SetStage(Stage),
}

/// Options for the workspace command.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the workspace command.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceOutput {
    pub success: bool,
    pub workspace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progression: Option<WorkspaceProgression>,
    /// Step before the action, when one was stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_step: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkspaceOutput {
    fn failure(workspace_id: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            workspace_id: workspace_id.to_string(),
            progression: None,
            previous_step: None,
            error: Some(error.into()),
        }
    }
}

/// The workspace command implementation.
pub struct WorkspaceCommand<W: WorkspaceStore> {
    store: W,
}

impl<W: WorkspaceStore> WorkspaceCommand<W> {
    pub fn new(store: W) -> Self {
        Self { store }
    }

    pub async fn run(&self, workspace_id: &str, action: WorkspaceAction) -> WorkspaceOutput {
        let previous = match self.store.get_progression(workspace_id).await {
            Ok(previous) => previous,
            Err(e) => return WorkspaceOutput::failure(workspace_id, e.to_string()),
        };
        let previous_step = previous.as_ref().map(|p| p.onboarding_step);

        let result = match action {
            WorkspaceAction::Show => Ok(previous),
            WorkspaceAction::Advance(step) => self
                .store
                .advance_onboarding(workspace_id, step)
                .await
                .map(Some),
            WorkspaceAction::Reset(step) => self
                .store
                .reset_onboarding(workspace_id, step)
                .await
                .map(Some),
            WorkspaceAction::SetStage(stage) => {
                self.store.set_stage(workspace_id, stage).await.map(Some)
            }
        };

        match result {
            Ok(progression) => WorkspaceOutput {
                success: true,
                workspace_id: workspace_id.to_string(),
                progression,
                previous_step,
                error: None,
            },
            Err(e) => WorkspaceOutput::failure(workspace_id, e.to_string()),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &WorkspaceOutput, options: &WorkspaceOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        if let Some(error) = &output.error {
            return format!("Workspace {}: {}\n", output.workspace_id, error);
        }

        match &output.progression {
            None => format!("Workspace {} has no progression yet.\n", output.workspace_id),
            Some(p) => {
                let step = match output.previous_step {
                    Some(previous) if previous != p.onboarding_step => {
                        format!("{} (was {})", p.onboarding_step, previous)
                    }
                    _ => p.onboarding_step.to_string(),
                };
                format!(
                    "Workspace {}\n  Step:    {}\n  Stage:   {}\n  Updated: {}\n",
                    p.workspace_id,
                    step,
                    p.stage,
                    p.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;
    use crate::workspace::KvWorkspaceStore;

    fn command() -> WorkspaceCommand<KvWorkspaceStore<MemoryKvStore>> {
        WorkspaceCommand::new(KvWorkspaceStore::new(MemoryKvStore::new()))
    }

    #[tokio::test]
    async fn test_show_missing_workspace() {
        let cmd = command();
        let output = cmd.run("ws-1", WorkspaceAction::Show).await;

        assert!(output.success);
        assert!(output.progression.is_none());
        assert_eq!(
            cmd.format_output(&output, &WorkspaceOptions::default()),
            "Workspace ws-1 has no progression yet.\n"
        );
    }

    #[tokio::test]
    async fn test_advance_reports_previous_step() {
        let cmd = command();
        cmd.run("ws-1", WorkspaceAction::Advance(2)).await;

        let output = cmd.run("ws-1", WorkspaceAction::Advance(4)).await;

        assert_eq!(output.previous_step, Some(2));
        assert_eq!(output.progression.as_ref().unwrap().onboarding_step, 4);
        let text = cmd.format_output(&output, &WorkspaceOptions::default());
        assert!(text.contains("Step:    4 (was 2)"));
    }

    #[tokio::test]
    async fn test_advance_lower_keeps_step() {
        let cmd = command();
        cmd.run("ws-1", WorkspaceAction::Advance(4)).await;

        let output = cmd.run("ws-1", WorkspaceAction::Advance(1)).await;

        assert!(output.success);
        assert_eq!(output.progression.unwrap().onboarding_step, 4);
    }

    #[tokio::test]
    async fn test_reset_missing_workspace_fails() {
        let cmd = command();
        let output = cmd.run("ghost", WorkspaceAction::Reset(0)).await;

        assert!(!output.success);
        assert!(output.error.unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn test_set_stage() {
        let cmd = command();
        let output = cmd
            .run("ws-1", WorkspaceAction::SetStage(Stage::Launched))
            .await;

        assert_eq!(output.progression.unwrap().stage, Stage::Launched);
    }

    #[tokio::test]
    async fn test_json_output() {
        let cmd = command();
        let output = cmd.run("ws-1", WorkspaceAction::Advance(3)).await;
        let options = WorkspaceOptions {
            json: true,
            ..Default::default()
        };

        let parsed: serde_json::Value =
            serde_json::from_str(&cmd.format_output(&output, &options)).unwrap();
        assert_eq!(parsed["progression"]["onboarding_step"], 3);
        assert_eq!(parsed["progression"]["stage"], "idea");
    }
}
