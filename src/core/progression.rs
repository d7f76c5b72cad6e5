//! Workspace progression types.
//!
//! The progression of a workspace (how far onboarding has come, which stage the
//! company is in) is the single input to every access decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progression state of one workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspaceProgression {
    /// Workspace identifier.
    pub workspace_id: String,
    /// How far the workspace has progressed through setup.
    pub onboarding_step: u32,
    /// Company stage.
    pub stage: Stage,
    /// When the progression last changed.
    pub updated_at: DateTime<Utc>,
}

impl WorkspaceProgression {
    /// Create a progression at step 0 in the `Idea` stage.
    pub fn new(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            onboarding_step: 0,
            stage: Stage::default(),
            updated_at: Utc::now(),
        }
    }

    /// Builder-style step setter.
    pub fn with_step(mut self, step: u32) -> Self {
        self.onboarding_step = step;
        self
    }

    /// Builder-style stage setter.
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    /// Raise the onboarding step to at least `step`.
    ///
    /// Returns `true` if the step changed. Lower values are ignored, so the
    /// step never regresses through this path.
    pub fn advance_to(&mut self, step: u32) -> bool {
        if step <= self.onboarding_step {
            return false;
        }
        self.onboarding_step = step;
        self.updated_at = Utc::now();
        true
    }

    /// Set the onboarding step unconditionally, including downwards.
    ///
    /// Only administrative reset paths call this.
    pub fn reset_to(&mut self, step: u32) {
        self.onboarding_step = step;
        self.updated_at = Utc::now();
    }

    /// Change the company stage.
    pub fn set_stage(&mut self, stage: Stage) {
        if self.stage != stage {
            self.stage = stage;
            self.updated_at = Utc::now();
        }
    }
}

/// Company stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Exploring an idea.
    #[default]
    Idea,
    /// Talking to customers, validating the problem.
    Validation,
    /// Building the first product.
    Building,
    /// Product is live.
    Launched,
    /// Growing the team and revenue.
    Scaling,
}

impl Stage {
    /// All stages, in order.
    pub const ALL: [Stage; 5] = [
        Stage::Idea,
        Stage::Validation,
        Stage::Building,
        Stage::Launched,
        Stage::Scaling,
    ];

    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idea => "idea",
            Stage::Validation => "validation",
            Stage::Building => "building",
            Stage::Launched => "launched",
            Stage::Scaling => "scaling",
        }
    }

    /// Parse a snake_case stage name.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
