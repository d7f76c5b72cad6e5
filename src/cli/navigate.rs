//! Navigate command for Foundry.
//!
//! Resumes a workspace's saved navigation state in a shell, moves it to
//! another screen and saves the result. Locked targets leave the saved state
//! untouched.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::config::Config;
use crate::core::{AccessTier, NavigationEvent, NavigationState};
use crate::insight::InsightStore;
use crate::shell::Shell;
use crate::storage::{KvStore, KvStoreExt};
use crate::workspace::WorkspaceStore;

/// Key under which a workspace's navigation state is saved.
pub fn navigation_key(workspace_id: &str) -> String {
    format!("navigation.{}", workspace_id)
}

/// Options for the navigate command.
#[derive(Debug, Clone, Default)]
pub struct NavigateOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the navigate command.
#[derive(Debug, Clone, Serialize)]
pub struct NavigateOutput {
    /// Whether the screen changed.
    pub navigated: bool,
    pub from: String,
    /// Screen shown after the attempt.
    pub current: String,
    pub target: String,
    /// Tier of the target under the workspace's progression.
    pub tier: AccessTier,
    /// Event the shell published for the change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<NavigationEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The navigate command implementation.
pub struct NavigateCommand<K: KvStore> {
    kv: K,
    config: Config,
    insights: Arc<dyn InsightStore>,
    workspaces: Arc<dyn WorkspaceStore>,
}

impl<K: KvStore> NavigateCommand<K> {
    pub fn new(
        kv: K,
        config: Config,
        insights: Arc<dyn InsightStore>,
        workspaces: Arc<dyn WorkspaceStore>,
    ) -> Self {
        Self {
            kv,
            config,
            insights,
            workspaces,
        }
    }

    pub async fn run(&self, workspace_id: &str, target: &str) -> NavigateOutput {
        let key = navigation_key(workspace_id);
        let saved: NavigationState = self.kv.get(&key, NavigationState::default());
        let mut shell = Shell::new(
            &self.config,
            workspace_id,
            Arc::clone(&self.insights),
            Arc::clone(&self.workspaces),
        )
        .with_navigation(saved);

        let published: Arc<Mutex<Option<NavigationEvent>>> = Arc::default();
        let _subscription = shell.on_navigation({
            let published = Arc::clone(&published);
            move |event| {
                let NavigationEvent::ScreenChanged { from, to, tier } = event;
                tracing::info!(%from, %to, %tier, "screen changed");
                *published.lock().unwrap_or_else(|p| p.into_inner()) = Some(event.clone());
            }
        });

        if let Err(e) = shell.load_progression().await {
            tracing::warn!(error = %e, "loading progression failed, treating as step 0");
        }

        let from = shell.current_screen();
        let attempted = shell.navigate_id(target);
        let tier = shell.policy().classify_id(target, shell.progression());

        let mut output = NavigateOutput {
            navigated: false,
            from: from.as_str().to_string(),
            current: shell.current_screen().as_str().to_string(),
            target: target.to_string(),
            tier,
            event: None,
            error: None,
        };
        match attempted {
            Ok(outcome) => output.navigated = outcome.is_navigated(),
            // The screen change stands even when its session failed to start
            Err(e) => {
                output.navigated = true;
                output.error = Some(format!("mounting {}: {}", target, e));
            }
        }
        shell.shutdown();
        output.event = published.lock().unwrap_or_else(|p| p.into_inner()).take();

        if output.navigated {
            if let Err(e) = self.kv.set(&key, shell.navigation()) {
                output.error = Some(format!("saving navigation state: {}", e));
            }
        }
        output
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &NavigateOutput, options: &NavigateOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        let mut text = if output.navigated {
            format!(
                "{} -> {} ({})\n",
                output.from, output.current, output.tier
            )
        } else {
            format!(
                "{} is {}; still on {}\n",
                output.target, output.tier, output.current
            )
        };
        if let Some(error) = &output.error {
            text.push_str(&format!("Warning: {}\n", error));
        }
        text
    }
}
