//! Watch command for Foundry.
//!
//! Mounts a screen through the shell and reports its insight session's state
//! as it changes, until the insight is ready or the time limit runs out.

use std::time::Duration;

use serde::Serialize;

use crate::core::ScreenId;
use crate::error::{exit_codes, FoundryError, Result};
use crate::insight::{SyncState, SyncStats};
use crate::shell::Shell;

/// Options for the watch command.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Keep watching after the first ready payload.
    pub follow: bool,
    /// Give up after this long.
    pub limit: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            json: false,
            quiet: false,
            follow: false,
            limit: Duration::from_secs(60),
        }
    }
}

/// Output format for the watch command.
#[derive(Debug, Clone, Serialize)]
pub struct WatchOutput {
    pub screen: String,
    pub navigated: bool,
    /// The screen is locked at the current onboarding step.
    pub denied: bool,
    /// Every state observed, in order.
    pub states: Vec<SyncState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<SyncStats>,
    /// Whether the watch ended on a ready payload.
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WatchOutput {
    /// Process exit code: a locked screen is a denial, any other failure an
    /// error.
    pub fn exit_code(&self) -> i32 {
        if self.denied {
            exit_codes::DENIED
        } else if self.error.is_some() {
            exit_codes::ERROR
        } else {
            exit_codes::OK
        }
    }
}

/// The watch command implementation.
pub struct WatchCommand {
    shell: Shell,
}

impl WatchCommand {
    pub fn new(shell: Shell) -> Self {
        Self { shell }
    }

    pub fn shell(&self) -> &Shell {
        &self.shell
    }

    /// Watch `screen`, calling `report` for every state change as it happens.
    pub async fn run(
        &mut self,
        screen: &str,
        options: &WatchOptions,
        mut report: impl FnMut(&SyncState),
    ) -> WatchOutput {
        let mut output = WatchOutput {
            screen: screen.to_string(),
            navigated: false,
            denied: false,
            states: Vec::new(),
            stats: None,
            ready: false,
            error: None,
        };

        if let Err(e) = self.shell.load_progression().await {
            tracing::warn!(error = %e, "loading progression failed, treating as step 0");
        }

        let target = match ScreenId::parse(screen) {
            Some(target) => target,
            None => {
                output.error = Some(FoundryError::unknown_screen(screen).to_string());
                return output;
            }
        };

        match self.shell.navigate(target) {
            Ok(outcome) if outcome.is_navigated() => output.navigated = true,
            Ok(_) => {
                output.denied = true;
                output.error = Some(format!(
                    "{} is locked at the current onboarding step",
                    target
                ));
                return output;
            }
            Err(e) => {
                output.error = Some(e.to_string());
                return output;
            }
        }

        let Some(session) = self.shell.mounted_session() else {
            output.error = Some(format!("{} has no insight to watch", target));
            return output;
        };
        let mut updates = session.subscribe();

        let watched = tokio::time::timeout(options.limit, async {
            loop {
                let state = updates.borrow_and_update().clone();
                report(&state);
                let ready = matches!(state, SyncState::Ready { .. });
                output.states.push(state);
                if ready {
                    output.ready = true;
                    if !options.follow {
                        return Ok(());
                    }
                }
                if updates.changed().await.is_err() {
                    return Err(FoundryError::invalid_state("session closed"));
                }
            }
        })
        .await;

        match watched {
            Ok(Ok(())) => {}
            Ok(Err(e)) => output.error = Some(e.to_string()),
            Err(_) if options.follow => {}
            Err(_) => {
                output.error = Some(
                    FoundryError::timeout("watch", options.limit.as_millis() as u64).to_string(),
                )
            }
        }

        output.stats = self.shell.mounted_session().map(|s| s.stats());
        self.shell.shutdown();
        output
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &WatchOutput, options: &WatchOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        let mut text = String::new();
        if let Some(payload) = output.states.last().and_then(SyncState::payload) {
            text.push_str(&serde_json::to_string_pretty(payload).unwrap_or_default());
            text.push('\n');
        }
        if let Some(stats) = &output.stats {
            text.push_str(&format!(
                "fetches: {}  triggers: {}  failures: {}  discarded: {}\n",
                stats.fetches,
                stats.triggers,
                stats.fetch_failures + stats.trigger_failures,
                stats.discarded
            ));
        }
        if let Some(error) = &output.error {
            text.push_str(&format!("Error: {}\n", error));
        }
        text
    }
}

/// One-line progress rendering used while watching.
pub fn format_state_line(state: &SyncState) -> String {
    format!("[{}] {}", state.name(), state.describe())
}

/// Resolve the watch limit from a seconds argument.
pub fn limit_from_secs(secs: Option<u64>) -> Result<Duration> {
    match secs {
        None => Ok(WatchOptions::default().limit),
        Some(0) => Err(FoundryError::config("watch limit must be at least 1 second")),
        Some(secs) => Ok(Duration::from_secs(secs)),
    }
}
