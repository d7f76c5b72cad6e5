//! Foundry - access gating and insight sync for founder workspaces
//!
//! CLI entry point with global panic handler.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use foundry::cli::access::{AccessCommand, AccessOptions};
use foundry::cli::init::{InitCommand, InitOptions};
use foundry::cli::insight_cmd::{parse_subject, InsightAction, InsightCommand, InsightOptions};
use foundry::cli::kv::{KvAction, KvCommand, KvOptions};
use foundry::cli::navigate::{navigation_key, NavigateCommand, NavigateOptions};
use foundry::cli::watch::{format_state_line, limit_from_secs, WatchCommand, WatchOptions};
use foundry::cli::workspace_cmd::{WorkspaceAction, WorkspaceCommand, WorkspaceOptions};
use foundry::config::{foundry_home, Config};
use foundry::core::{AccessPolicy, NavigationState, Stage};
use foundry::error::exit_codes;
use foundry::insight::FileInsightStore;
use foundry::shell::Shell;
use foundry::storage::{FileKvStore, KvStoreExt};
use foundry::workspace::KvWorkspaceStore;

// =============================================================================
// CLI Definition
// =============================================================================

/// Foundry - access gating and insight sync for founder workspaces
#[derive(Parser)]
#[command(name = "foundry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Workspace to operate on (defaults to the configured workspace)
    #[arg(long, short, global = true)]
    workspace: Option<String>,

    /// Output as JSON
    #[arg(long, short, global = true)]
    json: bool,

    /// Suppress output
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the access tier of every screen
    Access {
        /// Classify at this onboarding step instead of the stored one
        #[arg(long)]
        step: Option<u32>,
        /// Only show this screen
        #[arg(long)]
        screen: Option<String>,
    },

    /// Navigate the saved navigation state to a screen
    Navigate {
        /// Target screen id
        screen: String,
    },

    /// Mount a screen and watch its insight until it is ready
    Watch {
        /// Screen id
        screen: String,
        /// Keep watching after the insight is ready
        #[arg(long)]
        follow: bool,
        /// Give up after this many seconds
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Show or update workspace progression
    Workspace {
        #[command(subcommand)]
        action: WorkspaceSubcommand,
    },

    /// Read and write the key-value store
    Kv {
        #[command(subcommand)]
        action: KvSubcommand,
    },

    /// Publish and inspect insight envelopes
    Insight {
        #[command(subcommand)]
        action: InsightSubcommand,
    },

    /// Initialize Foundry configuration and storage
    Init {
        /// Overwrite an existing project config
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum WorkspaceSubcommand {
    /// Show the stored progression
    Show,
    /// Raise the onboarding step (lower values are ignored)
    Advance { step: u32 },
    /// Set the onboarding step, lowering it if needed
    Reset { step: u32 },
    /// Change the company stage
    Stage {
        #[arg(value_parser = parse_stage)]
        stage: Stage,
    },
}

#[derive(Subcommand)]
enum KvSubcommand {
    Get { key: String },
    /// Store a JSON value (plain text is stored as a string)
    Set { key: String, value: String },
    Rm { key: String },
    List,
}

#[derive(Subcommand)]
enum InsightSubcommand {
    /// Publish an envelope; without --payload it is pending
    Put {
        kind: String,
        /// Subject id (defaults to the workspace)
        subject: Option<String>,
        /// JSON payload
        #[arg(long)]
        payload: Option<String>,
        /// Jobs queued ahead of this one
        #[arg(long, default_value_t = 0)]
        queue_depth: u32,
    },
    /// Show the current envelope
    Show {
        kind: String,
        /// Subject id (defaults to the workspace)
        subject: Option<String>,
    },
    /// List recorded compute triggers
    Triggers,
}

fn parse_stage(value: &str) -> Result<Stage, String> {
    Stage::parse(value).ok_or_else(|| {
        let names: Vec<&str> = Stage::ALL.iter().map(Stage::as_str).collect();
        format!("expected one of: {}", names.join(", "))
    })
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    setup_panic_handler();
    init_tracing();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("foundry error: {}", e);
            ExitCode::from(exit_codes::ERROR as u8)
        }
    }
}

/// Log to stderr, filtered by `FOUNDRY_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_env("FOUNDRY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Set up the global panic handler.
///
/// On panic, logs to ~/.foundry/crash.log and exits with the crash code.
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("foundry panic: {}", info);

        if let Some(home) = foundry_home() {
            let crash_log = home.join("crash.log");
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                let _ = writeln!(file, "[{}] {}", timestamp, info);
            }
        }

        std::process::exit(exit_codes::CRASH);
    }));
}

/// Run the CLI and return the exit code.
async fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;
    let config = Config::load_fail_open();
    let workspace = cli
        .workspace
        .clone()
        .unwrap_or_else(|| config.workspace.default_workspace.clone());
    let (json, quiet) = (cli.json, cli.quiet);

    match cli.command {
        Commands::Access { step, screen } => {
            let options = AccessOptions {
                json,
                quiet,
                step,
                screen,
            };
            run_access(&config, &workspace, &options).await
        }
        Commands::Navigate { screen } => {
            run_navigate(&config, &workspace, &screen, NavigateOptions { json, quiet }).await
        }
        Commands::Watch {
            screen,
            follow,
            limit,
        } => {
            let options = WatchOptions {
                json,
                quiet,
                follow,
                limit: limit_from_secs(limit)?,
            };
            run_watch(&config, &workspace, &screen, &options).await
        }
        Commands::Workspace { action } => {
            let action = match action {
                WorkspaceSubcommand::Show => WorkspaceAction::Show,
                WorkspaceSubcommand::Advance { step } => WorkspaceAction::Advance(step),
                WorkspaceSubcommand::Reset { step } => WorkspaceAction::Reset(step),
                WorkspaceSubcommand::Stage { stage } => WorkspaceAction::SetStage(stage),
            };
            run_workspace(&workspace, action, WorkspaceOptions { json, quiet }).await
        }
        Commands::Kv { action } => {
            let action = match action {
                KvSubcommand::Get { key } => KvAction::Get { key },
                KvSubcommand::Set { key, value } => KvAction::Set { key, value },
                KvSubcommand::Rm { key } => KvAction::Remove { key },
                KvSubcommand::List => KvAction::List,
            };
            run_kv(&action, KvOptions { json, quiet })
        }
        Commands::Insight { action } => {
            let action = insight_action(action, &workspace)?;
            run_insight(&action, InsightOptions { json, quiet }).await
        }
        Commands::Init { force } => run_init(&cwd, InitOptions { json, quiet, force }),
    }
}

// =============================================================================
// Command Implementations
// =============================================================================

fn success_to_exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::from(exit_codes::OK as u8)
    } else {
        ExitCode::from(exit_codes::ERROR as u8)
    }
}

fn print_formatted(formatted: &str) {
    if !formatted.is_empty() {
        print!("{}", formatted);
    }
}

async fn run_access(
    config: &Config,
    workspace: &str,
    options: &AccessOptions,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let store = KvWorkspaceStore::new(FileKvStore::new()?);
    let cmd = AccessCommand::new(store, AccessPolicy::from_config(&config.access));

    let output = cmd.run(workspace, options).await;
    print_formatted(&cmd.format_output(&output, options));

    if !output.success {
        return Ok(ExitCode::from(exit_codes::ERROR as u8));
    }
    // A single screen that is locked reads as a denial
    if options.screen.is_some() && !output.all_reachable() {
        return Ok(ExitCode::from(exit_codes::DENIED as u8));
    }
    Ok(ExitCode::from(exit_codes::OK as u8))
}

async fn run_navigate(
    config: &Config,
    workspace: &str,
    screen: &str,
    options: NavigateOptions,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let kv = Arc::new(FileKvStore::new()?);
    let cmd = NavigateCommand::new(
        Arc::clone(&kv),
        config.clone(),
        Arc::new(FileInsightStore::new()?),
        Arc::new(KvWorkspaceStore::new(Arc::clone(&kv))),
    );

    let output = cmd.run(workspace, screen).await;
    print_formatted(&cmd.format_output(&output, &options));

    if !output.navigated {
        return Ok(ExitCode::from(exit_codes::DENIED as u8));
    }
    Ok(success_to_exit_code(output.error.is_none()))
}

async fn run_watch(
    config: &Config,
    workspace: &str,
    screen: &str,
    options: &WatchOptions,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let kv = Arc::new(FileKvStore::new()?);
    let saved: NavigationState = kv.get(&navigation_key(workspace), NavigationState::default());
    let shell = Shell::new(
        config,
        workspace,
        Arc::new(FileInsightStore::new()?),
        Arc::new(KvWorkspaceStore::new(Arc::clone(&kv))),
    )
    .with_navigation(saved);
    let mut cmd = WatchCommand::new(shell);

    let live = !options.quiet && !options.json;
    let output = cmd
        .run(screen, options, |state| {
            if live {
                eprintln!("{}", format_state_line(state));
            }
        })
        .await;
    print_formatted(&cmd.format_output(&output, options));

    Ok(ExitCode::from(output.exit_code() as u8))
}

async fn run_workspace(
    workspace: &str,
    action: WorkspaceAction,
    options: WorkspaceOptions,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cmd = WorkspaceCommand::new(KvWorkspaceStore::new(FileKvStore::new()?));

    let output = cmd.run(workspace, action).await;
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_kv(action: &KvAction, options: KvOptions) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cmd = KvCommand::new(FileKvStore::new()?);

    let output = cmd.run(action);
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn insight_action(
    action: InsightSubcommand,
    workspace: &str,
) -> Result<InsightAction, Box<dyn std::error::Error>> {
    let subject_key = |kind: &str, subject: Option<String>| {
        let subject = subject.unwrap_or_else(|| workspace.to_string());
        parse_subject(kind, &subject).ok_or_else(|| format!("unknown insight kind: {}", kind))
    };

    Ok(match action {
        InsightSubcommand::Put {
            kind,
            subject,
            payload,
            queue_depth,
        } => InsightAction::Put {
            key: subject_key(&kind, subject)?,
            payload: payload.as_deref().map(serde_json::from_str).transpose()?,
            queue_depth,
        },
        InsightSubcommand::Show { kind, subject } => InsightAction::Show {
            key: subject_key(&kind, subject)?,
        },
        InsightSubcommand::Triggers => InsightAction::Triggers,
    })
}

async fn run_insight(
    action: &InsightAction,
    options: InsightOptions,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cmd = InsightCommand::new(FileInsightStore::new()?);

    let output = cmd.run(action).await;
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_init(cwd: &Path, options: InitOptions) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cmd = InitCommand::new(cwd);

    let output = cmd.run(&options);
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_to_exit_code() {
        assert_eq!(
            success_to_exit_code(true),
            ExitCode::from(exit_codes::OK as u8)
        );
        assert_eq!(
            success_to_exit_code(false),
            ExitCode::from(exit_codes::ERROR as u8)
        );
    }

    #[test]
    fn test_cli_parse_access() {
        let cli = Cli::parse_from(["foundry", "access", "--step", "4", "--json"]);
        assert!(cli.json);
        match cli.command {
            Commands::Access { step, screen } => {
                assert_eq!(step, Some(4));
                assert!(screen.is_none());
            }
            _ => panic!("Expected Access command"),
        }
    }

    #[test]
    fn test_cli_parse_navigate_with_workspace() {
        let cli = Cli::parse_from(["foundry", "navigate", "dashboard", "--workspace", "acme"]);
        assert_eq!(cli.workspace.as_deref(), Some("acme"));
        match cli.command {
            Commands::Navigate { screen } => assert_eq!(screen, "dashboard"),
            _ => panic!("Expected Navigate command"),
        }
    }

    #[test]
    fn test_cli_parse_workspace_stage() {
        let cli = Cli::parse_from(["foundry", "workspace", "stage", "launched"]);
        match cli.command {
            Commands::Workspace {
                action: WorkspaceSubcommand::Stage { stage },
            } => assert_eq!(stage, Stage::Launched),
            _ => panic!("Expected Workspace stage command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_stage() {
        let result = Cli::try_parse_from(["foundry", "workspace", "stage", "unicorn"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_watch() {
        let cli = Cli::parse_from(["foundry", "watch", "founder_alignment", "--limit", "30"]);
        match cli.command {
            Commands::Watch {
                screen,
                follow,
                limit,
            } => {
                assert_eq!(screen, "founder_alignment");
                assert!(!follow);
                assert_eq!(limit, Some(30));
            }
            _ => panic!("Expected Watch command"),
        }
    }

    #[test]
    fn test_insight_action_defaults_subject_to_workspace() {
        let action = insight_action(
            InsightSubcommand::Put {
                kind: "dashboard".to_string(),
                subject: None,
                payload: Some(r#"{"runway_months": 9}"#.to_string()),
                queue_depth: 0,
            },
            "acme",
        )
        .unwrap();

        match action {
            InsightAction::Put { key, payload, .. } => {
                assert_eq!(key.subject_id, "acme");
                assert_eq!(payload, Some(serde_json::json!({"runway_months": 9})));
            }
            _ => panic!("Expected Put action"),
        }
    }

    #[test]
    fn test_insight_action_rejects_unknown_kind() {
        let result = insight_action(
            InsightSubcommand::Show {
                kind: "horoscope".to_string(),
                subject: None,
            },
            "acme",
        );
        assert!(result.is_err());
    }
}
