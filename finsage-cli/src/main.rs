//! FinSage CLI: loan-approval predictions, attribution reports and advisor chat.

mod commands;
mod report;

use clap::Parser;
use finsage_core::ConfigOverrides;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use uuid::Uuid;

/// FinSage: explainable loan-approval predictions with an AI advisor
#[derive(Parser, Debug)]
#[command(name = "finsage", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (searched for .finsage/config.toml)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Pipeline artifact to load instead of the configured one
    #[arg(short, long, global = true)]
    model: Option<PathBuf>,

    /// LLM model to use
    #[arg(long, global = true)]
    llm_model: Option<String>,

    /// SQLite database for analyses and chat history
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Never touch the network: fallback exchange rate and static advice
    #[arg(long, global = true)]
    offline: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Predict an application's outcome, explain it and generate advice
    Analyze {
        /// Application JSON file
        #[arg(short, long)]
        application: PathBuf,

        /// Skip LLM-generated insights
        #[arg(long)]
        no_advice: bool,

        /// Do not persist the analysis
        #[arg(long)]
        no_save: bool,
    },
    /// Print the feature attributions for an application
    Explain {
        /// Application JSON file
        #[arg(short, long)]
        application: PathBuf,

        /// Show only the N most important features
        #[arg(short = 'n', long)]
        top: Option<usize>,

        /// Emit the ranking as a JSON object
        #[arg(long)]
        json: bool,
    },
    /// Ask the advisor a follow-up question about a saved analysis
    Chat {
        /// Analysis to discuss
        #[arg(long)]
        analysis_id: i64,

        /// Continue an existing chat session
        #[arg(long)]
        session: Option<Uuid>,

        /// The question
        question: String,
    },
    /// List recent analyses
    History {
        /// Number of analyses to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default workspace configuration file
    Init,
    /// Show the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "finsage", "finsage")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "finsage.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let overrides = ConfigOverrides {
        model_path: cli.model,
        llm_model: cli.llm_model,
        store_path: cli.db,
        offline: cli.offline,
    };

    commands::handle_command(cli.command, &workspace, &overrides).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_analyze_with_global_flags() {
        let cli = Cli::try_parse_from([
            "finsage",
            "analyze",
            "--application",
            "app.json",
            "--no-save",
            "--offline",
            "-vv",
        ])
        .unwrap();
        assert!(cli.offline);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Analyze {
                application,
                no_advice,
                no_save,
            } => {
                assert_eq!(application, PathBuf::from("app.json"));
                assert!(!no_advice);
                assert!(no_save);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_chat_session() {
        let session = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "finsage",
            "chat",
            "--analysis-id",
            "7",
            "--session",
            &session.to_string(),
            "How do I lower my DTI?",
        ])
        .unwrap();
        match cli.command {
            Commands::Chat {
                analysis_id,
                session: parsed,
                question,
            } => {
                assert_eq!(analysis_id, 7);
                assert_eq!(parsed, Some(session));
                assert_eq!(question, "How do I lower my DTI?");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_chat_requires_question() {
        assert!(Cli::try_parse_from(["finsage", "chat", "--analysis-id", "1"]).is_err());
    }

    #[test]
    fn test_history_default_limit() {
        let cli = Cli::try_parse_from(["finsage", "history"]).unwrap();
        assert!(matches!(cli.command, Commands::History { limit: 10 }));
    }
}
