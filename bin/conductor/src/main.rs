mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "conductor")]
#[command(about = "Multi-domain conversational workflow orchestrator", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Domain configuration directory (overrides config and CONDUCTOR_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message through the pipeline (interactive mode if no message)
    Chat {
        /// Message to send
        #[arg(short, long)]
        message: Option<String>,

        /// Session ID (a new one is generated when omitted)
        #[arg(short, long)]
        session: Option<String>,

        /// Domain to route in
        #[arg(short, long)]
        domain: Option<String>,
    },

    /// Classify a query without running a workflow
    Route {
        query: String,

        #[arg(short, long)]
        domain: Option<String>,
    },

    /// Build and print the workflow graph for an intent
    Graph {
        intent: String,

        #[arg(short, long)]
        domain: Option<String>,
    },

    /// List configured domains and their intents
    Domains,

    /// Inspect or clear a session
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Show recorded feedback
    Feedback {
        /// Day to show (YYYY-MM-DD), today when omitted
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Print the persisted state
    Show { session_id: String },
    /// Print the message history
    History {
        session_id: String,
        /// Number of most recent messages
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Delete state, messages and vectors
    Clear { session_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    let data_dir = cli.data_dir;
    match cli.command {
        Commands::Chat {
            message,
            session,
            domain,
        } => {
            commands::chat::run(data_dir, message, session, domain).await?;
        }
        Commands::Route { query, domain } => {
            commands::inspect::route(data_dir, &query, domain.as_deref()).await?;
        }
        Commands::Graph { intent, domain } => {
            commands::inspect::graph(data_dir, &intent, domain.as_deref())?;
        }
        Commands::Domains => {
            commands::inspect::domains(data_dir)?;
        }
        Commands::Session { command } => match command {
            SessionCommands::Show { session_id } => {
                commands::session::show(&session_id).await?;
            }
            SessionCommands::History { session_id, limit } => {
                commands::session::history(&session_id, limit).await?;
            }
            SessionCommands::Clear { session_id } => {
                commands::session::clear(&session_id).await?;
            }
        },
        Commands::Feedback { date } => {
            commands::feedback::show(date)?;
        }
    }

    Ok(())
}
