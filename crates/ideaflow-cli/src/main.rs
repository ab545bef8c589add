mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    architect::ArchitectSubcommand, config::ConfigSubcommand, doc::DocSubcommand,
    session::SessionSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ideaflow",
    about = "Turn a free-form idea into a chain of planning documents with LLM agent roles",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .ideaflow/ or .git/)
    #[arg(long, global = true, env = "IDEAFLOW_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize ideaflow in the current project
    Init,

    /// Brainstorm with the Business Analyst, then walk the pipeline interactively
    Start {
        /// Open a new session with this idea
        #[arg(long)]
        idea: Option<String>,
        /// Project name for a new session
        #[arg(long)]
        project: Option<String>,
        /// Resume this session instead of the current one
        #[arg(long)]
        session: Option<String>,
    },

    /// Manage sessions
    Session {
        #[command(subcommand)]
        subcommand: SessionSubcommand,
    },

    /// Show the stage table for a session
    Status {
        #[arg(long)]
        session: Option<String>,
    },

    /// Run one stage
    Run {
        /// Stage name, e.g. product_manager or architect-foundation
        stage: String,
        #[arg(long)]
        session: Option<String>,
    },

    /// Run the next ready stage
    Next {
        #[arg(long)]
        session: Option<String>,
    },

    /// Send one message to the Business Analyst
    Brainstorm {
        message: String,
        /// Start a new conversation with this message as the idea
        #[arg(long)]
        start: bool,
        #[arg(long)]
        session: Option<String>,
    },

    /// Inspect and revise documents
    Doc {
        #[command(subcommand)]
        subcommand: DocSubcommand,
    },

    /// Architectural decisions for the final architecture pass
    Architect {
        #[command(subcommand)]
        subcommand: ArchitectSubcommand,
    },

    /// Inspect and validate configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Start { .. } | Commands::Run { .. } | Commands::Next { .. } => {
            tracing::Level::INFO
        }
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Start {
            idea,
            project,
            session,
        } => cmd::start::run(&root, idea, project, session.as_deref()),
        Commands::Session { subcommand } => cmd::session::run(&root, subcommand, cli.json),
        Commands::Status { session } => cmd::status::run(&root, session.as_deref(), cli.json),
        Commands::Run { stage, session } => {
            cmd::run::run(&root, &stage, session.as_deref(), cli.json)
        }
        Commands::Next { session } => cmd::run::next(&root, session.as_deref(), cli.json),
        Commands::Brainstorm {
            message,
            start,
            session,
        } => cmd::brainstorm::run(&root, &message, start, session.as_deref(), cli.json),
        Commands::Doc { subcommand } => cmd::doc::run(&root, subcommand, cli.json),
        Commands::Architect { subcommand } => cmd::architect::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
