use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "adw")]
#[command(version, about = "Drives a Markdown plan through chunked, sandboxed AI worker sessions")]
struct Cli {
    /// Raise logging to debug regardless of ADW_LOG.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a plan end to end inside the given worktree.
    Execute {
        /// Path to the Markdown plan.
        plan: PathBuf,
        /// Resume a previously started run instead of starting fresh.
        #[arg(long)]
        resume: bool,
        /// Branch name to work on (default: feature/<plan-name>).
        #[arg(long)]
        branch: Option<String>,
        /// Repository to find or create the run's worktree in (default:
        /// current directory's repository root).
        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },
    /// Chunk a plan without executing it.
    Chunk {
        /// Path to the Markdown plan.
        plan: PathBuf,
        /// Directory to write chunk bodies and a manifest into.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show the current status of a pipeline run.
    Status {
        /// Worktree to inspect (default: current directory).
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Retry a failed chunk.
    Retry {
        /// The chunk id to retry, e.g. `01a-database`.
        chunk_id: String,
        /// Worktree the run lives in (default: current directory).
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Validate a plan's chunking without writing anything to disk.
    Validate {
        /// Path to the Markdown plan.
        plan: PathBuf,
    },
    /// Print the resolved pipeline configuration.
    Config,
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("ADW_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Execute {
            plan,
            resume,
            branch,
            repo,
        } => adw::cmd::execute::run(plan, resume, branch, repo).await,
        Commands::Chunk { plan, output } => adw::cmd::chunk::run(plan, output),
        Commands::Status { path } => adw::cmd::status::run(path),
        Commands::Retry { chunk_id, path } => adw::cmd::retry::run(chunk_id, path).await,
        Commands::Validate { plan } => adw::cmd::validate::run(plan),
        Commands::Config => adw::cmd::config::run(),
    }
}
