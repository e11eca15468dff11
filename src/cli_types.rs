use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "rempo",
    version,
    about = "Discover git repositories across your filesystem",
    long_about = "Walks directory trees with layered .gitignore semantics, reports every git \
                  working tree with its status, and caches results per root for instant reloads."
)]
pub struct Cli {
    /// Path to a TOML config file (default: the platform config dir).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose diagnostics on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Walk a directory tree and report every repository in it.
    Scan(ScanArgs),
    /// Show cached scan results without touching the filesystem.
    List(ListArgs),
    /// Recent commits and working-tree changes for one repository.
    Details(DetailsArgs),
    /// Generate (or fetch the cached) AI summary for one repository.
    Summary(SummaryArgs),
    /// Print the effective configuration.
    Config,
    /// Write a starter config file.
    Init(InitArgs),
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to scan.
    pub path: PathBuf,

    /// Deepest directory level to descend to.
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Visit hidden (dot-prefixed) directories too.
    #[arg(long)]
    pub include_hidden: bool,

    /// Extra gitignore-style exclusion; repeatable.
    #[arg(long = "ignore", value_name = "PATTERN")]
    pub ignore: Vec<String>,

    /// Walk the tree even when a cached result exists.
    #[arg(long)]
    pub refresh: bool,

    /// Emit the full scan report as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Root to list; omit to list every cached root.
    pub path: Option<PathBuf>,

    /// Emit JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct DetailsArgs {
    /// Repository to inspect.
    pub path: PathBuf,

    /// How many commits to show.
    #[arg(long, default_value_t = 10, value_name = "N")]
    pub commits: usize,

    /// Emit JSON instead of formatted output.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    /// Repository to summarize.
    pub path: PathBuf,

    /// API key override; falls back to the config file.
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Where to write the file (default: the platform config dir).
    #[arg(long, value_name = "FILE")]
    pub path: Option<PathBuf>,

    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}
