use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use pawmap_core::IncidentCategory;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

#[derive(Parser)]
#[command(name = "pawmap")]
#[command(about = "Report and follow animal-welfare incidents from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Pawmap API server URL
    #[arg(
        long,
        global = true,
        env = "PAWMAP_SERVER_URL",
        default_value = DEFAULT_SERVER_URL,
        value_name = "URL"
    )]
    pub server: String,

    /// Directory holding the offline incident cache
    #[arg(long, global = true, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List incidents from the server, newest first
    List {
        /// Maximum number of incidents to show
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Report a new incident
    #[command(alias = "add")]
    Report(ReportArgs),
    /// Resubmit reports that could not reach the server
    Push,
    /// Remove every incident on the server
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Follow incidents live, reconnecting when the connection drops
    Watch {
        /// Print each event as a JSON line
        #[arg(long)]
        json: bool,
    },
    /// Inspect the offline cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Place label, e.g. "Sha Tin"
    #[arg(long, value_name = "NAME")]
    pub location: String,
    /// Latitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,
    /// Longitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lng: f64,
    /// Name shown as the reporter
    #[arg(long, value_name = "NAME")]
    pub reporter: String,
    /// What happened
    #[arg(long)]
    pub description: String,
    /// general-report, poisoning-alert or abuse-report
    #[arg(long, default_value_t = IncidentCategory::GeneralReport)]
    pub category: IncidentCategory,
    /// How to reach the reporter
    #[arg(long, value_name = "CONTACT")]
    pub contact: Option<String>,
    /// Image file to attach
    #[arg(long, value_name = "PATH")]
    pub image: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Print cached incidents
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the offline cache
    Clear,
    /// Print the cache file location
    Path,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
