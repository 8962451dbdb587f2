use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod completion;
mod dispatch;
mod render;
mod session;

use completion::CliCompletionShell;
use dispatch::run_cli;

#[derive(Parser, Debug)]
#[command(name = "storefront")]
#[command(
    about = "Browse catalog listings and stage install, update and uninstall selections",
    long_about = None
)]
struct Cli {
    /// Catalog root holding `index/<id>/<version>.toml` manifests.
    #[arg(long, global = true)]
    catalog_root: Option<PathBuf>,
    /// State root holding install receipts.
    #[arg(long, global = true)]
    state_root: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = LogLevel::Warn, global = true)]
    log_level: LogLevel,
    /// Disable colors, spinners and section headers.
    #[arg(long, global = true)]
    plain: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List listings whose id contains QUERY.
    List { query: Option<String> },
    /// Show one listing with its features and action control.
    Show {
        id: String,
        #[arg(long)]
        token: Option<String>,
    },
    /// Restore a selection, replay interactions and print the result.
    Session {
        #[arg(long)]
        token: Option<String>,
        /// `id=OPERATION` applied on top of the token.
        #[arg(long = "set", value_name = "ID=OP")]
        set: Vec<String>,
        /// Primary click on a listing's action control.
        #[arg(long, value_name = "ID")]
        click: Vec<String>,
        /// Menu choice on a listing's action control.
        #[arg(long, value_name = "ID=OP")]
        choose: Vec<String>,
        #[arg(long, value_name = "ID/FEATURE")]
        uncheck: Vec<String>,
        /// Read and write percent-encoded tokens.
        #[arg(long)]
        url: bool,
        #[arg(long)]
        json: bool,
    },
    /// Preview the change plan for a selection.
    Plan {
        #[arg(long)]
        token: Option<String>,
        #[arg(long = "set", value_name = "ID=OP")]
        set: Vec<String>,
        #[arg(long)]
        url: bool,
        #[arg(long)]
        json: bool,
    },
    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

// Logs go to stderr so stdout stays script friendly. RUST_LOG wins over
// --log-level when set.
fn initialize_tracing(log_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_tracing(cli.log_level);
    run_cli(cli)
}
