//! photo-critic CLI - AI photo culling tool

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

/// Score photos with a vision model and save the verdicts as XMP sidecars.
#[derive(Parser)]
#[command(name = "photo-critic")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Grant folder access without asking
    #[arg(short, long, global = true)]
    yes: bool,

    /// Gemini API key
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini model name
    #[arg(long, global = true, env = "PHOTO_CRITIC_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the photos of a folder with their stored verdicts
    Scan {
        /// Photo folder
        dir: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the stored verdict of one photo
    Show {
        /// Photo folder
        dir: PathBuf,

        /// Photo file name
        name: String,
    },

    /// Score photos one by one and save their sidecars
    Evaluate {
        /// Photo folder
        dir: PathBuf,

        /// Photo file names (default: every photo in the folder)
        names: Vec<String>,

        /// Leave photos that already have a verdict alone
        #[arg(long)]
        skip_evaluated: bool,

        /// Parallel evaluations (0 = one per CPU)
        #[arg(short, long, default_value_t = 4)]
        jobs: usize,

        /// Write JSON and CSV reports to this directory
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },

    /// Score near-duplicate photos against each other
    Burst {
        /// Photo folder
        dir: PathBuf,

        /// Photo file names of the burst
        #[arg(required = true, num_args = 2..)]
        names: Vec<String>,
    },

    /// Delete a photo and its sidecar
    Delete {
        /// Photo folder
        dir: PathBuf,

        /// Photo file name
        name: String,
    },

    /// Move a photo and its verdict to another folder
    Move {
        /// Photo folder
        dir: PathBuf,

        /// Photo file name
        name: String,

        /// Destination folder
        #[arg(long)]
        to: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = commands::Options {
        yes: cli.yes,
        api_key: cli.api_key,
        model: cli.model,
    };

    match cli.command {
        Commands::Scan { dir, json } => commands::scan::run(&dir, json, &options),
        Commands::Show { dir, name } => commands::scan::show(&dir, &name, &options),
        Commands::Evaluate { dir, names, skip_evaluated, jobs, report_dir } => {
            commands::evaluate::run(&dir, names, skip_evaluated, jobs, report_dir, &options)
        }
        Commands::Burst { dir, names } => commands::evaluate::burst(&dir, names, &options),
        Commands::Delete { dir, name } => commands::manage::delete(&dir, &name, &options),
        Commands::Move { dir, name, to } => commands::manage::move_to(&dir, &name, &to, &options),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}
