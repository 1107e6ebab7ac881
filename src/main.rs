#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

use bench_hub::bench::list_profiles;
use bench_hub::core::ProfileName;
use bench_hub::history_cmd;
use bench_hub::leaderboard_cmd::{self, Source};
use bench_hub::run_cmd::{self, DEFAULT_RESULTS_DIR, RunOptions};
use bench_hub::serve_cmd::{self, ServeOverrides};
use bench_hub::verify_cmd;

#[derive(Parser, Debug)]
#[command(name = "benchhub")]
#[command(about = "Hardware benchmark suite with a verified leaderboard", long_about = None)]
struct Cli {
    /// Enable verbose logging (or set BENCHHUB_LOG)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Benchmark this machine and compute its reference index
    Run {
        /// Configuration profile (light, standard, heavy)
        #[arg(long, default_value_t = ProfileName::Standard)]
        profile: ProfileName,
        /// Directory for saved result files
        #[arg(long, default_value = DEFAULT_RESULTS_DIR)]
        results_dir: PathBuf,
        /// Also save an anonymised copy for sharing
        #[arg(long)]
        share: bool,
        /// Submit the anonymised results to this leaderboard URL
        #[arg(long, value_name = "URL")]
        submit: Option<String>,
        /// Write machine-readable JSON report to this file
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Run the leaderboard service
    Serve {
        /// TOML config file with a [server] table
        #[arg(long)]
        config: Option<PathBuf>,
        /// Listen address
        #[arg(long)]
        addr: Option<SocketAddr>,
        /// Leaderboard JSONL file
        #[arg(long)]
        store: Option<PathBuf>,
        /// Accepted relative deviation between declared and recomputed index
        #[arg(long)]
        tolerance: Option<f64>,
    },

    /// Show the ranked leaderboard
    Leaderboard {
        /// Leaderboard JSONL file (default: leaderboard.jsonl)
        #[arg(long)]
        store: Option<PathBuf>,
        /// Leaderboard service URL
        #[arg(long, value_name = "URL")]
        url: Option<String>,
        /// Only show this profile
        #[arg(long)]
        config_name: Option<ProfileName>,
        /// Maximum number of rows
        #[arg(long)]
        limit: Option<usize>,
        /// Export to CSV instead of printing
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Leaderboard statistics per profile and score range
    Stats {
        #[arg(long)]
        store: Option<PathBuf>,
        #[arg(long, value_name = "URL")]
        url: Option<String>,
    },

    /// Check a saved result file the way the server would
    Verify {
        /// Result file (benchmark_*.json)
        file: PathBuf,
        #[arg(long)]
        tolerance: Option<f64>,
    },

    /// Summarise the runs saved in a local results directory
    History {
        #[arg(long, default_value = DEFAULT_RESULTS_DIR)]
        results_dir: PathBuf,
        /// Export to CSV instead of printing
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// List configuration profiles
    Profiles,
}

fn init_tracing(verbose: bool) {
    let env = std::env::var("BENCHHUB_LOG").unwrap_or_else(|_| {
        if verbose { "bench_hub=debug".to_string() } else { "bench_hub=info".to_string() }
    });
    let _ = tracing_subscriber::fmt()
        .with_span_events(FmtSpan::ACTIVE)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_env_filter(EnvFilter::new(env))
        .try_init();
}

fn main() {
    color_eyre::install().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run { profile, results_dir, share, submit, json } => run_cmd::run(RunOptions {
            profile,
            results_dir,
            share,
            submit,
            json,
        }),
        Commands::Serve { config, addr, store, tolerance } => {
            serve_cmd::run(config, ServeOverrides { addr, store, tolerance })
        }
        Commands::Leaderboard { store, url, config_name, limit, csv } => {
            Source::from_args(store, url)
                .and_then(|source| leaderboard_cmd::run(source, config_name, limit, csv))
        }
        Commands::Stats { store, url } => {
            Source::from_args(store, url).and_then(leaderboard_cmd::stats)
        }
        Commands::Verify { file, tolerance } => verify_cmd::run(&file, tolerance),
        Commands::History { results_dir, csv } => history_cmd::run(results_dir, csv),
        Commands::Profiles => {
            list_profiles();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
