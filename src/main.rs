//! `logstore`: read validator run logs from the command line
//!
//! Every command prints one JSON document on stdout; diagnostics go to stderr.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | LOGSTORE_STORE_TYPE | memory | `memory`, `localfs` or `s3` |
//! | LOGSTORE_LOCAL_PATH | - | Root directory for `localfs` |
//! | LOGSTORE_S3_BUCKET | validator-logs | Bucket name |
//! | LOGSTORE_S3_ENDPOINT | - | Custom endpoint (MinIO, SeaweedFS) |
//! | LOGSTORE_LOG | info | Tracing filter |

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use validator_logstore::logs::{LogReader, LogStoreError, RunId};
use validator_logstore::observability::{init_tracing, TracingConfig};
use validator_logstore::storage::LogStoreConfig;

const DEFAULT_LIMIT: usize = 100;

#[derive(Parser)]
#[command(name = "logstore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect validator run logs stored in object storage", long_about = None)]
struct Cli {
    /// TOML config file; `LOGSTORE_*` variables are used when omitted
    #[arg(short, long, global = true, env = "LOGSTORE_CONFIG")]
    config: Option<PathBuf>,

    /// Emit debug-level diagnostics
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List validator uids that have logs
    Validators,

    /// List a validator's runs, most recent first
    Runs { uid: u64 },

    /// Print a run's config document
    Config {
        uid: u64,
        /// Run id (default: latest run)
        #[arg(short, long)]
        run: Option<String>,
    },

    /// Print the tail of a run's logs
    Logs {
        uid: u64,
        /// Run id (default: latest run)
        #[arg(short, long)]
        run: Option<String>,
        /// Keep only records at this level (case-insensitive)
        #[arg(short, long)]
        level: Option<String>,
        /// Number of most recent records to print
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
        #[arg(short, long, value_enum, default_value_t = StreamArg::All)]
        stream: StreamArg,
    },

    /// Show whether a run finished and how many objects it holds
    Status {
        uid: u64,
        #[arg(short, long)]
        run: Option<String>,
    },

    /// Bucket-wide object and validator counts
    Metrics,

    /// Probe the store; exits non-zero when unreachable
    Health,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StreamArg {
    All,
    Entries,
    Stdout,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut tracing_config = TracingConfig::from_env();
    if cli.verbose {
        tracing_config = tracing_config.with_filter("debug");
    }
    if let Err(e) = init_tracing(&tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            let body = json!({ "error": e.to_string() });
            println!("{}", body);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, LogStoreError> {
    let config = match &cli.config {
        Some(path) => LogStoreConfig::load(path)?,
        None => LogStoreConfig::from_env(),
    };
    let store = config.open_store()?;
    let reader = LogReader::new(store, &config);

    match cli.command {
        Commands::Validators => {
            let validators = reader.list_validators().await?;
            print_json(&json!({ "validators": validators }))?;
        }
        Commands::Runs { uid } => {
            let runs = reader.get_runs(uid).await?;
            print_json(&json!({ "uid": uid, "runs": runs }))?;
        }
        Commands::Config { uid, run } => {
            let run = parse_run(run)?;
            let config = reader.get_run_config(uid, run.as_ref()).await?;
            print_json(&json!({ "uid": uid, "config": config }))?;
        }
        Commands::Logs {
            uid,
            run,
            level,
            limit,
            stream,
        } => {
            let run = parse_run(run)?;
            let level = level.as_deref();
            match stream {
                StreamArg::All => {
                    print_json(&reader.fetch_logs(uid, run.as_ref(), level, limit).await?)?
                }
                StreamArg::Entries => {
                    print_json(&reader.fetch_entries(uid, run.as_ref(), level, limit).await?)?
                }
                StreamArg::Stdout => {
                    print_json(&reader.fetch_stdout(uid, run.as_ref(), level, limit).await?)?
                }
            }
        }
        Commands::Status { uid, run } => {
            let run = parse_run(run)?;
            print_json(&reader.run_status(uid, run.as_ref()).await?)?;
        }
        Commands::Metrics => {
            print_json(&reader.store_metrics().await?)?;
        }
        Commands::Health => {
            let healthy = reader.health_check().await;
            print_json(&json!({
                "status": if healthy { "healthy" } else { "unhealthy" },
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "store": config.store_type,
                "version": env!("CARGO_PKG_VERSION"),
            }))?;
            if !healthy {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn parse_run(run: Option<String>) -> Result<Option<RunId>, LogStoreError> {
    run.map(RunId::new).transpose()
}

fn print_json<T: Serialize>(value: &T) -> Result<(), LogStoreError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| LogStoreError::InvalidPayload(e.to_string()))?;
    println!("{}", text);
    Ok(())
}
