//! quorumreg CLI Client
//!
//! Issues single reads/writes against a replica set, or runs the benchmark.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use quorumreg::bench::{BenchConfig, Benchmark, Workload};
use quorumreg::{ClientConfig, PhasePolicy, RegisterClient, RegisterError, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// quorumreg CLI
#[derive(Parser, Debug)]
#[command(name = "quorumreg-cli")]
#[command(about = "Shared register client, can be either reader or writer")]
#[command(version)]
struct Args {
    /// JSON file listing replica addresses: {"servers": ["host:port", ...]}
    #[arg(short, long, conflicts_with = "replica")]
    config: Option<PathBuf>,

    /// Replica address (repeat for each replica)
    #[arg(short, long)]
    replica: Vec<String>,

    /// Client (writer) identity
    #[arg(long, default_value = "0")]
    id: i64,

    /// Per-call deadline in milliseconds (default: wait indefinitely)
    #[arg(long)]
    call_timeout_ms: Option<u64>,

    /// Finish each phase as soon as a majority answers
    #[arg(long)]
    early_majority: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read a key
    Read {
        /// The key to read
        key: String,
    },

    /// Write a key
    Write {
        /// The key to write
        key: String,

        /// The value to write
        value: String,
    },

    /// Run the load generator
    Benchmark {
        /// Number of concurrent clients
        #[arg(long, default_value = "1")]
        workers: usize,

        /// Operations per client
        #[arg(long, default_value = "100000")]
        requests: usize,

        /// read-only, write-only or half-half
        #[arg(long, default_value = "read-only")]
        workload: String,

        /// Number of distinct keys
        #[arg(long, default_value = "100000")]
        keys: usize,

        /// Check every read against a local shadow copy (serializes workers)
        #[arg(long)]
        validate: bool,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn client_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_file(path)?,
        None if !args.replica.is_empty() => ClientConfig::builder()
            .replicas(args.replica.iter().cloned())
            .build(),
        None => {
            return Err(RegisterError::Config(
                "either --config or --replica is required".to_string(),
            ))
        }
    };

    config.client_id = args.id;
    config.call_timeout = args
        .call_timeout_ms
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis);
    if args.early_majority {
        config.phase_policy = PhasePolicy::EarlyMajority;
    }
    config.validate()?;
    Ok(config)
}

fn run(args: Args) -> Result<()> {
    let config = client_config(&args)?;

    match args.command {
        Commands::Read { key } => {
            let client = RegisterClient::connect(&config)?;
            let value = client.read(&key)?;
            tracing::info!("Read key [{}] with val [{}]", key, value);
            println!("{}", value);
        }
        Commands::Write { key, value } => {
            let client = RegisterClient::connect(&config)?;
            client.write(&key, &value)?;
            tracing::info!("Write key [{}] with val [{}]", key, value);
        }
        Commands::Benchmark {
            workers,
            requests,
            workload,
            keys,
            validate,
        } => {
            let bench_config = BenchConfig {
                workers,
                requests,
                workload: workload.parse::<Workload>()?,
                key_space: keys,
                validate,
                ..BenchConfig::default()
            };
            let benchmark = Benchmark::over_tcp(bench_config, config)?;
            benchmark.init()?;
            let report = benchmark.run()?;
            println!(
                "ops={} errors={} mismatches={} throughput={:.1} ops/s",
                report.operations(),
                report.errors(),
                report.mismatches(),
                report.throughput()
            );
        }
    }

    Ok(())
}
