//! Runner configuration and CLI argument parsing
//!
//! Every option can also come from an environment variable with the
//! S3_BENCHRUNNER_ prefix.
//!
//! # Configuration Priority
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Default values (lowest priority)
//!
//! # Example Usage
//!
//! ```bash
//! # Against a real bucket
//! s3-benchrunner-rust sdk-rust-client download-256KiB-10_000x.run.json my-bucket us-west-2 100
//!
//! # Smoke run without a network
//! export S3_BENCHRUNNER_MEMORY_LATENCY_MS=5
//! s3-benchrunner-rust memory upload-5GiB.run.json unused local 10
//! ```

use anyhow::{Result, anyhow};
use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Which storage client carries the transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum S3ClientId {
    /// aws-sdk-s3, one request per transfer
    #[value(name = "sdk-rust-client")]
    SdkRustClient,
    /// In-process simulated store
    Memory,
}

impl S3ClientId {
    pub fn as_str(&self) -> &'static str {
        match self {
            S3ClientId::SdkRustClient => "sdk-rust-client",
            S3ClientId::Memory => "memory",
        }
    }
}

/// Validated runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub s3_client: S3ClientId,
    /// Path of the workload JSON file
    pub workload: PathBuf,
    pub bucket: String,
    pub region: String,
    /// Expected throughput in Gb/s
    pub target_throughput_gbps: f64,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    /// Directory that task keys are resolved against when files are on disk
    pub files_dir: PathBuf,
    /// Explicit gate capacity; derived from the descriptor limit when unset
    pub max_concurrency: Option<usize>,
    /// Per-request latency of the memory backend
    pub memory_latency: Duration,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// Command-line arguments for the runner
#[derive(Parser, Debug)]
#[command(
    name = "s3-benchrunner-rust",
    about = "Concurrent S3 transfer benchmark runner",
    long_about = "Runs a workload of uploads and downloads against S3 repeatedly and prints throughput per run.\n\nExits 123 when the workload doesn't apply to the selected client.\n\nEnvironment variables with S3_BENCHRUNNER_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    #[arg(
        value_name = "S3_CLIENT",
        help = "Storage client: sdk-rust-client, memory",
        required_unless_present = "list_env_vars",
        env = "S3_BENCHRUNNER_S3_CLIENT"
    )]
    pub s3_client: Option<S3ClientId>,
    #[arg(
        value_name = "WORKLOAD",
        help = "Path to workload JSON file",
        required_unless_present = "list_env_vars",
        env = "S3_BENCHRUNNER_WORKLOAD"
    )]
    pub workload: Option<PathBuf>,
    #[arg(
        value_name = "BUCKET",
        help = "Bucket name",
        required_unless_present = "list_env_vars",
        env = "S3_BENCHRUNNER_BUCKET"
    )]
    pub bucket: Option<String>,
    #[arg(
        value_name = "REGION",
        help = "Region of the bucket",
        required_unless_present = "list_env_vars",
        env = "S3_BENCHRUNNER_REGION"
    )]
    pub region: Option<String>,
    #[arg(
        value_name = "TARGET_THROUGHPUT",
        help = "Target throughput in gigabits per second (Gb/s)",
        required_unless_present = "list_env_vars",
        env = "S3_BENCHRUNNER_TARGET_THROUGHPUT"
    )]
    pub target_throughput: Option<f64>,

    // Connection
    #[arg(
        long,
        value_name = "URL",
        help = "Custom endpoint for S3-compatible services",
        env = "S3_BENCHRUNNER_ENDPOINT_URL"
    )]
    pub endpoint_url: Option<String>,
    #[arg(
        long,
        help = "Use path-style bucket addressing",
        env = "S3_BENCHRUNNER_FORCE_PATH_STYLE"
    )]
    pub force_path_style: bool,

    // Execution
    #[arg(
        long,
        value_name = "DIR",
        help = "Directory task keys are relative to",
        default_value = ".",
        env = "S3_BENCHRUNNER_FILES_DIR"
    )]
    pub files_dir: PathBuf,
    #[arg(
        long,
        value_name = "N",
        help = "Maximum simultaneous transfers [default: 40% of open-file limit, at most 10000]",
        env = "S3_BENCHRUNNER_MAX_CONCURRENCY"
    )]
    pub max_concurrency: Option<usize>,
    #[arg(
        long,
        value_name = "MS",
        help = "Per-request latency of the memory client (milliseconds)",
        default_value_t = 0,
        env = "S3_BENCHRUNNER_MEMORY_LATENCY_MS"
    )]
    pub memory_latency_ms: u64,

    // General options
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "S3_BENCHRUNNER_LOG_LEVEL"
    )]
    pub log_level: String,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Config {
    /// Build configuration from environment variables and CLI arguments
    ///
    /// Handles `--list-env-vars` by printing the reference and exiting.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Self::parse_args(std::env::args_os())?;

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        Self::from_args(args)
    }

    /// Parse a command line
    ///
    /// `--help` and `--version` print and exit 0. Any other parse error is
    /// returned, so it exits like every other configuration failure.
    pub fn parse_args<I, T>(argv: I) -> Result<Args>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        match Args::try_parse_from(argv) {
            Ok(args) => Ok(args),
            Err(e) => match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
                _ => Err(anyhow!("{}", e.to_string().trim_end())),
            },
        }
    }

    /// Build and validate configuration from already-parsed arguments
    pub fn from_args(args: Args) -> Result<Self> {
        let config = Config {
            s3_client: args.s3_client.ok_or_else(|| anyhow!("S3_CLIENT is required"))?,
            workload: args.workload.ok_or_else(|| anyhow!("WORKLOAD is required"))?,
            bucket: args.bucket.ok_or_else(|| anyhow!("BUCKET is required"))?,
            region: args.region.ok_or_else(|| anyhow!("REGION is required"))?,
            target_throughput_gbps: args
                .target_throughput
                .ok_or_else(|| anyhow!("TARGET_THROUGHPUT is required"))?,
            endpoint_url: args.endpoint_url,
            force_path_style: args.force_path_style,
            files_dir: args.files_dir,
            max_concurrency: args.max_concurrency,
            memory_latency: Duration::from_millis(args.memory_latency_ms),
            log_level: args.log_level,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.target_throughput_gbps > 0.0 && self.target_throughput_gbps.is_finite()) {
            return Err(anyhow!(
                "TARGET_THROUGHPUT must be a positive number of Gb/s, got {}",
                self.target_throughput_gbps
            ));
        }

        if self.max_concurrency == Some(0) {
            return Err(anyhow!("--max-concurrency must be greater than 0"));
        }

        match self.log_level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            other => Err(anyhow!(
                "Invalid log level: {}. Valid options are: error, warn, info, debug, trace",
                other
            )),
        }
    }

    fn print_env_vars() {
        println!("s3-benchrunner-rust Environment Variables");
        println!("=========================================");
        println!();
        println!("All environment variables use the S3_BENCHRUNNER_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();

        println!("Positional Arguments:");
        println!("  S3_BENCHRUNNER_S3_CLIENT=<client>          sdk-rust-client | memory");
        println!("  S3_BENCHRUNNER_WORKLOAD=<path>             Workload JSON file");
        println!("  S3_BENCHRUNNER_BUCKET=<name>               Bucket name");
        println!("  S3_BENCHRUNNER_REGION=<region>             Region of the bucket");
        println!("  S3_BENCHRUNNER_TARGET_THROUGHPUT=<gbps>    Target throughput in Gb/s");
        println!();

        println!("Connection:");
        println!("  S3_BENCHRUNNER_ENDPOINT_URL=<url>          Custom S3-compatible endpoint");
        println!("  S3_BENCHRUNNER_FORCE_PATH_STYLE=true|false Path-style addressing [default: false]");
        println!();

        println!("Execution:");
        println!("  S3_BENCHRUNNER_FILES_DIR=<dir>             Root for on-disk files [default: .]");
        println!(
            "  S3_BENCHRUNNER_MAX_CONCURRENCY=<n>         Max simultaneous transfers [default: from open-file limit]"
        );
        println!(
            "  S3_BENCHRUNNER_MEMORY_LATENCY_MS=<ms>      Memory client latency per request [default: 0]"
        );
        println!();

        println!("General Configuration:");
        println!(
            "  S3_BENCHRUNNER_LOG_LEVEL=<level>           Log level: error, warn, info, debug, trace [default: info]"
        );
        println!();

        println!("Exit Codes:");
        println!("  0    all runs succeeded");
        println!("  123  workload skipped (not applicable to this client)");
        println!("  255  failure");
    }
}
