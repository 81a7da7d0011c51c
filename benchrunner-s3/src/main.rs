use benchrunner_s3::{Config, FAIL_EXIT_CODE, RunnerError, run_benchmark};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse configuration from environment variables and CLI arguments
    let config = match Config::from_env_and_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FAIL - {e:#}");
            return ExitCode::from(FAIL_EXIT_CODE);
        }
    };

    // Logs go to stderr; stdout is reserved for run records
    let mut filter = EnvFilter::from_default_env();
    for target in ["benchrunner_s3", "benchrunner"] {
        match format!("{}={}", target, config.log_level).parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("ignoring log directive for {target}: {e}"),
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run_benchmark(&config).await {
        Ok(records) => {
            tracing::info!("benchmark finished after {} runs", records.len());
            ExitCode::SUCCESS
        }
        Err(e @ RunnerError::Skip(_)) => {
            eprintln!("Skipping benchmark - {e}");
            ExitCode::from(e.exit_code())
        }
        Err(e) => {
            eprintln!("FAIL - {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
