use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use aws_sdk_ssm::config::Region;
use clap::Parser;
use exposure_volume_core::{
    cleanup::PostgresCleanup,
    config::{ConfigSource, EnvVars, Mode, Settings},
    report::RunReport,
    run::{RunOptions, VolumeTest},
    secrets::AwsConfigStore,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Volume test for the exposure upload API", long_about = None)]
struct Cli {
    /// Run options as JSON, e.g. '{"preBatches":2,"preExposures":5000,"batches":10,"exposures":1}'
    options: Option<String>,

    /// Print per-phase timing tables (same as PRINT_RESULTS=true)
    #[arg(long)]
    print_results: bool,

    /// Delay before deleting uploaded rows, overriding CLEANUP_DELAY_MS
    #[arg(long)]
    cleanup_delay_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(reports) => match serde_json::to_string_pretty(&reports) {
            Ok(rendered) => {
                println!("{rendered}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                println!("{err}");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            println!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<Vec<RunReport>> {
    dotenvy::dotenv().ok();

    let vars = EnvVars::from_env();
    let mut settings = Settings::from_vars(&vars).context("invalid settings")?;
    if cli.print_results {
        settings.print_results = true;
    }
    if let Some(millis) = cli.cleanup_delay_ms {
        settings.cleanup_delay = Duration::from_millis(millis);
    }

    let options = RunOptions::from_json(cli.options.as_deref().unwrap_or("{}"))
        .context("failed to parse run options")?;

    let source = match settings.mode {
        Mode::Development => ConfigSource::Environment(vars),
        Mode::Production => ConfigSource::Store(Arc::new(connect_store(&settings).await)),
    };

    let config = source
        .interop_config()
        .await
        .context("failed to resolve interop config")?;
    info!(id = %config.id, mode = ?settings.mode, "Resolved interop config");

    let test = VolumeTest::new(config, PostgresCleanup::new(source))
        .with_cleanup_delay(settings.cleanup_delay)
        .with_print_results(settings.print_results);

    match test.run(options).await {
        Ok(reports) => Ok(reports),
        Err(failure) => {
            error!(error = %failure, "Volume test did not complete cleanly");
            Err(failure.into())
        }
    }
}

async fn connect_store(settings: &Settings) -> AwsConfigStore {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &settings.aws_region {
        loader = loader.region(Region::new(region.clone()));
    }

    let shared_config = loader.load().await;
    AwsConfigStore::new(
        aws_sdk_secretsmanager::Client::new(&shared_config),
        aws_sdk_ssm::Client::new(&shared_config),
        settings.config_prefix.clone(),
    )
}
