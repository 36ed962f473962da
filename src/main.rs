use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lakewrite_config::JobConfig;
use lakewrite_writer::error::redact_secret;
use std::path::PathBuf;

/// Write a sample table to object storage as Parquet and register it in a catalog
#[derive(Parser)]
#[command(name = "lakewrite")]
#[command(version)]
#[command(about = "Write a sample table to object storage as Parquet and register it in a catalog", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Target bucket (overrides S3_BUCKET_NAME and the config file)
    #[arg(short, long, value_name = "BUCKET", global = true)]
    bucket: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Exit non-zero when the table write fails
    #[arg(long, global = true)]
    fail_on_write_error: bool,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Run the write job (default)
    Run,
    /// Print the resolved configuration with secrets redacted
    ShowConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build tokio runtime and run the job
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Step 1: Load base configuration
    let mut config = if let Some(config_path) = &cli.config {
        JobConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        JobConfig::load().context("Failed to load configuration")?
    };

    // Step 2: Apply CLI overrides (highest priority)
    apply_cli_overrides(&mut config, &cli);
    config
        .validate()
        .context("Invalid configuration after applying command-line flags")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::ShowConfig => {
            let rendered = toml::to_string_pretty(&redacted(&config))
                .context("Failed to render configuration")?;
            println!("{}", rendered);
            Ok(())
        }
        Command::Run => {
            lakewrite::init_tracing(&config.log);
            let report = lakewrite::run_with_config(&config).await?;
            if !report.write.is_written() {
                tracing::warn!(
                    "Table {} was not written; rerun with --fail-on-write-error to make this fatal",
                    report.qualified_name
                );
            }
            Ok(())
        }
    }
}

fn apply_cli_overrides(config: &mut JobConfig, cli: &Cli) {
    if let Some(bucket) = &cli.bucket {
        config.table.bucket = bucket.clone();
    }

    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }

    if cli.fail_on_write_error {
        config.write.fail_on_error = true;
    }
}

fn redacted(config: &JobConfig) -> JobConfig {
    let mut config = config.clone();
    if let Some(token) = config.catalog.token.as_mut() {
        *token = redact_secret(token);
    }
    if let Some(s3) = config.storage.s3.as_mut() {
        if let Some(secret) = s3.secret_access_key.as_mut() {
            *secret = redact_secret(secret);
        }
    }
    config
}
