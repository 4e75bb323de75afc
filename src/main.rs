use clap::Parser;
use color_census::{
    compose_endpoint_url, default_date_range, format_duration, serve_pixel_worker, setup_logging,
    Cli, Config, EngineKind, ItemOutcome, Pipeline,
};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    if args.pixel_worker {
        // Worker diagnostics reach the parent through the inherited stderr
        setup_logging(args.verbose).map_err(|e| anyhow::anyhow!(e.to_string()))?;
        serve_pixel_worker().await?;
        return Ok(());
    }

    setup_logging(args.verbose).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    info!("Starting color-census v{}", env!("CARGO_PKG_VERSION"));

    let Some(kind) = EngineKind::from_name(&args.engine) else {
        println!(
            "{} is not a valid engine. Expected one of: {}.",
            args.engine,
            EngineKind::NAMES.join(", ")
        );
        return Ok(());
    };

    let config = load_config(&args).await?;
    let Some(api_url) = config.api_url.clone() else {
        println!("Invalid API URL.");
        return Ok(());
    };
    validate_config(&config)?;

    let (default_start, default_end) = default_date_range();
    let start_date = args.start_date.clone().unwrap_or(default_start);
    let end_date = args.end_date.clone().unwrap_or(default_end);

    println!("Counting the distinct colors of the daily pictures from {start_date} to {end_date}");

    let endpoint = compose_endpoint_url(&api_url, &start_date, &end_date);
    let pipeline = Pipeline::from_config(kind, &config);
    let summary = pipeline.run(&endpoint).await;

    if summary.results.is_empty() {
        println!("An error occurred retrieving the pictures metadata.");
        return Ok(());
    }

    for result in &summary.results {
        match &result.outcome {
            ItemOutcome::ColorCount(count) => {
                println!("{}: {count} colors", result.record);
            }
            ItemOutcome::Skipped => {
                println!("{}: skipped (media type {:?})", result.record, result.record.kind);
            }
            ItemOutcome::FetchFailed { reason } => {
                println!("{}: fetch failed ({reason})", result.record);
            }
            ItemOutcome::DecodeFailed { reason } => {
                println!("{}: decode failed ({reason})", result.record);
            }
        }
    }

    println!(
        "{} engine took: {}",
        kind.name(),
        format_duration(summary.elapsed)
    );
    Ok(())
}

async fn load_config(args: &Cli) -> anyhow::Result<Config> {
    let mut config = if let Some(config_path) = &args.config {
        let config_content = tokio::fs::read_to_string(config_path).await?;
        serde_json::from_str(&config_content)?
    } else {
        Config::default()
    };

    // The environment wins over the config file for the endpoint
    if let Ok(api_url) = std::env::var("API_URL") {
        config.api_url = Some(api_url);
    }

    if let Some(concurrency) = args.concurrency {
        config.concurrency_limit = concurrency;
    }
    if let Some(workers) = args.workers {
        config.thread_workers = workers;
    }
    if let Some(timeout) = args.metadata_timeout {
        config.metadata_timeout = Duration::from_secs(timeout);
    }

    Ok(config)
}

fn validate_config(config: &Config) -> anyhow::Result<()> {
    if config.concurrency_limit == 0 {
        anyhow::bail!("Concurrency limit must be greater than 0");
    }

    if config.thread_workers == 0 {
        anyhow::bail!("Thread worker count must be greater than 0");
    }

    if config.process_workers == 0 {
        anyhow::bail!("Process worker count must be greater than 0");
    }

    if config.metadata_timeout.as_secs() == 0 {
        anyhow::bail!("Metadata timeout must be greater than 0");
    }

    Ok(())
}
