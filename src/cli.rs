use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "color-census")]
#[command(about = "Counts the distinct pixel colors of a date range of daily pictures")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Concurrency engine: sequential, cooperative, threaded, or process
    #[arg(default_value = "sequential")]
    pub engine: String,

    /// Start of the date range, YYYY-MM-DD (default: ten days ago)
    #[arg(short = 's', long)]
    pub start_date: Option<String>,

    /// End of the date range, YYYY-MM-DD (default: today)
    #[arg(short = 'e', long)]
    pub end_date: Option<String>,

    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Maximum in-flight fetches for the cooperative engine")]
    pub concurrency: Option<usize>,

    #[arg(long, help = "Worker count for the threaded engine")]
    pub workers: Option<usize>,

    #[arg(long, help = "Metadata fetch timeout in seconds for the process engine")]
    pub metadata_timeout: Option<u64>,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Run as a process-pool worker: record JSON on stdin, outcome JSON on
    /// stdout. Spawned by the process engine, not meant for direct use.
    #[arg(long, hide = true)]
    pub pixel_worker: bool,
}

pub fn setup_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // stderr keeps stdout clean for the per-record report
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
