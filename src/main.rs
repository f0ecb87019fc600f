use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use scrape_lite::cleaners::LinkCrawl;
use scrape_lite::config::{FetchConfig, ScraperConfig};
use scrape_lite::shutdown::install_shutdown_handler;
use scrape_lite::{OutputFormat, OutputTarget, Scraper};

#[derive(Parser, Debug)]
#[command(name = "scrape-lite")]
#[command(version)]
#[command(about = "Fetch pages, extract their links and optionally crawl onwards")]
struct Args {
    /// Seed URLs
    #[arg(required = true)]
    urls: Vec<String>,

    /// Follow same-host links this many hops from the seeds
    #[arg(long, default_value = "0")]
    follow_depth: usize,

    /// Directory for records and raw page content
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Write every record type to this file under the data directory
    /// ("-" for stdout). Defaults to one file per record type.
    #[arg(long, short = 'o')]
    output: Option<String>,

    /// Record format
    #[arg(long, default_value = "csv")]
    format: FormatArg,

    /// Number of concurrent fetch workers
    #[arg(long, default_value = "1")]
    fetch_workers: usize,

    /// Number of concurrent cleaning workers
    #[arg(long, default_value = "1")]
    cleaning_workers: usize,

    /// HTTP request timeout in milliseconds
    #[arg(long, default_value = "30000")]
    timeout_ms: u64,

    /// Minimum milliseconds between a worker's task requests
    #[arg(long, default_value = "100")]
    poll_interval_ms: u64,

    /// Log at debug level unless RUST_LOG is set
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Debug, Clone, ValueEnum)]
enum FormatArg {
    Csv,
    Text,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Text => OutputFormat::Text,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Scrape failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> scrape_lite::Result<()> {
    let config = ScraperConfig {
        data_dir: args.data_dir,
        task_request_interval_ms: args.poll_interval_ms,
        fetch: FetchConfig {
            timeout_ms: args.timeout_ms,
            ..FetchConfig::default()
        },
        ..ScraperConfig::default()
    }
    .with_workers(args.fetch_workers, args.cleaning_workers);

    let output = args
        .output
        .as_deref()
        .map(|o| o.parse::<OutputTarget>().unwrap_or_else(|never| match never {}));
    let crawl = Arc::new(
        LinkCrawl::new(args.follow_depth)
            .with_output(output)
            .with_format(args.format.into()),
    );

    tracing::info!(
        seeds = args.urls.len(),
        follow_depth = args.follow_depth,
        data_dir = %config.data_dir.display(),
        "Starting scrape-lite"
    );

    let scraper = Scraper::new(config)?;
    let jobs = args
        .urls
        .iter()
        .map(|url| crawl.job(url))
        .collect::<scrape_lite::Result<Vec<_>>>()?;
    scraper.submit(jobs);

    let outcome = scraper.run_until(install_shutdown_handler()).await?;
    tracing::info!(jobs = outcome.ids_minted, elapsed = ?outcome.elapsed, "Done");
    Ok(())
}
