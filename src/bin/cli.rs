//! FoodSpider CLI
//!
//! Crawls event calendars and reports events that promise free food.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use foodspider::{
    error::{AppError, Result},
    models::Config,
    pipeline,
    services::GeminiOracle,
    storage::{EventSink, LocalEventStore, NullSink},
    utils::http::HttpFetcher,
};

/// FoodSpider - Free Food Event Crawler
#[derive(Parser, Debug)]
#[command(
    name = "foodspider",
    version,
    about = "Find campus events that advertise free food"
)]
struct Cli {
    /// Seed URLs to crawl
    seeds: Vec<String>,

    /// Crawl the seeds listed in the configuration
    #[arg(long)]
    all_defaults: bool,

    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Maximum pages per seed
    #[arg(long)]
    max_pages: Option<usize>,

    /// Maximum link depth from a seed
    #[arg(long)]
    max_depth: Option<usize>,

    /// Maximum concurrent requests
    #[arg(long)]
    concurrent: Option<usize>,

    /// Minimum oracle confidence to accept an event
    #[arg(long)]
    min_confidence: Option<f64>,

    /// Days ahead to look for events
    #[arg(long)]
    days: Option<i64>,

    /// Do not persist events to the local store
    #[arg(long)]
    no_db: bool,

    /// Output JSON file for confirmed events
    #[arg(short, long)]
    output: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

impl Cli {
    /// Apply command-line overrides on top of file and environment settings.
    fn apply(&self, config: &mut Config) {
        if let Some(v) = self.max_pages {
            config.crawler.max_pages = v;
        }
        if let Some(v) = self.max_depth {
            config.crawler.max_depth = v;
        }
        if let Some(v) = self.concurrent {
            config.crawler.max_concurrent = v;
        }
        if let Some(v) = self.min_confidence {
            config.detection.min_confidence = v;
        }
        if let Some(v) = self.days {
            config.detection.days_lookahead = v;
        }
        if let Some(path) = &self.output {
            config.output.path = path.clone();
        }
    }

    fn seeds(&self, config: &Config) -> Result<Vec<String>> {
        if !self.seeds.is_empty() {
            return Ok(self.seeds.clone());
        }
        if self.all_defaults && !config.seeds.is_empty() {
            return Ok(config.seeds.clone());
        }
        Err(AppError::config(
            "No seed URL given. Pass one or more URLs, or --all-defaults",
        ))
    }
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::load_or_default(&cli.config)
    };
    config.apply_env();
    cli.apply(&mut config);

    if cli.validate {
        return pipeline::run_validate(&config);
    }
    config.validate()?;

    let seeds = cli.seeds(&config)?;

    // The oracle is mandatory: fail before any request is made
    let oracle = Arc::new(GeminiOracle::from_config(&config.oracle)?);
    log::info!("Oracle model: {}", oracle.model());

    let fetcher = HttpFetcher::new(&config.crawler)?;
    let sink: Arc<dyn EventSink> = if cli.no_db {
        Arc::new(NullSink)
    } else {
        Arc::new(LocalEventStore::new(&config.output.store_path))
    };

    let report = pipeline::run_crawler(&config, &seeds, fetcher, oracle, sink).await?;
    log::info!("Done: {} free food events", report.events.len());

    Ok(())
}
