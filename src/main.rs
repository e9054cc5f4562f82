mod args;

use anyhow::{Context, Result};
use args::Args;
use clap::Parser;
use log::LevelFilter;
use sitecrawl::crawler::CrawlError;
use sitecrawl::writer::save_snapshot;
use sitecrawl::{CrawlConfig, Crawler, Fetcher, HttpClient};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let base = match &args.config {
        Some(path) => CrawlConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => CrawlConfig::default(),
    };
    let config = args.apply(base);

    init_logging(config.verbose);

    let client = HttpClient::new(&config).context("building HTTP client")?;
    let Some(crawler) = prepare_crawler(config, client)? else {
        return Ok(());
    };
    let output = crawler.config().output.clone();

    log::info!(
        "Starting crawl of {} (limit {}, {} workers)",
        crawler.config().root_url,
        crawler.config().limit,
        crawler.config().workers
    );
    let report = crawler.run().await;

    match save_snapshot(&output, report.pages.records()) {
        Ok(()) => println!("Saved crawl results to {output}"),
        Err(e) => println!("Failed to save JSON: {e}"),
    }

    let summary = &report.summary;
    println!(
        "Time taken to crawl: {} seconds",
        summary.elapsed.as_secs_f64()
    );
    println!("Total pages crawled: {}", summary.pages_crawled);
    println!("Total unique URLs seen: {}", summary.urls_seen);
    println!("Remaining in queue: {}", summary.pending);

    Ok(())
}

/// A bad root URL is reported and ends the run without a crawl or a
/// failure status. Any other configuration error is returned.
fn prepare_crawler<F: Fetcher>(config: CrawlConfig, fetcher: F) -> Result<Option<Crawler<F>>> {
    match Crawler::new(config, fetcher) {
        Ok(crawler) => Ok(Some(crawler)),
        Err(CrawlError::Config(e)) if e.is_invalid_root() => {
            println!("Invalid root URL: {e}");
            Ok(None)
        }
        Err(e) => Err(e).context("invalid crawl configuration"),
    }
}

/// Warnings by default, every dequeued URL when verbose. RUST_LOG wins over both.
fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
