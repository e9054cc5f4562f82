use crate::config::{ConfigError, CrawlConfig};
use crate::http_client::{FetchError, Fetcher};
use crate::parser::{Extractor, LinkScope};
use crate::store::PageStore;
use crate::url_store::UrlStore;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Lifecycle of a single crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Seeding,
    Running,
    Draining,
    Done,
}

/// Counters reported when a crawl finishes
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlSummary {
    pub elapsed: Duration,
    pub pages_crawled: usize,
    pub urls_seen: usize,
    pub pending: usize,
    pub fetch_failures: usize,
}

/// Everything a finished crawl produced
#[derive(Debug)]
pub struct CrawlReport {
    pub pages: PageStore,
    pub summary: CrawlSummary,
    /// URLs still queued when the crawl stopped, in FIFO order
    pub pending: Vec<String>,
}

/// One fetch handed back by the worker pool
struct FetchOutcome {
    url: String,
    result: Result<Vec<u8>, FetchError>,
}

/// Breadth-first crawler over a single site
pub struct Crawler<F> {
    config: CrawlConfig,
    extractor: Extractor,
    fetcher: Arc<F>,
}

impl<F: Fetcher> Crawler<F> {
    pub fn new(config: CrawlConfig, fetcher: F) -> Result<Self, CrawlError> {
        let root = config.validate()?;
        let extractor = Extractor::new(LinkScope::new(root, config.link_base));
        Ok(Self {
            config,
            extractor,
            fetcher: Arc::new(fetcher),
        })
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Crawl from the root until the frontier is empty or `limit` pages have
    /// been fetched and parsed. Fetch failures skip the URL and never count
    /// towards the limit.
    pub async fn run(&self) -> CrawlReport {
        let started = Instant::now();
        let urls = UrlStore::new();
        let mut pages = PageStore::new();
        let limit = self.config.limit;
        let workers = self.config.workers.max(1);

        let mut phase = CrawlPhase::Seeding;
        log::debug!("{phase:?}: {}", self.config.root_url);
        urls.add_to_frontier(&self.config.root_url);

        let (job_tx, job_rx) = mpsc::channel::<String>(workers);
        let (result_tx, mut result_rx) = mpsc::channel::<FetchOutcome>(workers);
        let pool = tokio::spawn(run_fetch_pool(
            Arc::clone(&self.fetcher),
            job_rx,
            result_tx,
            workers,
        ));

        phase = self.transition(phase, CrawlPhase::Running);
        let mut crawled = 0usize;
        let mut in_flight = 0usize;
        let mut fetch_failures = 0usize;

        loop {
            // Only dispatch what could still fit under the limit if every
            // in-flight fetch succeeds.
            while in_flight < workers && crawled + in_flight < limit {
                let Some(url) = urls.pop_from_frontier() else {
                    break;
                };
                if self.config.verbose {
                    log::info!("Crawling: {url}");
                } else {
                    log::debug!("Crawling: {url}");
                }
                if job_tx.send(url).await.is_err() {
                    log::warn!("Fetch pool stopped unexpectedly");
                    break;
                }
                in_flight += 1;
            }

            if in_flight == 0 {
                break;
            }

            let Some(outcome) = result_rx.recv().await else {
                log::warn!("Fetch pool closed with {in_flight} fetches outstanding");
                break;
            };
            in_flight -= 1;

            match outcome.result {
                Ok(body) => {
                    let extracted = self.extractor.extract(&body, &outcome.url, &urls);
                    pages.push(extracted.record);
                    crawled += 1;
                    log::debug!(
                        "Crawled {crawled}/{limit}: {} ({} new links)",
                        outcome.url,
                        extracted.queued
                    );
                }
                Err(e) => {
                    fetch_failures += 1;
                    log::warn!("Skipping {}: {}", outcome.url, e);
                }
            }
        }

        phase = self.transition(phase, CrawlPhase::Draining);
        drop(job_tx);
        if let Err(e) = pool.await {
            log::warn!("Fetch pool task failed: {e}");
        }

        let pending = urls.drain_frontier();
        let summary = CrawlSummary {
            elapsed: started.elapsed(),
            pages_crawled: crawled,
            urls_seen: urls.visited_count(),
            pending: pending.len(),
            fetch_failures,
        };
        self.transition(phase, CrawlPhase::Done);

        CrawlReport {
            pages,
            summary,
            pending,
        }
    }

    fn transition(&self, from: CrawlPhase, to: CrawlPhase) -> CrawlPhase {
        log::debug!("{from:?} -> {to:?}");
        to
    }
}

/// Fetch jobs concurrently, at most `workers` at a time, reporting each
/// outcome on `results`. Returns once the job channel closes.
async fn run_fetch_pool<F: Fetcher>(
    fetcher: Arc<F>,
    jobs: mpsc::Receiver<String>,
    results: mpsc::Sender<FetchOutcome>,
    workers: usize,
) {
    ReceiverStream::new(jobs)
        .for_each_concurrent(workers, |url| {
            let fetcher = Arc::clone(&fetcher);
            let results = results.clone();
            async move {
                let result = fetcher.fetch(&url).await;
                if results.send(FetchOutcome { url, result }).await.is_err() {
                    log::debug!("Result channel closed, dropping fetch outcome");
                }
            }
        })
        .await;
}
