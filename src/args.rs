use clap::{Parser, ValueEnum};
use sitecrawl::{CrawlConfig, LinkBase};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sitecrawl")]
#[command(about = "Breadth-first crawler that snapshots a site's pages to JSON")]
#[command(version)]
pub struct Args {
    /// Starting URL
    #[arg(long)]
    pub root: Option<String>,

    /// Number of pages to crawl
    #[arg(long)]
    pub limit: Option<usize>,

    /// Output file name
    #[arg(long)]
    pub output: Option<String>,

    /// Log every URL as it is crawled
    #[arg(short, long)]
    pub verbose: bool,

    /// Concurrent fetches (defaults to the number of CPUs)
    #[arg(long)]
    pub workers: Option<usize>,

    /// What relative links are resolved against
    #[arg(long, value_enum)]
    pub link_base: Option<LinkBaseArg>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// JSON config file; command-line flags take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LinkBaseArg {
    Page,
    Root,
}

impl From<LinkBaseArg> for LinkBase {
    fn from(arg: LinkBaseArg) -> Self {
        match arg {
            LinkBaseArg::Page => LinkBase::Page,
            LinkBaseArg::Root => LinkBase::Root,
        }
    }
}

impl Args {
    /// Apply the flags that were given on top of `config`
    pub fn apply(&self, mut config: CrawlConfig) -> CrawlConfig {
        if let Some(root) = &self.root {
            config.root_url = root.clone();
        }
        if let Some(limit) = self.limit {
            config.limit = limit;
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if self.verbose {
            config.verbose = true;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(link_base) = self.link_base {
            config.link_base = link_base.into();
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        config
    }
}
