//! Breadth-first, same-site web crawler.
//!
//! A crawl starts from a root URL, fetches pages through a bounded pool of
//! workers, extracts a short excerpt of each page with a streaming
//! tokenizer, and queues newly discovered links on the root's host until
//! the frontier runs dry or the page limit is reached.

pub mod config;
pub mod crawler;
pub mod http_client;
pub mod parser;
pub mod store;
pub mod url_store;
pub mod writer;

pub use config::{CrawlConfig, LinkBase};
pub use crawler::{CrawlReport, CrawlSummary, Crawler};
pub use http_client::{FetchError, Fetcher, HttpClient};
pub use store::{PageRecord, PageStore};
