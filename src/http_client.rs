use crate::config::CrawlConfig;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Source of page bodies. One attempt per call; a failure means the URL is
/// skipped for the rest of the run.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Status(u16),

    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    #[error("Response too large: {0} bytes")]
    TooLarge(u64),

    #[error("Empty response body")]
    EmptyBody,

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
}

pub struct HttpClient {
    client: Client,
    max_response_bytes: usize,
}

impl HttpClient {
    pub fn new(config: &CrawlConfig) -> Result<Self, reqwest::Error> {
        Self::with_timeout(config.timeout(), &config.user_agent, config.max_response_bytes)
    }

    pub fn with_timeout(
        timeout: Duration,
        user_agent: &str,
        max_response_bytes: usize,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(user_agent)
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            client,
            max_response_bytes,
        })
    }

    pub async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        if let Some(content_type) = response.headers().get(reqwest::header::CONTENT_TYPE) {
            let content_type_str = content_type.to_str().unwrap_or("");
            if !content_type_str.contains("text/html") {
                return Err(FetchError::InvalidContentType(content_type_str.to_string()));
            }
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_response_bytes as u64 {
                return Err(FetchError::TooLarge(content_length));
            }
        }

        let body = response.bytes().await?;
        if body.len() > self.max_response_bytes {
            return Err(FetchError::TooLarge(body.len() as u64));
        }
        if body.is_empty() {
            return Err(FetchError::EmptyBody);
        }

        Ok(body.to_vec())
    }
}

impl Fetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.get(url).await
    }
}
