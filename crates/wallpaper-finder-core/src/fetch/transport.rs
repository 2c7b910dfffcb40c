use std::io::Read;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::FetchFailure;

/// Streaming GET of a single URL
pub trait Transport: Send + Sync {
    /// Open the response body of `url`; non-success statuses are failures
    fn get(&self, url: &str) -> std::result::Result<Box<dyn Read + Send>, FetchFailure>;
}

/// Blocking HTTP transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Build a client with the configured user agent and request timeout
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> std::result::Result<Box<dyn Read + Send>, FetchFailure> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchFailure::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Network(format!("HTTP {}", status)));
        }

        Ok(Box::new(response))
    }
}
