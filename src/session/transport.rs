//! HTTP transport
//!
//! This module handles all HTTP requests for the crawler:
//! - Building the HTTP client with a cookie jar and user agent
//! - GET requests for pages
//! - Form-encoded POST requests for the login form
//! - Classifying failures so the retry executor can decide what to retry

use crate::config::HttpConfig;
use crate::{HarvestError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Minimal HTTP capability the session needs
///
/// Implementations must keep cookies between calls so that a successful login
/// carries over to later page fetches.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues a GET and returns the response body
    async fn get(&self, url: &Url) -> Result<String>;

    /// Submits a form-encoded POST and returns the response body
    async fn post_form(&self, url: &Url, form: &[(&str, &str)]) -> Result<String>;
}

/// Builds an HTTP client with a cookie store and the configured timeouts
///
/// # Example
///
/// ```no_run
/// use quote_harvester::config::HttpConfig;
/// use quote_harvester::session::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// `Transport` backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a transport with a fresh cookie jar
    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        Ok(Self::new(build_http_client(config)?))
    }

    async fn read_body(url: &Url, response: reqwest::Response) -> Result<String> {
        let response = response
            .error_for_status()
            .map_err(|e| HarvestError::from_transport(url.as_str(), &e))?;

        response
            .text()
            .await
            .map_err(|e| HarvestError::from_transport(url.as_str(), &e))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<String> {
        tracing::trace!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| HarvestError::from_transport(url.as_str(), &e))?;

        Self::read_body(url, response).await
    }

    async fn post_form(&self, url: &Url, form: &[(&str, &str)]) -> Result<String> {
        tracing::trace!("POST {}", url);
        let response = self
            .client
            .post(url.clone())
            .form(form)
            .send()
            .await
            .map_err(|e| HarvestError::from_transport(url.as_str(), &e))?;

        Self::read_body(url, response).await
    }
}
