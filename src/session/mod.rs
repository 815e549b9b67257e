//! Authenticated session management
//!
//! A `SessionManager` owns one cookie-carrying transport and performs the
//! site's CSRF-token login flow:
//! 1. GET the login page and read the hidden anti-forgery field
//! 2. POST the token together with the credentials
//! 3. Treat the presence of the logout marker in the response as success
//!
//! The site answers 200 for both accepted and rejected credentials, so the
//! status code alone never decides the outcome.

mod transport;

pub use transport::{build_http_client, HttpTransport, Transport};

use crate::config::{Config, SiteConfig};
use crate::retry::{self, RetryPolicy};
use crate::state::SessionState;
use crate::url::join_path;
use crate::{HarvestError, Result};
use scraper::{Html, Selector};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Owns one authenticated HTTP session
pub struct SessionManager<T: Transport = HttpTransport> {
    base_url: Url,
    login_url: Url,
    probe_url: Url,
    csrf_field: String,
    logout_marker: String,
    transport: T,
    state: SessionState,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl SessionManager<HttpTransport> {
    /// Creates a session with a fresh HTTP client built from the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::from_config(&config.http)?;
        Self::new(&config.site, transport, RetryPolicy::from(&config.retry))
    }
}

impl<T: Transport> SessionManager<T> {
    /// Creates an unauthenticated session
    ///
    /// # Arguments
    ///
    /// * `site` - Site layout (base address, login and probe paths, markers)
    /// * `transport` - Transport used for every request of this session
    /// * `retry` - Retry budget applied to `login`
    pub fn new(site: &SiteConfig, transport: T, retry: RetryPolicy) -> Result<Self> {
        let base_url = Url::parse(&site.base_url)?;
        let login_url = join_path(&base_url, &site.login_path)?;
        let probe_url = join_path(&base_url, &site.probe_path)?;

        Ok(Self {
            base_url,
            login_url,
            probe_url,
            csrf_field: site.csrf_field.clone(),
            logout_marker: site.logout_marker.clone(),
            transport,
            state: SessionState::LoggedOut,
            retry,
            cancel: CancellationToken::new(),
        })
    }

    /// Uses `cancel` to abort pending login retries
    pub fn set_cancellation(&mut self, cancel: CancellationToken) {
        self.cancel = cancel;
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn login_url(&self) -> &Url {
        &self.login_url
    }

    /// State after the most recent login attempt
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Logs in with the given credentials
    ///
    /// Transport failures are retried according to the session's retry
    /// policy. A missing CSRF field is a site-structure change and is not
    /// retried.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The response carried the logout marker
    /// * `Ok(false)` - The form was accepted but the credentials were not
    /// * `Err(HarvestError::RetryExhausted)` - Wrapping the last transport or
    ///   structure failure
    /// * `Err(HarvestError::Cancelled)` - Cancelled while waiting to retry
    pub async fn login(&mut self, username: &str, password: &str) -> Result<bool> {
        self.state = SessionState::LoggingIn;
        tracing::info!("Logging in to {} as {}", self.login_url, username);

        let outcome = retry::execute(
            || self.attempt_login(username, password),
            &self.retry,
            "Login",
            &self.cancel,
        )
        .await;

        match outcome {
            Ok(true) => {
                self.state = SessionState::Authenticated;
                tracing::info!("Login successful");
                Ok(true)
            }
            Ok(false) => {
                self.state = SessionState::LoggedOut;
                tracing::error!("Login failed: credentials rejected");
                Ok(false)
            }
            Err(e) => {
                self.state = SessionState::LoggedOut;
                Err(e)
            }
        }
    }

    /// One pass through the login flow, without retries
    async fn attempt_login(&self, username: &str, password: &str) -> Result<bool> {
        let login_page = self.transport.get(&self.login_url).await?;
        let token = extract_csrf_token(&login_page, &self.csrf_field)?;

        let form = [
            (self.csrf_field.as_str(), token.as_str()),
            ("username", username),
            ("password", password),
        ];
        let response = self.transport.post_form(&self.login_url, &form).await?;

        Ok(response.contains(&self.logout_marker))
    }

    /// Probes an authenticated-only page for the logout marker
    ///
    /// Any transport failure counts as "not authenticated"; the probe is never
    /// retried.
    pub async fn is_authenticated(&self) -> bool {
        match self.transport.get(&self.probe_url).await {
            Ok(body) => body.contains(&self.logout_marker),
            Err(e) => {
                tracing::warn!("Error checking authentication: {}", e);
                false
            }
        }
    }
}

/// Reads the CSRF token from the login form
///
/// # Returns
///
/// * `Ok(String)` - The value of `input[name=<field>]`
/// * `Err(HarvestError::AuthenticationStructure)` - The field or its value is
///   missing, meaning the login page layout changed
pub fn extract_csrf_token(html: &str, field: &str) -> Result<String> {
    let selector = Selector::parse(&format!("input[name=\"{}\"]", field)).map_err(|e| {
        HarvestError::AuthenticationStructure(format!(
            "invalid CSRF field name '{}': {:?}",
            field, e
        ))
    })?;

    let document = Html::parse_document(html);
    let input = document.select(&selector).next().ok_or_else(|| {
        HarvestError::AuthenticationStructure(format!("login form has no '{}' field", field))
    })?;

    match input.value().attr("value") {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(HarvestError::AuthenticationStructure(format!(
            "login form field '{}' has no value",
            field
        ))),
    }
}
