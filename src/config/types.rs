use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Quote-Harvester
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Target site layout
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Base address every relative href is resolved against
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path of the login form (GET for the token, POST for credentials)
    #[serde(rename = "login-path")]
    pub login_path: String,

    /// Path of the first listing page
    #[serde(rename = "first-page-path")]
    pub first_page_path: String,

    /// Authenticated-only page used as a liveness probe
    #[serde(rename = "probe-path")]
    pub probe_path: String,

    /// Name of the hidden anti-forgery input on the login form
    #[serde(rename = "csrf-field")]
    pub csrf_field: String,

    /// Text present only on pages served to a logged-in session
    #[serde(rename = "logout-marker")]
    pub logout_marker: String,

    /// Domain patterns recognised as third-party reference links
    #[serde(rename = "reference-domains")]
    pub reference_domains: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://quotes.toscrape.com".to_string(),
            login_path: "/login".to_string(),
            first_page_path: "/page/1/".to_string(),
            probe_path: "/".to_string(),
            csrf_field: "csrf_token".to_string(),
            logout_marker: "Logout".to_string(),
            reference_domains: vec!["*.goodreads.com".to_string()],
        }
    }
}

/// Retry and backoff tuning shared by login and page fetches
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Delay before the first retry (milliseconds)
    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    /// Upper bound on the pre-jitter delay (milliseconds)
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("quote-harvester/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// Limits on a single crawl run
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Maximum pages to visit, 0 for no limit
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Wall-clock budget for the whole crawl in seconds, 0 for none
    #[serde(rename = "max-crawl-seconds")]
    pub max_crawl_seconds: u64,
}

impl CrawlConfig {
    pub fn page_limit(&self) -> Option<u32> {
        (self.max_pages > 0).then_some(self.max_pages)
    }

    pub fn deadline(&self) -> Option<Duration> {
        (self.max_crawl_seconds > 0).then(|| Duration::from_secs(self.max_crawl_seconds))
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./quotes.db".to_string(),
        }
    }
}
