/// Crawl state definitions for tracking a single crawl run
///
/// A run moves `Idle -> Authenticating -> {Failed | Crawling} -> Completed`.
use std::fmt;

/// Represents the current state of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlState {
    /// Controller has been created but not started
    Idle,

    /// Logging in to the site
    Authenticating,

    /// Walking the paginated listing
    Crawling,

    // ===== Terminal States =====
    /// Pagination finished (possibly early, see `AbortReason`)
    Completed,

    /// Login never succeeded; no page was fetched
    Failed,
}

impl CrawlState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Authenticating)
                | (Self::Authenticating, Self::Crawling)
                | (Self::Authenticating, Self::Failed)
                | (Self::Crawling, Self::Completed)
        )
    }

    /// Converts the state to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Authenticating => "authenticating",
            Self::Crawling => "crawling",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a crawl stopped before walking every page, or never started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The site answered the login form without the logout marker
    LoginRejected,

    /// The login page no longer carries the expected form field
    LoginStructure(String),

    /// Login could not complete because of transport failures
    LoginFailed(String),

    /// A page fetch failed after its retry budget was spent
    FetchFailed { url: String, reason: String },

    /// The crawl was cancelled by the caller
    Cancelled,

    /// The configured page cap was reached
    PageLimitReached(u32),

    /// The configured wall-clock deadline passed
    DeadlineExceeded,
}

impl AbortReason {
    /// Returns true if the abort happened before any page was fetched
    pub fn is_login_failure(&self) -> bool {
        matches!(
            self,
            Self::LoginRejected | Self::LoginStructure(_) | Self::LoginFailed(_)
        )
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoginRejected => write!(f, "login rejected"),
            Self::LoginStructure(msg) => write!(f, "login page structure error: {}", msg),
            Self::LoginFailed(msg) => write!(f, "login failed: {}", msg),
            Self::FetchFailed { url, reason } => write!(f, "fetch of {} failed: {}", url, reason),
            Self::Cancelled => write!(f, "cancelled"),
            Self::PageLimitReached(limit) => write!(f, "page limit of {} reached", limit),
            Self::DeadlineExceeded => write!(f, "crawl deadline exceeded"),
        }
    }
}
