//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: Lifecycle of a single crawl run (idle, authenticating, crawling, ...)
//! - `AbortReason`: Why a run stopped early or never started
//! - `SessionState`: Authentication state of a session

mod crawl_state;
mod session_state;

// Re-export main types
pub use crawl_state::{AbortReason, CrawlState};
pub use session_state::SessionState;
