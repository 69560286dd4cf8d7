//! State module for tracking crawl progress
//!
//! - `CrawlPhase`: the run-level state machine driven by the coordinator

mod phase;

pub use phase::CrawlPhase;
