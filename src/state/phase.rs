/// Crawl run phase definitions
///
/// A run moves strictly forward through `Idle -> Seeding -> Crawling ->
/// Finalizing -> Done`. Cancellation and store failures still pass through
/// `Finalizing` so a partial summary is always produced.
use std::fmt;

/// Represents the current phase of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Coordinator created, nothing started
    Idle,

    /// Frontier is being filled with the base URL and indexer URLs
    Seeding,

    /// Pages are being fetched, parsed and indexed
    Crawling,

    /// Statistics are being computed and the store flushed
    Finalizing,

    /// Run finished; statistics are available
    Done,
}

impl CrawlPhase {
    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Seeding)
                | (Self::Seeding, Self::Crawling)
                | (Self::Seeding, Self::Finalizing)
                | (Self::Crawling, Self::Finalizing)
                | (Self::Finalizing, Self::Done)
        )
    }

    /// Returns true once the run has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true while the run is doing work
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Seeding | Self::Crawling | Self::Finalizing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Seeding => "seeding",
            Self::Crawling => "crawling",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        }
    }

    /// Returns all phases in run order
    pub fn all_phases() -> Vec<Self> {
        vec![
            Self::Idle,
            Self::Seeding,
            Self::Crawling,
            Self::Finalizing,
            Self::Done,
        ]
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
