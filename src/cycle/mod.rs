//! Fetch → transform → publish cycles and the timer that drives them.

mod orchestrator;
mod scheduler;

pub use orchestrator::{CycleOrchestrator, CycleOrchestratorBuilder};
pub use scheduler::Scheduler;

use std::fmt;
use std::time::Duration;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Running,
}

/// Step of a cycle that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Fetch,
    Publish,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => f.write_str("fetch"),
            Self::Publish => f.write_str("publish"),
        }
    }
}

/// Counts for a cycle that reached the publish step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub readings: usize,
    pub published: usize,
    pub suppressed: usize,
    pub failed: usize,
    pub evicted: usize,
    pub duration: Duration,
}

#[derive(Debug)]
pub enum CycleOutcome {
    /// A previous cycle was still running; nothing was done.
    Skipped,
    /// The billing source returned no readings; nothing was published.
    Empty,
    Published(CycleReport),
    Failed { stage: CycleStage, error: Error },
}

impl CycleOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Published(report) => Some(report),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Empty => "empty",
            Self::Published(_) => "published",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => f.write_str("skipped: previous cycle still running"),
            Self::Empty => f.write_str("empty: no cost data returned"),
            Self::Published(report) => write!(
                f,
                "published {} of {} readings ({} suppressed, {} failed) in {:.1}s",
                report.published,
                report.readings,
                report.suppressed,
                report.failed,
                report.duration.as_secs_f64()
            ),
            Self::Failed { stage, error } => write!(f, "failed during {}: {}", stage, error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_display() {
        let outcome = CycleOutcome::Published(CycleReport {
            readings: 3,
            published: 2,
            suppressed: 1,
            failed: 0,
            evicted: 0,
            duration: Duration::from_millis(1500),
        });
        assert_eq!(
            outcome.to_string(),
            "published 2 of 3 readings (1 suppressed, 0 failed) in 1.5s"
        );
        assert_eq!(outcome.report().map(|r| r.published), Some(2));

        let outcome = CycleOutcome::Failed {
            stage: CycleStage::Fetch,
            error: Error::Fetch("boom".into()),
        };
        assert!(outcome.is_failed());
        assert_eq!(
            outcome.to_string(),
            "failed during fetch: Billing fetch failed: boom"
        );
        assert_eq!(CycleOutcome::Skipped.label(), "skipped");
    }
}
