use crate::domain::episode::{EpisodeStatus, TtsStatus};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SegmentStatusCounts {
    pub queued: usize,
    pub generating: usize,
    pub ready: usize,
    pub failed: usize,
}

impl SegmentStatusCounts {
    pub fn total(&self) -> usize {
        self.queued + self.generating + self.ready + self.failed
    }

    pub fn outstanding(&self) -> usize {
        self.queued + self.generating
    }
}

/// Where an episode stands after a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rollup {
    /// Every segment is ready
    Complete,
    /// Segments are still queued or generating
    InProgress,
    /// Nothing outstanding, but some segments failed
    NeedsRetry,
    /// The episode has no segments at all
    Empty,
}

/// Outcome of the self-heal reset that follows `Rollup::NeedsRetry`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Requeued(u64),
    Stuck,
}

/// Decides episode state from its segments' statuses. No I/O.
pub struct EpisodeCompletionTracker;

impl EpisodeCompletionTracker {
    pub fn tally(statuses: &[TtsStatus]) -> SegmentStatusCounts {
        statuses
            .iter()
            .fold(SegmentStatusCounts::default(), |mut counts, status| {
                match status {
                    TtsStatus::Queued => counts.queued += 1,
                    TtsStatus::Generating => counts.generating += 1,
                    TtsStatus::Ready => counts.ready += 1,
                    TtsStatus::Failed => counts.failed += 1,
                }
                counts
            })
    }

    pub fn assess(counts: &SegmentStatusCounts) -> Rollup {
        if counts.total() == 0 {
            Rollup::Empty
        } else if counts.ready == counts.total() {
            Rollup::Complete
        } else if counts.outstanding() > 0 {
            Rollup::InProgress
        } else {
            Rollup::NeedsRetry
        }
    }

    /// A reset that found nothing eligible means the episode is stuck
    pub fn after_reset(requeued: u64) -> RetryOutcome {
        if requeued > 0 {
            RetryOutcome::Requeued(requeued)
        } else {
            RetryOutcome::Stuck
        }
    }

    /// Episode status implied by a rollup, `None` when nothing should be written
    pub fn target_status(rollup: Rollup, retry: Option<RetryOutcome>) -> Option<EpisodeStatus> {
        match (rollup, retry) {
            (Rollup::Complete, _) => Some(EpisodeStatus::Ready),
            (Rollup::InProgress, _) => Some(EpisodeStatus::Voicing),
            (Rollup::NeedsRetry, Some(RetryOutcome::Requeued(_))) => Some(EpisodeStatus::Voicing),
            (Rollup::NeedsRetry, Some(RetryOutcome::Stuck)) => Some(EpisodeStatus::Failed),
            (Rollup::NeedsRetry, None) | (Rollup::Empty, _) => None,
        }
    }

    /// Whether the caller should invoke again
    pub fn more_work(rollup: Rollup, retry: Option<RetryOutcome>) -> bool {
        match rollup {
            Rollup::InProgress => true,
            Rollup::NeedsRetry => matches!(retry, Some(RetryOutcome::Requeued(_))),
            Rollup::Complete | Rollup::Empty => false,
        }
    }
}
