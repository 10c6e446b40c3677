use serde::{Deserialize, Serialize};
use tracing::debug;

/// Number of bundles a full result set is divided into, at most.
pub const TARGET_BUNDLE_COUNT: u64 = 10_000;

/// Half-open interval `[start, stop)` of row positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OffsetRange {
    pub start: u64,
    pub stop: u64,
}

impl OffsetRange {
    /// Stop position of a range that runs to the end of the result set.
    pub const OPEN_END: u64 = u64::MAX;

    #[must_use]
    pub fn new(start: u64, stop: u64) -> Self {
        Self { start, stop }
    }

    /// `[start, end of results)`.
    #[must_use]
    pub fn open_ended(start: u64) -> Self {
        Self::new(start, Self::OPEN_END)
    }

    #[must_use]
    pub fn is_open_ended(&self) -> bool {
        self.stop == Self::OPEN_END
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.stop.saturating_sub(self.start)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stop <= self.start
    }

    #[must_use]
    pub fn contains(&self, position: u64) -> bool {
        self.start <= position && position < self.stop
    }
}

/// One unit of parallel read work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    /// Planning weight handed back to the scheduler; not used for sizing.
    pub weight: u64,
    pub range: OffsetRange,
}

/// Chunk size for a result set of `total` rows, never below one row.
#[must_use]
pub fn chunk_size(total: u64) -> u64 {
    (total / TARGET_BUNDLE_COUNT).max(1)
}

/// Lazily yields consecutive, gap-free bundles covering `range`.
///
/// With an open tail the last bundle runs to the end of the result set
/// instead of stopping at `range.stop`, so rows past an under-counted
/// estimate still belong to a bundle.
///
/// Cloning restarts the plan from the same point.
#[derive(Debug, Clone)]
pub struct SplitPlan {
    weight: u64,
    chunk: u64,
    next_start: u64,
    stop: u64,
    open_tail: bool,
    finished: bool,
}

impl SplitPlan {
    /// Plan bundles of `chunk_size(total)` rows over `range`; the last bundle is clamped to `range.stop`.
    #[must_use]
    pub fn new(total: u64, desired_bundle_size: u64, range: OffsetRange) -> Self {
        let chunk = chunk_size(total);
        debug!(
            total,
            chunk,
            start = range.start,
            stop = range.stop,
            desired_bundle_size,
            "planning split"
        );
        Self {
            weight: desired_bundle_size,
            chunk,
            next_start: range.start,
            stop: range.stop,
            open_tail: false,
            finished: false,
        }
    }

    /// Make the last bundle open-ended. A plan over an empty range then
    /// still yields that one bundle.
    #[must_use]
    pub fn with_open_tail(mut self) -> Self {
        self.open_tail = true;
        self
    }

    #[must_use]
    pub fn chunk(&self) -> u64 {
        self.chunk
    }
}

impl Iterator for SplitPlan {
    type Item = Bundle;

    fn next(&mut self) -> Option<Bundle> {
        if self.finished {
            return None;
        }
        let start = self.next_start;
        let mut stop = start.saturating_add(self.chunk).min(self.stop);
        if stop >= self.stop {
            self.finished = true;
            if self.open_tail {
                stop = OffsetRange::OPEN_END;
            } else if start >= self.stop {
                return None;
            }
        }
        self.next_start = stop;
        Some(Bundle {
            weight: self.weight,
            range: OffsetRange::new(start, stop),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.finished {
            0
        } else {
            let chunks = self.stop.saturating_sub(self.next_start).div_ceil(self.chunk);
            if self.open_tail { chunks.max(1) } else { chunks }
        };
        let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(bundles: &[Bundle], range: OffsetRange) {
        assert_eq!(bundles.first().map(|b| b.range.start), Some(range.start));
        assert_eq!(bundles.last().map(|b| b.range.stop), Some(range.stop));
        for pair in bundles.windows(2) {
            assert_eq!(pair[0].range.stop, pair[1].range.start);
        }
        assert!(bundles.iter().all(|b| !b.range.is_empty()));
    }

    #[test]
    fn splits_into_chunks_of_total_over_ten_thousand() {
        let bundles: Vec<Bundle> = SplitPlan::new(25_000, 64, OffsetRange::new(0, 25_000)).collect();
        assert_eq!(bundles.len(), 12_500);
        assert_eq!(bundles[0].range, OffsetRange::new(0, 2));
        assert_eq!(bundles[1].range, OffsetRange::new(2, 4));
        assert!(bundles.iter().all(|b| b.weight == 64));
        assert_covers(&bundles, OffsetRange::new(0, 25_000));
    }

    #[test]
    fn small_totals_clamp_chunk_to_one_and_terminate() {
        assert_eq!(chunk_size(9_999), 1);
        assert_eq!(chunk_size(0), 1);
        let bundles: Vec<Bundle> = SplitPlan::new(7, 1, OffsetRange::new(0, 7)).collect();
        assert_eq!(bundles.len(), 7);
        assert_covers(&bundles, OffsetRange::new(0, 7));
    }

    #[test]
    fn last_bundle_is_clamped() {
        let bundles: Vec<Bundle> = SplitPlan::new(30_000, 1, OffsetRange::new(0, 7)).collect();
        assert_eq!(bundles.len(), 3);
        assert_eq!(bundles[2].range, OffsetRange::new(6, 7));
    }

    #[test]
    fn non_zero_start_is_respected() {
        let bundles: Vec<Bundle> = SplitPlan::new(20_000, 1, OffsetRange::new(5, 11)).collect();
        assert_eq!(bundles[0].range, OffsetRange::new(5, 7));
        assert_covers(&bundles, OffsetRange::new(5, 11));
    }

    #[test]
    fn empty_range_yields_nothing_and_clone_restarts() {
        assert_eq!(SplitPlan::new(100, 1, OffsetRange::new(4, 4)).count(), 0);
        let plan = SplitPlan::new(100, 1, OffsetRange::new(0, 3));
        let first: Vec<Bundle> = plan.clone().collect();
        let second: Vec<Bundle> = plan.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn open_tail_runs_last_bundle_to_end_of_results() {
        let plan = SplitPlan::new(20_000, 1, OffsetRange::new(0, 5)).with_open_tail();
        assert_eq!(plan.size_hint(), (3, Some(3)));
        let bundles: Vec<Bundle> = plan.collect();
        assert_eq!(bundles.len(), 3);
        assert_eq!(bundles[1].range, OffsetRange::new(2, 4));
        assert_eq!(bundles[2].range, OffsetRange::open_ended(4));
        assert!(bundles[2].range.is_open_ended());
        assert!(!bundles[1].range.is_open_ended());
    }

    #[test]
    fn open_tail_past_estimate_yields_one_open_bundle() {
        let bundles: Vec<Bundle> = SplitPlan::new(5, 1, OffsetRange::new(7, 5))
            .with_open_tail()
            .collect();
        assert_eq!(bundles, vec![Bundle { weight: 1, range: OffsetRange::open_ended(7) }]);
    }

    #[test]
    fn size_hint_is_exact() {
        let plan = SplitPlan::new(25_000, 1, OffsetRange::new(0, 25_001));
        assert_eq!(plan.size_hint(), (12_501, Some(12_501)));
        assert_eq!(plan.count(), 12_501);
    }
}
