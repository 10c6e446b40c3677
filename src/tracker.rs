use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::split::OffsetRange;

/// Claim-based progress over a range of row positions.
///
/// A reader claims positions one at a time, in increasing order, before it
/// emits the row at that position. The stop position may shrink at any time
/// from another thread (dynamic rebalancing), so implementations must be
/// safe to share.
pub trait RangeTracker: Send + Sync {
    fn start_position(&self) -> u64;

    /// Current exclusive upper bound; may decrease between calls.
    fn stop_position(&self) -> u64;

    /// Claim `position` for the caller. `false` means the position is no longer
    /// part of this range and the reader must stop.
    fn try_claim(&self, position: u64) -> bool;
}

#[derive(Debug)]
struct TrackerState {
    start: u64,
    stop: u64,
    last_claimed: Option<u64>,
}

/// Thread-safe [`RangeTracker`] over integer offsets that supports dynamic splitting.
#[derive(Debug)]
pub struct OffsetRangeTracker {
    state: Mutex<TrackerState>,
}

impl OffsetRangeTracker {
    #[must_use]
    pub fn new(range: OffsetRange) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                start: range.start,
                stop: range.stop,
                last_claimed: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current range, reflecting any split so far.
    #[must_use]
    pub fn range(&self) -> OffsetRange {
        let state = self.state();
        OffsetRange::new(state.start, state.stop)
    }

    #[must_use]
    pub fn last_claimed(&self) -> Option<u64> {
        self.state().last_claimed
    }

    /// Shrink the range to end at `position`, handing `[position, old stop)` to someone else.
    ///
    /// Returns the residual range and the fraction of the original range kept, or
    /// `None` if `position` is outside `(max(start, last claimed), stop)`.
    pub fn try_split(&self, position: u64) -> Option<(OffsetRange, f64)> {
        let mut state = self.state();
        if position <= state.start || position >= state.stop {
            return None;
        }
        if state.last_claimed.is_some_and(|last| position <= last) {
            return None;
        }
        let residual = OffsetRange::new(position, state.stop);
        #[allow(clippy::cast_precision_loss)]
        let fraction = (position - state.start) as f64 / (state.stop - state.start) as f64;
        state.stop = position;
        debug!(
            position,
            residual_stop = residual.stop,
            fraction,
            "split offset range"
        );
        Some((residual, fraction))
    }

    /// Share of the current range already claimed.
    #[must_use]
    pub fn fraction_consumed(&self) -> f64 {
        let state = self.state();
        match state.last_claimed {
            Some(last) if state.stop > state.start => {
                #[allow(clippy::cast_precision_loss)]
                let fraction = (last - state.start) as f64 / (state.stop - state.start) as f64;
                fraction.min(1.0)
            }
            _ => 0.0,
        }
    }

    /// Position at `fraction` (clamped to `0.0..=1.0`) of the current range.
    #[must_use]
    pub fn position_at_fraction(&self, fraction: f64) -> u64 {
        let state = self.state();
        let len = state.stop.saturating_sub(state.start);
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let offset = (fraction.clamp(0.0, 1.0) * len as f64).ceil() as u64;
        state.start + offset.min(len)
    }
}

impl RangeTracker for OffsetRangeTracker {
    fn start_position(&self) -> u64 {
        self.state().start
    }

    fn stop_position(&self) -> u64 {
        self.state().stop
    }

    fn try_claim(&self, position: u64) -> bool {
        let mut state = self.state();
        if position < state.start {
            warn!(position, start = state.start, "claim before range start");
            return false;
        }
        if state.last_claimed.is_some_and(|last| position <= last) {
            warn!(position, last = ?state.last_claimed, "non-monotonic claim refused");
            return false;
        }
        if position >= state.stop {
            return false;
        }
        state.last_claimed = Some(position);
        true
    }
}
