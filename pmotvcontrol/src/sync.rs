//! Clock reconciliation against the authority's start time.

/// No correction this close to the end of the media (seconds).
pub const END_GUARD: f64 = 2.0;

/// Fraction of the sync interval the target must move for a frozen
/// position to count as a stall.
pub const STALL_RATIO: f64 = 0.8;

/// What a reconciliation pass decided.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SyncAction {
    /// Within tolerance, or too close to the end.
    Hold,
    Seek(f64),
    /// The local decoder looks wedged: reload instead of seeking.
    ForceResync,
}

/// Position the local media should be at.
///
/// Clamped to `[0, duration]`; a non-finite or zero duration only clamps
/// from below.
pub fn target_offset(now: f64, start_network_time: f64, duration: f64) -> f64 {
    let offset = (now - start_network_time).max(0.0);
    if duration.is_finite() && duration > 0.0 {
        offset.min(duration)
    } else {
        offset
    }
}

/// Remembers the previous sync attempt to spot a frozen decoder.
#[derive(Clone, Copy, Debug, Default)]
pub struct StallDetector {
    last: Option<(f64, f64)>,
}

impl StallDetector {
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Records an attempt; returns `true` when `position` did not move at
    /// all while `target` moved by more than [`STALL_RATIO`] of `interval`.
    pub fn observe(&mut self, position: f64, target: f64, interval: f64) -> bool {
        let stalled = match self.last {
            Some((last_position, last_target)) => {
                position == last_position && target - last_target > STALL_RATIO * interval
            }
            None => false,
        };
        self.last = Some((position, target));
        stalled
    }
}

/// One reconciliation step.
pub fn plan_sync(
    current: f64,
    target: f64,
    duration: f64,
    threshold: f64,
    interval: f64,
    stall: &mut StallDetector,
) -> SyncAction {
    let stalled = stall.observe(current, target, interval);

    if duration.is_finite() && duration - current < END_GUARD {
        return SyncAction::Hold;
    }
    if (current - target).abs() < threshold {
        return SyncAction::Hold;
    }
    if stalled {
        return SyncAction::ForceResync;
    }
    SyncAction::Seek(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_clamp() {
        assert_eq!(target_offset(100.0, 90.0, 60.0), 10.0);
        assert_eq!(target_offset(100.0, 110.0, 60.0), 0.0);
        assert_eq!(target_offset(500.0, 100.0, 60.0), 60.0);
        assert_eq!(target_offset(500.0, 100.0, f64::INFINITY), 400.0);
    }

    #[test]
    fn test_dead_band_and_end_guard() {
        let mut stall = StallDetector::default();
        assert_eq!(plan_sync(10.0, 10.5, 100.0, 1.0, 5.0, &mut stall), SyncAction::Hold);
        assert_eq!(plan_sync(10.0, 14.0, 100.0, 1.0, 5.0, &mut stall), SyncAction::Seek(14.0));
        assert_eq!(plan_sync(99.0, 80.0, 100.0, 1.0, 5.0, &mut stall), SyncAction::Hold);
    }

    #[test]
    fn test_stall_forces_resync() {
        let mut stall = StallDetector::default();
        assert_eq!(plan_sync(3.0, 10.0, 100.0, 1.0, 5.0, &mut stall), SyncAction::Seek(10.0));
        // Position frozen, target moved by a full interval.
        assert_eq!(plan_sync(3.0, 15.0, 100.0, 1.0, 5.0, &mut stall), SyncAction::ForceResync);
    }

    #[test]
    fn test_slow_target_is_not_a_stall() {
        let mut stall = StallDetector::default();
        plan_sync(3.0, 10.0, 100.0, 1.0, 5.0, &mut stall);
        // Target moved by less than 80% of the interval.
        assert_eq!(plan_sync(3.0, 13.0, 100.0, 1.0, 5.0, &mut stall), SyncAction::Seek(13.0));
    }
}
