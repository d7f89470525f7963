//! Aggregate run statistics: atomic counters updated from any rotation
//! worker task without a lock. Buckets are keyed by classification
//! *reason*, not by the bookkeeping `skipped` label a soft/hard-blocked
//! credential ends up with once retries are exhausted — see DESIGN.md:
//! the wire schema only names seven stat buckets (no dedicated
//! `wrong_credentials`/`timeout`/`skipped` counters), so the finer
//! breakdown lives in each run's `results[]` instead.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::{AttemptStatus, RunStats};

#[derive(Default)]
pub struct AggregateStats {
    total: AtomicU64,
    success: AtomicU64,
    failed: AtomicU64,
    soft_blocked: AtomicU64,
    hard_blocked: AtomicU64,
    error: AtomicU64,
    rotations: AtomicU64,
}

impl AggregateStats {
    pub fn record_reason(&self, status: AttemptStatus) {
        use AttemptStatus::*;
        self.total.fetch_add(1, Ordering::Relaxed);
        match status {
            Success => &self.success,
            SoftBlocked => &self.soft_blocked,
            HardBlocked => &self.hard_blocked,
            Error => &self.error,
            WrongCredentials | Timeout | Pending | Running | Skipped => &self.failed,
        }
        .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RunStats {
        RunStats {
            total: self.total.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            soft_blocked: self.soft_blocked.load(Ordering::Relaxed),
            hard_blocked: self.hard_blocked.load(Ordering::Relaxed),
            error: self.error.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_credentials_and_timeout_both_fold_into_failed() {
        let s = AggregateStats::default();
        s.record_reason(AttemptStatus::WrongCredentials);
        s.record_reason(AttemptStatus::Timeout);
        let snap = s.snapshot();
        assert_eq!(snap.failed, 2);
        assert_eq!(snap.total, 2);
    }

    #[test]
    fn rotations_counted_independently_of_total() {
        let s = AggregateStats::default();
        s.record_rotation();
        s.record_rotation();
        let snap = s.snapshot();
        assert_eq!(snap.rotations, 2);
        assert_eq!(snap.total, 0);
    }
}
