//! Team bandwidth quota
//!
//! Every player keeps a one-second circular record of bytes sent per step,
//! publishes it, and sums its teammates' records to estimate the team's
//! usage over the trailing second. The estimate is approximate: records are
//! read without coordination with their writers.

pub mod store;

use tracing::debug;

use crate::identity::PlayerIdentity;
use crate::robot::constants::quota::WINDOW_MS;
use store::QuotaStore;

/// Bytes sent per step over the trailing second of simulated time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandwidthWindow {
    slots: Vec<u32>,
    step_ms: u32,
}

impl BandwidthWindow {
    /// One slot per step: `1000 / step_ms` slots, at least one
    pub fn new(step_ms: u32) -> Self {
        let step_ms = step_ms.max(1);
        let len = (WINDOW_MS / step_ms).max(1) as usize;
        Self {
            slots: vec![0; len],
            step_ms,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot owned by the step at `time_ms`
    pub fn index(&self, time_ms: u32) -> usize {
        (time_ms / self.step_ms) as usize % self.slots.len()
    }

    /// Overwrite the slot of the step at `time_ms`
    pub fn record(&mut self, time_ms: u32, bytes: u32) {
        let index = self.index(time_ms);
        self.slots[index] = bytes;
    }

    /// Sum of all slots
    pub fn total(&self) -> u64 {
        self.slots.iter().map(|&b| b as u64).sum()
    }

    pub fn slots(&self) -> &[u32] {
        &self.slots
    }
}

/// Per-player quota accounting against a shared store
pub struct QuotaTracker<S> {
    identity: PlayerIdentity,
    team_size: u8,
    quota: u64,
    window: BandwidthWindow,
    store: S,
    /// Steps whose payload was replaced
    exceeded: u64,
}

impl<S: QuotaStore> QuotaTracker<S> {
    pub fn new(identity: PlayerIdentity, team_size: u8, quota: u64, step_ms: u32, store: S) -> Self {
        Self {
            identity,
            team_size,
            quota,
            window: BandwidthWindow::new(step_ms),
            store,
            exceeded: 0,
        }
    }

    /// Record this step's payload, publish, and return the team total
    ///
    /// Teammates without a readable record count as zero.
    pub fn check(&mut self, time_ms: u32, payload_size: usize) -> u64 {
        let bytes = u32::try_from(payload_size).unwrap_or(u32::MAX);
        self.window.record(time_ms, bytes);
        let mut total = self.window.total();

        if let Err(e) = self.store.publish(self.identity, self.window.slots()) {
            debug!("Failed to publish quota window: {}", e);
        }

        for player in 1..=self.team_size {
            if player == self.identity.player {
                continue;
            }
            let mate = PlayerIdentity::new(self.identity.team, player);
            match self.store.load(mate) {
                Ok(Some(window)) => total += window.iter().map(|&b| b as u64).sum::<u64>(),
                Ok(None) => {}
                Err(e) => debug!("Ignoring quota record of {}: {}", mate, e),
            }
        }
        total
    }

    /// Whether a team total is over quota; counts the overrun
    pub fn enforce(&mut self, total: u64) -> bool {
        let exceeded = total > self.quota;
        if exceeded {
            self.exceeded += 1;
        }
        exceeded
    }

    /// Text of the error entry replacing an over-quota snapshot
    pub fn exceeded_message(&self) -> String {
        format!("{} MB/s quota exceeded.", self.quota)
    }

    pub fn quota(&self) -> u64 {
        self.quota
    }

    pub fn exceeded_count(&self) -> u64 {
        self.exceeded
    }

    pub fn window(&self) -> &BandwidthWindow {
        &self.window
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Team;
    use store::MemoryQuotaStore;

    fn red(player: u8) -> PlayerIdentity {
        PlayerIdentity::new(Team::Red, player)
    }

    #[test]
    fn test_window_length() {
        assert_eq!(BandwidthWindow::new(8).len(), 125);
        assert_eq!(BandwidthWindow::new(32).len(), 31);
        assert_eq!(BandwidthWindow::new(2000).len(), 1);
        assert_eq!(BandwidthWindow::new(0).len(), 1000);
    }

    #[test]
    fn test_window_wraps() {
        let mut window = BandwidthWindow::new(250);
        assert_eq!(window.len(), 4);
        for (step, bytes) in [10, 20, 30, 40, 50].into_iter().enumerate() {
            window.record(step as u32 * 250, bytes);
        }
        // Step 4 overwrote step 0
        assert_eq!(window.slots(), &[50, 20, 30, 40]);
        assert_eq!(window.total(), 140);
    }

    #[test]
    fn test_check_sums_teammates() {
        let store = MemoryQuotaStore::new();
        let mut p1 = QuotaTracker::new(red(1), 4, 1000, 250, store.clone());
        let mut p2 = QuotaTracker::new(red(2), 4, 1000, 250, store.clone());
        let mut blue = QuotaTracker::new(PlayerIdentity::new(Team::Blue, 3), 4, 1000, 250, store.clone());

        assert_eq!(p1.check(0, 100), 100);
        assert_eq!(blue.check(0, 500), 500);
        assert_eq!(p2.check(0, 40), 140);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_quota_first_exceeded() {
        let store = MemoryQuotaStore::new();
        let mut tracker = QuotaTracker::new(red(1), 4, 1000, 250, store);

        let mut first_exceeded = None;
        for step in 0..4u32 {
            let total = tracker.check(step * 250, 300);
            if tracker.enforce(total) && first_exceeded.is_none() {
                first_exceeded = Some(step);
            }
        }
        // 300, 600, 900, 1200
        assert_eq!(first_exceeded, Some(3));
        assert_eq!(tracker.exceeded_count(), 1);
    }

    #[test]
    fn test_window_slides() {
        let store = MemoryQuotaStore::new();
        let mut tracker = QuotaTracker::new(red(1), 4, 1000, 250, store);
        for step in 0..4u32 {
            tracker.check(step * 250, 300);
        }
        // A full second later the first slot is overwritten with a small payload
        let total = tracker.check(1000, 10);
        assert_eq!(total, 910);
        assert!(!tracker.enforce(total));
    }

    #[test]
    fn test_missing_teammates_count_zero() {
        let mut tracker = QuotaTracker::new(red(4), 4, 1000, 250, MemoryQuotaStore::new());
        assert_eq!(tracker.check(0, 7), 7);
    }

    #[test]
    fn test_exceeded_message() {
        let tracker = QuotaTracker::new(red(1), 4, 1024, 8, MemoryQuotaStore::new());
        assert_eq!(tracker.exceeded_message(), "1024 MB/s quota exceeded.");
    }
}
