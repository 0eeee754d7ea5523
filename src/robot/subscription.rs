//! Sensor subscription state machine
//!
//! Per device: inactive -> pending -> active, and active/pending -> inactive
//! on disable. A device enabled during a step is pending until `commit`
//! runs after that step's snapshot, so it starts reporting the next step.
//! Disabling takes effect immediately.

use std::collections::BTreeSet;

use crate::host::DeviceId;

/// Subscription state of one device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Inactive,
    Pending,
    Active,
}

/// Reporting devices, split into active and just-enabled
#[derive(Debug, Clone, Default)]
pub struct Subscriptions {
    active: BTreeSet<DeviceId>,
    pending: BTreeSet<DeviceId>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a device; already active devices stay active
    pub fn stage(&mut self, id: DeviceId) {
        if !self.active.contains(&id) {
            self.pending.insert(id);
        }
    }

    /// Stop reporting a device, including for the current step
    pub fn disable(&mut self, id: DeviceId) {
        self.active.remove(&id);
        self.pending.remove(&id);
    }

    /// Promote every pending device to active
    pub fn commit(&mut self) -> usize {
        let promoted = self.pending.len();
        self.active.append(&mut self.pending);
        promoted
    }

    pub fn state(&self, id: DeviceId) -> SubscriptionState {
        if self.active.contains(&id) {
            SubscriptionState::Active
        } else if self.pending.contains(&id) {
            SubscriptionState::Pending
        } else {
            SubscriptionState::Inactive
        }
    }

    /// Active devices in handle order
    pub fn active(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.active.iter().copied()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
