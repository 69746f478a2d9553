//! State visible to both sides of the thread boundary.

use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use crate::{Phase, RosterCache};

/// Flags and roster published by the network thread.
///
/// Phase and attempt are plain atomics: the reader only needs eventual
/// visibility, never a consistent pair. The roster goes through
/// [`RosterCache`], which guarantees whole snapshots.
#[derive(Debug)]
pub struct SharedStatus {
    phase: AtomicU8,
    attempt: AtomicU32,
    roster: RosterCache,
}

impl SharedStatus {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Disconnected as u8),
            attempt: AtomicU32::new(0),
            roster: RosterCache::new(),
        }
    }

    /// Last phase the network thread published.
    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Last attempt count the network thread published.
    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::Acquire)
    }

    pub fn roster(&self) -> &RosterCache {
        &self.roster
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    pub(crate) fn set_attempt(&self, attempt: u32) {
        self.attempt.store(attempt, Ordering::Release);
    }
}

impl Default for SharedStatus {
    fn default() -> Self {
        Self::new()
    }
}
