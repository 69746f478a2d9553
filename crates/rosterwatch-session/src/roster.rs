//! Roster values and the cache that hands them across threads.
//!
//! A [`RosterSnapshot`] is immutable once built. The [`RosterCache`] holds
//! the latest one behind an `Arc`: publishing swaps the pointer under a
//! short write lock and reading clones the pointer under a read lock, so a
//! reader never sees a half-built list and the writer never waits on how
//! long a reader keeps its copy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use rosterwatch_protocol::WhoReply;
use serde::Serialize;

/// Whether a user is at the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Here,
    Away,
}

/// One present user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    /// The user's nickname.
    pub display_name: String,
    /// The WHO host field, which this network fills with a country code.
    pub country_code: String,
    pub presence: Presence,
    /// The WHO trailing field: hop count, game version, real name.
    pub game_metadata: String,
}

impl RosterEntry {
    /// Builds an entry from a parsed WHO reply.
    pub fn from_who(who: &WhoReply) -> Self {
        Self {
            display_name: who.nick.clone(),
            country_code: who.host.clone(),
            presence: if who.is_here() {
                Presence::Here
            } else {
                Presence::Away
            },
            game_metadata: who.info.clone(),
        }
    }
}

/// The result of one completed roster query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterSnapshot {
    entries: Vec<RosterEntry>,
    completed_at: SystemTime,
}

impl RosterSnapshot {
    /// Wraps the entries of a finished query.
    pub fn new(entries: Vec<RosterEntry>, completed_at: SystemTime) -> Self {
        Self {
            entries,
            completed_at,
        }
    }

    /// Entries in the order the server listed them.
    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// An explicit empty roster: the query ran and nobody matched.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// When the end-of-query marker arrived.
    pub fn completed_at(&self) -> SystemTime {
        self.completed_at
    }
}

/// Holding cell for the latest completed [`RosterSnapshot`].
///
/// Single writer (the network thread), any number of readers.
#[derive(Debug, Default)]
pub struct RosterCache {
    latest: RwLock<Option<Arc<RosterSnapshot>>>,
    first_query_completed: AtomicBool,
}

impl RosterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the published snapshot.
    pub fn publish(&self, snapshot: RosterSnapshot) {
        let snapshot = Arc::new(snapshot);
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
        self.first_query_completed.store(true, Ordering::Release);
    }

    /// The latest snapshot, or `None` if no query has completed yet.
    pub fn current(&self) -> Option<Arc<RosterSnapshot>> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether any query has ever completed.
    pub fn first_query_completed(&self) -> bool {
        self.first_query_completed.load(Ordering::Acquire)
    }
}
