//! Bounded recent-message window with O(1) id lookup.
//!
//! A fixed-capacity ring of records plus a set of the ids currently live in
//! the ring. The engine keeps one window of sent commands (retransmission
//! source and post-mortem inspection) and one of received commands
//! (duplicate suppression).
//!
//! # Invariants
//!
//! - The id set always equals the set of ids of records in the ring.
//! - `add` is idempotent on id; the record count never exceeds
//!   [`WINDOW_CAPACITY`].

use std::collections::HashSet;

use droidlink_proto::Command;

/// Number of records a window retains.
pub const WINDOW_CAPACITY: usize = 25;

/// Records stored in a [`RecentWindow`] expose their message id.
pub trait HasId {
    /// Message identifier of this record.
    fn id(&self) -> u32;
}

impl HasId for Command {
    fn id(&self) -> u32 {
        self.id
    }
}

/// Fixed-capacity FIFO of recent records, deduplicated by id.
///
/// Backed by an array ring; the auxiliary id set is bounded by the window
/// capacity, so memory stays constant regardless of traffic.
#[derive(Debug)]
pub struct RecentWindow<T> {
    slots: [Option<T>; WINDOW_CAPACITY],
    head: usize,
    tail: usize,
    len: usize,
    ids: HashSet<u32>,
}

impl<T: HasId> Default for RecentWindow<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: HasId> RecentWindow<T> {
    /// Create an empty window.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            head: 0,
            tail: 0,
            len: 0,
            ids: HashSet::with_capacity(WINDOW_CAPACITY),
        }
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no records are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when a record with this id is live.
    #[must_use]
    pub fn contains(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }

    /// Append a record, evicting the oldest when full.
    ///
    /// No-op when a record with the same id is already live. Returns the
    /// evicted record, if any, so the caller can release state tied to it
    /// (the engine drops the matching outstanding entry).
    pub fn add(&mut self, record: T) -> Option<T> {
        if self.contains(record.id()) {
            return None;
        }

        let mut evicted = None;
        if self.len == WINDOW_CAPACITY {
            if let Some(old) = self.slots[self.tail].take() {
                self.ids.remove(&old.id());
                evicted = Some(old);
            }
            self.tail = (self.tail + 1) % WINDOW_CAPACITY;
            self.len -= 1;
        }

        self.ids.insert(record.id());
        self.slots[self.head] = Some(record);
        self.head = (self.head + 1) % WINDOW_CAPACITY;
        self.len += 1;

        evicted
    }

    /// Borrow the record with this id, oldest-first linear scan.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<&T> {
        if !self.contains(id) {
            return None;
        }
        (0..self.len)
            .map(|offset| (self.tail + offset) % WINDOW_CAPACITY)
            .find_map(|slot| self.slots[slot].as_ref().filter(|record| record.id() == id))
    }

    /// Borrow the most recently added record, or `None` when empty.
    #[must_use]
    pub fn latest(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        let slot = (self.head + WINDOW_CAPACITY - 1) % WINDOW_CAPACITY;
        self.slots[slot].as_ref()
    }

    /// Ids of all live records, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.ids.iter().copied()
    }

    /// Drop every record and id.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.tail = 0;
        self.len = 0;
        self.ids.clear();
    }
}
