//! Exact-time N-way join.
//!
//! Each pending timestamp owns one slot per camera. A slot set fires once every
//! camera has delivered an item for that identical timestamp; timestamps at or
//! before the last fired one are never accepted again.

use std::collections::BTreeMap;

use contracts::Timestamp;

/// Result of offering one item to the join
#[derive(Debug)]
pub enum JoinOutcome<T> {
    /// Stored; the timestamp is still incomplete
    Pending {
        /// Incomplete timestamps dropped to respect the queue bound
        evicted: usize,
    },

    /// All cameras delivered for this timestamp
    Complete {
        stamp: Timestamp,
        /// Items in camera index order
        items: Vec<T>,
        /// Incomplete timestamps dropped (older than `stamp`, or over the queue bound)
        evicted: usize,
    },

    /// Not stored
    Rejected(RejectReason),
}

/// Why an item was not stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Timestamp at or before the last fired instant
    Stale,
    /// Camera already delivered for this timestamp
    Duplicate,
    /// Camera index outside the rig
    UnknownCamera,
}

impl RejectReason {
    pub fn label(self) -> &'static str {
        match self {
            Self::Stale => "stale",
            Self::Duplicate => "duplicate",
            Self::UnknownCamera => "unknown_camera",
        }
    }
}

#[derive(Debug)]
struct Slot<T> {
    items: Vec<Option<T>>,
    filled: usize,
}

impl<T> Slot<T> {
    fn new(camera_count: usize) -> Self {
        Self {
            items: std::iter::repeat_with(|| None).take(camera_count).collect(),
            filled: 0,
        }
    }

    fn is_complete(&self) -> bool {
        self.filled == self.items.len()
    }
}

/// Exact-timestamp join across a fixed number of cameras
#[derive(Debug)]
pub struct ExactTimeJoin<T> {
    camera_count: usize,
    queue_size: usize,
    pending: BTreeMap<Timestamp, Slot<T>>,
    last_fired: Option<Timestamp>,
}

impl<T> ExactTimeJoin<T> {
    /// `queue_size` bounds the number of distinct pending timestamps (minimum 1).
    pub fn new(camera_count: usize, queue_size: usize) -> Self {
        Self {
            camera_count,
            queue_size: queue_size.max(1),
            pending: BTreeMap::new(),
            last_fired: None,
        }
    }

    /// Offer the item of `camera` captured at `stamp`.
    pub fn insert(&mut self, camera: usize, stamp: Timestamp, item: T) -> JoinOutcome<T> {
        if camera >= self.camera_count {
            return JoinOutcome::Rejected(RejectReason::UnknownCamera);
        }
        if self.last_fired.is_some_and(|last| stamp <= last) {
            return JoinOutcome::Rejected(RejectReason::Stale);
        }

        let camera_count = self.camera_count;
        let slot = self
            .pending
            .entry(stamp)
            .or_insert_with(|| Slot::new(camera_count));
        if slot.items[camera].is_some() {
            return JoinOutcome::Rejected(RejectReason::Duplicate);
        }
        slot.items[camera] = Some(item);
        slot.filled += 1;

        if slot.is_complete() {
            return self.fire(stamp);
        }

        let mut evicted = 0;
        while self.pending.len() > self.queue_size {
            self.pending.pop_first();
            evicted += 1;
        }
        JoinOutcome::Pending { evicted }
    }

    fn fire(&mut self, stamp: Timestamp) -> JoinOutcome<T> {
        // Everything older can no longer complete in a time-ordered log.
        let newer = self.pending.split_off(&stamp);
        let evicted = self.pending.len();
        self.pending = newer;

        let items = match self.pending.remove(&stamp) {
            Some(slot) => slot.items.into_iter().flatten().collect(),
            None => Vec::new(),
        };
        self.last_fired = Some(stamp);

        JoinOutcome::Complete {
            stamp,
            items,
            evicted,
        }
    }

    /// Number of distinct pending timestamps
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn last_fired(&self) -> Option<Timestamp> {
        self.last_fired
    }

    pub fn camera_count(&self) -> usize {
        self.camera_count
    }

    /// Drop every pending timestamp, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}
