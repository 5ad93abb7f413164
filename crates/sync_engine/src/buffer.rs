//! Bounded inertial ring buffer with exact-timestamp lookup.
//!
//! Backed by a `HeapRb`; when full, the oldest sample is popped before the new
//! one is pushed, so occupancy never exceeds the capacity.

use std::fmt;

use contracts::{InertialSample, Timestamp};
use ringbuf::{traits::*, HeapRb};

/// Default capacity
pub const DEFAULT_INERTIAL_CAPACITY: usize = 50;

/// Most recent inertial samples in insertion order
pub struct InertialRingBuffer {
    samples: HeapRb<InertialSample>,
    evicted_count: u64,
}

impl fmt::Debug for InertialRingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InertialRingBuffer")
            .field("len", &self.samples.occupied_len())
            .field("capacity", &self.capacity())
            .field("evicted", &self.evicted_count)
            .finish()
    }
}

impl Default for InertialRingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_INERTIAL_CAPACITY)
    }
}

impl InertialRingBuffer {
    /// Create a buffer holding at most `capacity` samples (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: HeapRb::new(capacity.max(1)),
            evicted_count: 0,
        }
    }

    /// Append a sample, returning the evicted oldest sample when full.
    #[inline]
    pub fn push(&mut self, sample: InertialSample) -> Option<InertialSample> {
        let evicted = if self.samples.is_full() {
            self.evicted_count += 1;
            self.samples.try_pop()
        } else {
            None
        };
        let _ = self.samples.try_push(sample);
        evicted
    }

    /// Newest-to-oldest search for a sample whose stamp equals `stamp` exactly.
    pub fn find_exact(&self, stamp: Timestamp) -> Option<&InertialSample> {
        let (older, newer) = self.samples.as_slices();
        newer
            .iter()
            .rev()
            .chain(older.iter().rev())
            .find(|sample| sample.stamp == stamp)
    }

    /// Samples oldest first
    pub fn iter(&self) -> impl Iterator<Item = &InertialSample> {
        self.samples.iter()
    }

    /// Most recently appended sample
    pub fn newest(&self) -> Option<&InertialSample> {
        let (older, newer) = self.samples.as_slices();
        newer.last().or_else(|| older.last())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.samples.capacity().get()
    }

    /// Samples evicted since creation
    #[inline]
    pub fn evicted_count(&self) -> u64 {
        self.evicted_count
    }
}
