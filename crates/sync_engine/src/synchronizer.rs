//! Streaming frame synchronizer.
//!
//! Joins images across cameras on identical timestamps, then looks up an
//! inertial sample with that same timestamp. Each instant is emitted at most
//! once; one that cannot be completed is recorded as a [`SyncMiss`].

use std::collections::BTreeMap;

use tracing::{debug, instrument, warn};

use contracts::{
    FrameBatch, Image, ImageMessage, InertialSample, MissPolicy, MissReason, SyncConfig, SyncMiss,
    SyncStats, Timestamp,
};

use crate::buffer::InertialRingBuffer;
use crate::join::{ExactTimeJoin, JoinOutcome, RejectReason};

/// Per-run synchronizer state for a rig of fixed size
#[derive(Debug)]
pub struct FrameSynchronizer {
    camera_count: usize,
    join: ExactTimeJoin<ImageMessage>,
    inertial: InertialRingBuffer,
    miss_policy: MissPolicy,
    /// Complete image sets waiting for their inertial sample
    held: BTreeMap<Timestamp, Vec<Image>>,
    held_capacity: usize,
    misses: Vec<SyncMiss>,
    stats: SyncStats,
}

impl FrameSynchronizer {
    pub fn new(camera_count: usize, config: &SyncConfig) -> Self {
        Self {
            camera_count,
            join: ExactTimeJoin::new(camera_count, config.join_queue_size),
            inertial: InertialRingBuffer::new(config.imu_buffer_capacity),
            miss_policy: config.miss_policy,
            held: BTreeMap::new(),
            held_capacity: config.join_queue_size.max(1),
            misses: Vec::new(),
            stats: SyncStats::default(),
        }
    }

    /// Append an inertial sample.
    ///
    /// Only under [`MissPolicy::AwaitInertial`] can this complete a held batch.
    pub fn on_inertial(&mut self, sample: InertialSample) -> Option<FrameBatch> {
        self.stats.inertial_received += 1;
        let stamp = sample.stamp;
        self.inertial.push(sample);
        observability::record_inertial_buffer_depth(self.inertial.len());

        let images = self.held.remove(&stamp)?;
        debug!(%stamp, "held image set matched late inertial sample");
        Some(self.emit(stamp, images, sample))
    }

    /// Deliver the image of `camera` captured at `stamp`.
    #[instrument(
        name = "frame_sync_image",
        level = "trace",
        skip_all,
        fields(camera, %stamp)
    )]
    pub fn on_image(&mut self, camera: usize, stamp: Timestamp, image: ImageMessage) -> Option<FrameBatch> {
        self.stats.images_received += 1;

        let outcome = self.join.insert(camera, stamp, image);
        observability::record_pending_joins(self.join.pending_len());

        match outcome {
            JoinOutcome::Pending { evicted } => {
                self.note_evicted(evicted);
                None
            }
            JoinOutcome::Rejected(reason) => {
                self.note_rejected(camera, stamp, reason);
                None
            }
            JoinOutcome::Complete {
                stamp,
                items,
                evicted,
            } => {
                self.note_evicted(evicted);
                self.complete(stamp, items)
            }
        }
    }

    /// All cameras delivered for `stamp`: decode, then match inertial.
    fn complete(&mut self, stamp: Timestamp, messages: Vec<ImageMessage>) -> Option<FrameBatch> {
        let mut images = Vec::with_capacity(messages.len());
        for (camera, message) in messages.iter().enumerate() {
            match message.decode() {
                Ok(image) => images.push(image),
                Err(e) => {
                    warn!(%stamp, camera, error = %e, "image decode failed, instant dropped");
                    self.record_miss(stamp, MissReason::DecodeFailed { camera });
                    return None;
                }
            }
        }

        if let Some(sample) = self.inertial.find_exact(stamp).copied() {
            return Some(self.emit(stamp, images, sample));
        }

        match self.miss_policy {
            MissPolicy::Drop => {
                warn!(
                    %stamp,
                    newest_inertial = ?self.inertial.newest().map(|s| s.stamp),
                    "no inertial sample with identical timestamp, instant dropped"
                );
                self.record_miss(stamp, MissReason::NoMatchingInertial);
            }
            MissPolicy::AwaitInertial => {
                debug!(%stamp, "holding image set for inertial sample");
                self.held.insert(stamp, images);
                while self.held.len() > self.held_capacity {
                    if let Some((oldest, _)) = self.held.pop_first() {
                        warn!(stamp = %oldest, "held image set expired without inertial sample");
                        self.record_miss(oldest, MissReason::NoMatchingInertial);
                    }
                }
            }
        }
        None
    }

    fn emit(&mut self, stamp: Timestamp, images: Vec<Image>, inertial: InertialSample) -> FrameBatch {
        self.stats.batches_emitted += 1;
        self.stats.last_batch = Some(stamp);
        FrameBatch {
            stamp,
            images,
            inertial,
        }
    }

    fn record_miss(&mut self, stamp: Timestamp, reason: MissReason) {
        match reason {
            MissReason::NoMatchingInertial => self.stats.inertial_misses += 1,
            MissReason::DecodeFailed { .. } => self.stats.decode_failures += 1,
        }
        observability::record_sync_miss(&reason);
        self.misses.push(SyncMiss { stamp, reason });
    }

    fn note_evicted(&mut self, evicted: usize) {
        if evicted == 0 {
            return;
        }
        debug!(evicted, "incomplete image sets discarded");
        self.stats.evicted_incomplete += evicted as u64;
        for _ in 0..evicted {
            observability::record_image_rejected("evicted");
        }
    }

    fn note_rejected(&mut self, camera: usize, stamp: Timestamp, reason: RejectReason) {
        debug!(camera, %stamp, reason = reason.label(), "image rejected");
        match reason {
            RejectReason::Stale => self.stats.stale_images += 1,
            RejectReason::Duplicate => self.stats.duplicate_images += 1,
            RejectReason::UnknownCamera => self.stats.unknown_camera_images += 1,
        }
        observability::record_image_rejected(reason.label());
    }

    /// Count a message whose payload did not match its topic's route
    pub fn note_mismatched_payload(&mut self) {
        self.stats.mismatched_payloads += 1;
        observability::record_image_rejected("mismatched");
    }

    /// End of log: held image sets can no longer be matched.
    pub fn flush(&mut self) {
        let pending = self.join.clear();
        self.stats.evicted_incomplete += pending as u64;

        let held = std::mem::take(&mut self.held);
        for stamp in held.into_keys() {
            self.record_miss(stamp, MissReason::NoMatchingInertial);
        }
    }

    pub fn camera_count(&self) -> usize {
        self.camera_count
    }

    pub fn inertial(&self) -> &InertialRingBuffer {
        &self.inertial
    }

    /// Every miss recorded so far, in order
    pub fn misses(&self) -> &[SyncMiss] {
        &self.misses
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::PixelEncoding;

    fn t(n: u64) -> Timestamp {
        Timestamp::from_nanos(n)
    }

    fn image() -> ImageMessage {
        ImageMessage {
            height: 2,
            width: 2,
            encoding: PixelEncoding::Mono8,
            data: Bytes::from_static(&[1, 2, 3, 4]),
        }
    }

    fn sync(policy: MissPolicy) -> FrameSynchronizer {
        let config = SyncConfig {
            miss_policy: policy,
            ..SyncConfig::default()
        };
        FrameSynchronizer::new(3, &config)
    }

    #[test]
    fn test_emits_when_inertial_already_buffered() {
        let mut sync = sync(MissPolicy::Drop);
        assert!(sync.on_inertial(InertialSample::at(t(5))).is_none());
        assert!(sync.on_image(0, t(5), image()).is_none());
        assert!(sync.on_image(2, t(5), image()).is_none());

        let batch = sync.on_image(1, t(5), image()).unwrap();
        assert_eq!(batch.stamp, t(5));
        assert_eq!(batch.camera_count(), 3);
        assert_eq!(batch.inertial.stamp, t(5));
        assert_eq!(sync.stats().batches_emitted, 1);
    }

    #[test]
    fn test_drop_policy_never_resurrects() {
        let mut sync = sync(MissPolicy::Drop);
        for camera in 0..3 {
            assert!(sync.on_image(camera, t(5), image()).is_none());
        }
        assert_eq!(
            sync.misses(),
            &[SyncMiss {
                stamp: t(5),
                reason: MissReason::NoMatchingInertial
            }]
        );

        assert!(sync.on_inertial(InertialSample::at(t(5))).is_none());
        assert!(sync.on_image(0, t(5), image()).is_none());
        assert_eq!(sync.stats().batches_emitted, 0);
        assert_eq!(sync.stats().stale_images, 1);
        assert_eq!(sync.stats().duplicate_images, 0);
    }

    #[test]
    fn test_rejections_counted_by_reason() {
        let mut sync = sync(MissPolicy::Drop);
        assert!(sync.on_image(0, t(6), image()).is_none());
        assert!(sync.on_image(0, t(6), image()).is_none());
        assert!(sync.on_image(7, t(6), image()).is_none());

        let stats = sync.stats();
        assert_eq!(stats.duplicate_images, 1);
        assert_eq!(stats.unknown_camera_images, 1);
        assert_eq!(stats.stale_images, 0);
    }

    #[test]
    fn test_await_policy_emits_on_late_inertial() {
        let mut sync = sync(MissPolicy::AwaitInertial);
        for camera in 0..3 {
            assert!(sync.on_image(camera, t(5), image()).is_none());
        }
        assert!(sync.misses().is_empty());

        assert!(sync.on_inertial(InertialSample::at(t(4))).is_none());
        let batch = sync.on_inertial(InertialSample::at(t(5))).unwrap();
        assert_eq!(batch.stamp, t(5));
        assert_eq!(batch.images.len(), 3);

        // second sample at the same stamp does not emit again
        assert!(sync.on_inertial(InertialSample::at(t(5))).is_none());
    }

    #[test]
    fn test_await_policy_flush_records_misses() {
        let mut sync = sync(MissPolicy::AwaitInertial);
        for camera in 0..3 {
            sync.on_image(camera, t(7), image());
        }
        sync.flush();
        assert_eq!(sync.stats().inertial_misses, 1);
    }

    #[test]
    fn test_decode_failure_drops_instant() {
        let mut sync = sync(MissPolicy::Drop);
        sync.on_inertial(InertialSample::at(t(5)));
        sync.on_image(0, t(5), image());
        sync.on_image(
            1,
            t(5),
            ImageMessage {
                data: Bytes::new(),
                ..image()
            },
        );
        assert!(sync.on_image(2, t(5), image()).is_none());
        assert_eq!(
            sync.misses()[0].reason,
            MissReason::DecodeFailed { camera: 1 }
        );
        assert_eq!(sync.stats().total_misses(), 1);
    }

    #[test]
    fn test_near_miss_is_not_a_match() {
        let mut sync = sync(MissPolicy::Drop);
        sync.on_inertial(InertialSample::at(Timestamp::from_secs_f64(6.9)));
        for camera in 0..3 {
            assert!(sync.on_image(camera, Timestamp::from_secs_f64(7.0), image()).is_none());
        }
        assert_eq!(sync.stats().inertial_misses, 1);
    }
}
