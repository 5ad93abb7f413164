//! # Integration Tests
//!
//! Cross-crate end-to-end scenarios.
//!
//! Covers:
//! - Rig discovery and pose re-anchoring
//! - Exact-time synchronization, including the miss policies
//! - Replay of on-disk logs through the driver, with cancellation

#[cfg(test)]
mod fixtures {
    use bytes::Bytes;
    use contracts::{
        CameraGroupSpec, CameraInfo, GlobalPose, ImageMessage, InertialSample, IntrinsicModel,
        LogMessage, MessagePayload, PixelEncoding, Quaternion, RigDeclaration, SessionConfig,
        Timestamp, Vector3,
    };

    pub fn secs(s: f64) -> Timestamp {
        Timestamp::from_secs_f64(s)
    }

    /// cams 0,1 stereo; cam 2 mono; inertial topic `imu`
    pub fn stereo_mono_config() -> SessionConfig {
        SessionConfig::for_rig(RigDeclaration::new(
            vec![
                CameraGroupSpec::stereo("cam0", "cam1"),
                CameraGroupSpec::mono("cam2"),
            ],
            "imu",
        ))
    }

    pub fn calibration(ns: &str, position: Vector3, orientation: Quaternion) -> LogMessage {
        LogMessage::new(
            format!("{ns}/camera_info"),
            Timestamp::from_nanos(0),
            MessagePayload::CameraInfo(CameraInfo {
                camera_name: ns.to_string(),
                intrinsics: IntrinsicModel {
                    model_type: "MEI".into(),
                    image_width: 4,
                    image_height: 2,
                    parameters: vec![0.9, 0.0, 0.0, 0.0, 0.0, 400.0, 400.0, 2.0, 1.0],
                },
                pose: GlobalPose {
                    position,
                    orientation,
                },
            }),
        )
    }

    pub fn identity_calibration(ns: &str) -> LogMessage {
        calibration(ns, Vector3::new(0.0, 0.0, 0.0), Quaternion::IDENTITY)
    }

    pub fn image(ns: &str, stamp: Timestamp) -> LogMessage {
        LogMessage::new(
            format!("{ns}/image_raw"),
            stamp,
            MessagePayload::Image(ImageMessage {
                height: 2,
                width: 4,
                encoding: PixelEncoding::Mono8,
                data: Bytes::from(vec![128u8; 8]),
            }),
        )
    }

    pub fn imu(stamp: Timestamp) -> LogMessage {
        LogMessage::new("imu", stamp, MessagePayload::Imu(InertialSample::at(stamp)))
    }

    /// Calibration for all three cameras of [`stereo_mono_config`]
    pub fn resolve_all() -> Vec<LogMessage> {
        vec![
            identity_calibration("cam0"),
            calibration("cam1", Vector3::new(1.0, 0.0, 0.0), Quaternion::IDENTITY),
            identity_calibration("cam2"),
        ]
    }
}

#[cfg(test)]
mod scenario_tests {
    use contracts::{CameraRole, MissPolicy, MissReason, Quaternion, Vector3};
    use sync_engine::mock::RecordingEngine;
    use sync_engine::{CalibrationSession, MessageOutcome, SessionState};

    use crate::fixtures::*;

    /// Calibration arrives in order 2, 0, 1; poses re-anchored per group
    #[test]
    fn test_scenario_a_rig_discovery() {
        let mut session = CalibrationSession::new(stereo_mono_config(), RecordingEngine::default());

        let cam2 = identity_calibration("cam2");
        let cam0 = identity_calibration("cam0");
        let cam1 = calibration("cam1", Vector3::new(1.0, 0.0, 0.0), Quaternion::IDENTITY);

        assert_eq!(
            session.handle(cam2).unwrap(),
            MessageOutcome::CameraResolved { camera: 2 }
        );
        assert_eq!(
            session.handle(cam0).unwrap(),
            MessageOutcome::CameraResolved { camera: 0 }
        );
        assert_eq!(session.state(), SessionState::AwaitingTopology);
        assert_eq!(session.handle(cam1).unwrap(), MessageOutcome::TopologyResolved);
        assert_eq!(session.state(), SessionState::Streaming);

        let rig = session.rig().unwrap();
        assert_eq!(rig.len(), 3);

        let roles: Vec<CameraRole> = rig.cameras().iter().map(|c| c.role).collect();
        assert_eq!(
            roles,
            vec![CameraRole::StereoLeft, CameraRole::StereoRight, CameraRole::Mono]
        );

        let p0 = rig.pose(0).unwrap();
        let p1 = rig.pose(1).unwrap();
        let p2 = rig.pose(2).unwrap();
        assert!(p0.translation.vector.norm() < 1e-12);
        assert!(p0.rotation.angle() < 1e-12);
        assert!((p1.translation.vector.x - 1.0).abs() < 1e-12);
        assert!(p1.translation.vector.y.abs() < 1e-12);
        assert!(p1.translation.vector.z.abs() < 1e-12);
        assert!(p1.rotation.angle() < 1e-12);
        assert!(p2.translation.vector.norm() < 1e-12);

        let engine = session.engine();
        assert!(engine.initialized.is_some());
    }

    /// Images at t=5, then inertial at t=5: one batch with 3 images
    #[test]
    fn test_scenario_b_late_inertial_with_await_policy() {
        let mut config = stereo_mono_config();
        config.sync.miss_policy = MissPolicy::AwaitInertial;
        let mut session = CalibrationSession::new(config, RecordingEngine::default());
        for message in resolve_all() {
            session.handle(message).unwrap();
        }

        let t5 = secs(5.0);
        for ns in ["cam0", "cam1", "cam2"] {
            assert_eq!(session.handle(image(ns, t5)).unwrap(), MessageOutcome::Buffered);
        }
        assert_eq!(
            session.handle(imu(t5)).unwrap(),
            MessageOutcome::BatchEmitted { stamp: t5 }
        );
        session.end_of_log().unwrap();

        let engine = session.engine();
        assert_eq!(engine.batches.len(), 1);
        let batch = &engine.batches[0];
        assert_eq!(batch.stamp, t5);
        assert_eq!(batch.images.len(), 3);
        assert_eq!(batch.inertial.stamp, t5);
        assert!(session.misses().is_empty());
    }

    /// Same arrival order under the default policy never emits t=5
    #[test]
    fn test_late_inertial_never_resurrects_dropped_instant() {
        let mut session = CalibrationSession::new(stereo_mono_config(), RecordingEngine::default());
        for message in resolve_all() {
            session.handle(message).unwrap();
        }

        let t5 = secs(5.0);
        for ns in ["cam0", "cam1", "cam2"] {
            session.handle(image(ns, t5)).unwrap();
        }
        assert_eq!(session.handle(imu(t5)).unwrap(), MessageOutcome::Buffered);
        // A second image set at the same stamp is stale.
        for ns in ["cam0", "cam1", "cam2"] {
            assert_eq!(session.handle(image(ns, t5)).unwrap(), MessageOutcome::Buffered);
        }
        session.end_of_log().unwrap();

        assert!(session.engine().batches.is_empty());
        assert_eq!(session.misses().len(), 1);
        assert_eq!(session.misses()[0].reason, MissReason::NoMatchingInertial);
        assert_eq!(session.stats().stale_images, 3);
    }

    /// Nearest inertial sample is 6.9 for images at 7: no batch, one miss
    #[test]
    fn test_scenario_c_no_exact_inertial_match() {
        let mut session = CalibrationSession::new(stereo_mono_config(), RecordingEngine::default());
        for message in resolve_all() {
            session.handle(message).unwrap();
        }

        session.handle(imu(secs(6.9))).unwrap();
        let t7 = secs(7.0);
        for ns in ["cam2", "cam0", "cam1"] {
            session.handle(image(ns, t7)).unwrap();
        }
        session.end_of_log().unwrap();

        assert!(session.engine().batches.is_empty());
        let misses = session.misses();
        assert_eq!(misses.len(), 1);
        assert_eq!(misses[0].stamp, t7);
        assert_eq!(misses[0].reason, MissReason::NoMatchingInertial);

        let summary = session.summary();
        assert_eq!(summary.total_misses, 1);
        assert_eq!(summary.total_batches, 0);
    }

    /// Images and inertial at the same stamp in any order produce one batch each
    #[test]
    fn test_order_independence_at_same_timestamp() {
        let mut session = CalibrationSession::new(stereo_mono_config(), RecordingEngine::default());
        for message in resolve_all() {
            session.handle(message).unwrap();
        }

        let t1 = secs(1.0);
        let t2 = secs(2.0);
        session.handle(imu(t1)).unwrap();
        session.handle(image("cam1", t1)).unwrap();
        session.handle(image("cam2", t1)).unwrap();
        session.handle(image("cam0", t1)).unwrap();

        session.handle(image("cam2", t2)).unwrap();
        session.handle(imu(t2)).unwrap();
        session.handle(image("cam0", t2)).unwrap();
        session.handle(image("cam1", t2)).unwrap();

        assert_eq!(
            session.engine().batch_stamps(),
            vec![t1.as_nanos(), t2.as_nanos()]
        );
        let stats = session.stats();
        assert_eq!(stats.batches_emitted, 2);
        assert_eq!(stats.total_misses(), 0);
    }

    /// Undecodable image abandons the instant
    #[test]
    fn test_decode_failure_abandons_instant() {
        use bytes::Bytes;
        use contracts::{ImageMessage, LogMessage, MessagePayload, PixelEncoding};

        let mut session = CalibrationSession::new(stereo_mono_config(), RecordingEngine::default());
        for message in resolve_all() {
            session.handle(message).unwrap();
        }

        let t3 = secs(3.0);
        session.handle(imu(t3)).unwrap();
        session.handle(image("cam0", t3)).unwrap();
        session
            .handle(LogMessage::new(
                "cam1/image_raw",
                t3,
                MessagePayload::Image(ImageMessage {
                    height: 2,
                    width: 4,
                    encoding: PixelEncoding::Rgb8,
                    data: Bytes::from_static(&[0, 1, 2]),
                }),
            ))
            .unwrap();
        session.handle(image("cam2", t3)).unwrap();

        assert!(session.engine().batches.is_empty());
        assert_eq!(
            session.misses()[0].reason,
            MissReason::DecodeFailed { camera: 1 }
        );
    }
}

#[cfg(test)]
mod property_tests {
    use contracts::{ContractError, InertialSample, MessagePayload, Quaternion, Timestamp, Vector3};
    use sync_engine::mock::RecordingEngine;
    use sync_engine::{CalibrationSession, InertialRingBuffer, MessageOutcome, SessionState};

    use crate::fixtures::*;

    #[test]
    fn test_ring_buffer_keeps_last_fifty() {
        let mut buffer = InertialRingBuffer::default();
        for n in 1..=60u64 {
            buffer.push(InertialSample::at(Timestamp::from_nanos(n)));
            assert!(buffer.len() <= 50);
        }
        let stamps: Vec<u64> = buffer.iter().map(|s| s.stamp.as_nanos()).collect();
        assert_eq!(stamps, (11..=60).collect::<Vec<_>>());
        assert!(buffer.find_exact(Timestamp::from_nanos(10)).is_none());
        assert!(buffer.find_exact(Timestamp::from_nanos(11)).is_some());
    }

    /// Streaming is entered only once every declared camera is resolved
    #[test]
    fn test_discovery_needs_every_camera() {
        let mut session = CalibrationSession::new(stereo_mono_config(), RecordingEngine::default());

        session.handle(identity_calibration("cam0")).unwrap();
        // Duplicate for an already-resolved camera is ignored.
        assert_eq!(
            session
                .handle(calibration("cam0", Vector3::new(9.0, 9.0, 9.0), Quaternion::IDENTITY))
                .unwrap(),
            MessageOutcome::Ignored
        );
        session.handle(identity_calibration("cam2")).unwrap();
        // Images and inertial before resolution do nothing.
        session.handle(image("cam0", secs(1.0))).unwrap();
        session.handle(imu(secs(1.0))).unwrap();
        assert_eq!(session.state(), SessionState::AwaitingTopology);
        assert_eq!(session.missing_topics(), vec!["cam1/camera_info"]);

        session
            .handle(calibration("cam1", Vector3::new(0.2, 0.0, 0.0), Quaternion::IDENTITY))
            .unwrap();
        assert_eq!(session.state(), SessionState::Streaming);
        assert!(session.missing_topics().is_empty());
    }

    /// Identical global poses in a stereo pair yield identity, not an error
    #[test]
    fn test_degenerate_stereo_pair_accepted() {
        let mut session = CalibrationSession::new(stereo_mono_config(), RecordingEngine::default());
        let rotated = Quaternion {
            w: 0.5f64.sqrt(),
            x: 0.0,
            y: 0.0,
            z: 0.5f64.sqrt(),
        };
        let position = Vector3::new(3.0, -2.0, 1.0);
        session.handle(calibration("cam0", position, rotated)).unwrap();
        session.handle(calibration("cam1", position, rotated)).unwrap();
        session.handle(calibration("cam2", position, rotated)).unwrap();

        let rig = session.rig().unwrap();
        for index in 0..3 {
            let pose = rig.pose(index).unwrap();
            assert!(pose.translation.vector.norm() < 1e-9);
            assert!(pose.rotation.angle() < 1e-9);
        }
    }

    /// Right pose is inverse(left) * right for a non-trivial left pose
    #[test]
    fn test_relative_pose_of_rotated_pair() {
        let mut session = CalibrationSession::new(stereo_mono_config(), RecordingEngine::default());
        // Left: rotated 90 degrees about z, at (1,0,0). Right: same rotation, at (1,1,0).
        let yaw90 = Quaternion {
            w: 0.5f64.sqrt(),
            x: 0.0,
            y: 0.0,
            z: 0.5f64.sqrt(),
        };
        session
            .handle(calibration("cam0", Vector3::new(1.0, 0.0, 0.0), yaw90))
            .unwrap();
        session
            .handle(calibration("cam1", Vector3::new(1.0, 1.0, 0.0), yaw90))
            .unwrap();
        session.handle(identity_calibration("cam2")).unwrap();

        // In the left camera's frame the offset (0,1,0) becomes (1,0,0).
        let pose = session.rig().unwrap().pose(1).unwrap();
        assert!((pose.translation.vector.x - 1.0).abs() < 1e-9);
        assert!(pose.translation.vector.y.abs() < 1e-9);
        assert!(pose.rotation.angle() < 1e-9);
    }

    #[test]
    fn test_malformed_calibration_is_fatal() {
        let mut session = CalibrationSession::new(stereo_mono_config(), RecordingEngine::default());
        let mut bad = identity_calibration("cam1");
        if let MessagePayload::CameraInfo(info) = &mut bad.payload {
            info.intrinsics.parameters.truncate(3);
        }

        let err = session.handle(bad).unwrap_err();
        match err {
            ContractError::TopologyResolution { camera, topic, .. } => {
                assert_eq!(camera, 1);
                assert_eq!(topic, "cam1/camera_info");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}

#[cfg(test)]
mod replay_tests {
    use contracts::{ContractError, LogMessage, LogSource};
    use replay::{JsonlLog, LogWriter, MonitorChannel, ReplayDriver, RunOutcome, ShutdownFlag};
    use sync_engine::mock::RecordingEngine;
    use sync_engine::CalibrationSession;

    use crate::fixtures::*;

    fn recorded_log() -> Vec<LogMessage> {
        let mut messages = vec![image("cam0", secs(0.5)), imu(secs(0.5))];
        messages.extend(resolve_all());
        for n in 1..=4 {
            let t = secs(n as f64);
            messages.push(imu(t));
            messages.push(image("cam0", t));
            messages.push(image("cam1", t));
            messages.push(image("cam2", t));
        }
        // Unrelated topic, filtered by the reader
        messages.push(LogMessage::new(
            "other/imu",
            secs(5.0),
            contracts::MessagePayload::Imu(contracts::InertialSample::at(secs(5.0))),
        ));
        messages
    }

    fn write_log(dir: &std::path::Path, messages: &[LogMessage]) {
        let mut writer = LogWriter::create(dir).unwrap();
        writer.write_messages(messages).unwrap();
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn test_jsonl_replay_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        write_log(dir.path(), &recorded_log());

        let config = stereo_mono_config();
        let topics = config.rig.topics(&config.topics);
        let log = JsonlLog::open(dir.path()).unwrap().with_topic_filter(topics);

        let (monitor, monitor_rx) = MonitorChannel::bounded(4);
        let mut driver = ReplayDriver::new(log, ShutdownFlag::new()).with_monitor(monitor);
        let mut session = CalibrationSession::new(config, RecordingEngine::default());

        let outcome = driver.run(&mut session).unwrap();
        let RunOutcome::Completed { report, poses } = outcome else {
            panic!("replay should complete");
        };

        assert_eq!(report.messages_read, 21);
        assert_eq!(report.stats.batches_emitted, 4);
        assert_eq!(report.summary.total_batches, 4);
        assert_eq!(report.images_monitored, 1);
        assert_eq!(poses.len(), 3);
        assert!((poses[1].pose.position.x - 1.0).abs() < 1e-9);

        let log = driver.into_log();
        assert_eq!(log.stats().filtered, 1);
        assert_eq!(log.stats().invalid, 0);

        let frame = monitor_rx.recv().await.unwrap();
        assert_eq!(frame.topic, "cam0/image_raw");
        assert_eq!(frame.stamp, secs(0.5));

        let engine = session.into_engine();
        assert_eq!(engine.finalize_calls, 1);
        assert_eq!(engine.batches.len(), 4);
        assert!(engine.batches.iter().all(|b| b.images.len() == 3));
    }

    /// Cancellation observed between messages: no further reads, no finalize
    #[test]
    fn test_cancellation_mid_log() {
        struct CancellingLog {
            inner: JsonlLog,
            reads: usize,
            cancel_at: usize,
            shutdown: ShutdownFlag,
        }

        impl LogSource for CancellingLog {
            fn next_message(&mut self) -> Result<Option<LogMessage>, ContractError> {
                self.reads += 1;
                let message = self.inner.next_message()?;
                if self.reads == self.cancel_at {
                    self.shutdown.request();
                }
                Ok(message)
            }

            fn close(&mut self) {
                self.inner.close();
            }
        }

        let dir = tempfile::tempdir().unwrap();
        write_log(dir.path(), &recorded_log());

        let shutdown = ShutdownFlag::new();
        // Message 9 completes the batch at t=1; the flag goes up while reading message 10.
        let log = CancellingLog {
            inner: JsonlLog::open(dir.path()).unwrap(),
            reads: 0,
            cancel_at: 10,
            shutdown: shutdown.clone(),
        };
        let mut driver = ReplayDriver::new(log, shutdown);
        let mut session = CalibrationSession::new(stereo_mono_config(), RecordingEngine::default());

        let outcome = driver.run(&mut session).unwrap();
        assert!(outcome.is_cancelled());
        assert_eq!(driver.log().reads, 10);
        assert_eq!(outcome.report().messages_read, 10);

        let engine = session.engine();
        assert_eq!(engine.batch_stamps(), vec![secs(1.0).as_nanos()]);
        assert_eq!(engine.finalize_calls, 0);

        // The reader is closed.
        let mut log = driver.into_log();
        assert!(log.inner.next_message().unwrap().is_none());
    }

    #[test]
    fn test_log_without_all_calibration_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_log(
            dir.path(),
            &[identity_calibration("cam0"), image("cam0", secs(1.0)), imu(secs(1.0))],
        );

        let mut driver = ReplayDriver::new(JsonlLog::open(dir.path()).unwrap(), ShutdownFlag::new());
        let mut session = CalibrationSession::new(stereo_mono_config(), RecordingEngine::default());

        match driver.run(&mut session).unwrap_err() {
            ContractError::TopologyIncomplete { missing } => {
                assert_eq!(missing, vec!["cam1/camera_info", "cam2/camera_info"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(session.engine().finalize_calls, 0);
    }

    /// A bad first calibration record aborts the run even when a good one follows
    #[test]
    fn test_malformed_calibration_record_on_disk_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut messages = resolve_all();
        messages.push(image("cam0", secs(1.0)));
        write_log(dir.path(), &messages);

        let path = dir.path().join(replay::MESSAGES_FILE);
        let mut lines: Vec<String> = std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        lines.insert(
            1,
            r#"{"kind":"camera_info","topic":"cam1/camera_info","stamp_ns":0,"camera_name":"cam1","model_type":"mei","image_width":4,"image_height":2,"parameters":"oops","position":{"x":0.0,"y":0.0,"z":0.0}}"#
                .to_string(),
        );
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();

        let config = stereo_mono_config();
        let topics = config.rig.topics(&config.topics);
        let log = JsonlLog::open(dir.path()).unwrap().with_topic_filter(topics);
        let mut driver = ReplayDriver::new(log, ShutdownFlag::new());
        let mut session = CalibrationSession::new(config, RecordingEngine::default());

        match driver.run(&mut session).unwrap_err() {
            ContractError::TopologyResolution { camera, topic, message } => {
                assert_eq!(camera, 1);
                assert_eq!(topic, "cam1/camera_info");
                assert!(message.contains("line 2"), "got: {message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(session.rig().is_none());
        assert!(session.engine().initialized.is_none());
        assert_eq!(driver.log().stats().invalid, 1);
    }

    #[test]
    fn test_missing_log_is_log_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonlLog::open(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, ContractError::LogOpen { .. }));
    }
}

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{CameraGroupSpec, ContractError};
    use sync_engine::mock::RecordingEngine;
    use sync_engine::CalibrationSession;

    /// Text declaration drives a session with the declared camera order
    #[test]
    fn test_declaration_text_to_session() {
        let config = ConfigLoader::load_from_str(
            "STEREO front_l front_r\n\nmono rear\nimu /imu/data\n",
            ConfigFormat::Topology,
        )
        .unwrap();
        assert_eq!(
            config.rig.groups,
            vec![
                CameraGroupSpec::stereo("front_l", "front_r"),
                CameraGroupSpec::mono("rear"),
            ]
        );

        let session = CalibrationSession::new(config, RecordingEngine::default());
        let router = session.router();
        assert_eq!(router.camera_count(), 3);
        assert_eq!(session.route("rear/image_raw").and_then(|r| r.camera()), Some(2));
        assert!(session.route("/imu/data").is_some());
        assert!(session.route("rear/compressed").is_none());
    }

    #[test]
    fn test_duplicate_topics_rejected() {
        let err = ConfigLoader::load_from_str("stereo cam0 cam0\nimu imu\n", ConfigFormat::Topology)
            .unwrap_err();
        assert!(err.is_config());
        assert!(matches!(err, ContractError::ConfigValidation { .. }));
    }
}
