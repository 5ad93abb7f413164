//! Topology discovery: collects the first calibration message of every
//! declared camera, then hands them to the [`RigTopologyBuilder`].

use tracing::{debug, info, instrument};

use contracts::{ContractError, LogMessage, MessagePayload, RigTopology, Topic};

use crate::rig::{DiscoveredCamera, RigTopologyBuilder};

/// What happened to one calibration message
#[derive(Debug)]
pub enum DiscoveryStep {
    /// Camera resolved; `remaining` cameras still unresolved
    Accepted { camera: usize, remaining: usize },
    /// Camera was already resolved; message ignored
    Duplicate { camera: usize },
    /// Last camera resolved and the rig was built
    Resolved(RigTopology),
}

/// Per-camera resolution tracker
#[derive(Debug)]
pub struct TopologyDiscovery {
    builder: RigTopologyBuilder,
    slots: Vec<Option<DiscoveredCamera>>,
    resolved: usize,
}

impl TopologyDiscovery {
    pub fn new(builder: RigTopologyBuilder) -> Self {
        let slots = vec![None; builder.declared().len()];
        Self {
            builder,
            slots,
            resolved: 0,
        }
    }

    /// Offer a message routed to the calibration topic of `camera`.
    ///
    /// # Errors
    /// `TopologyResolution` if the message cannot describe a camera.
    #[instrument(
        name = "topology_discovery_offer",
        level = "debug",
        skip(self, message),
        fields(topic = %message.topic)
    )]
    pub fn offer(&mut self, camera: usize, message: &LogMessage) -> Result<DiscoveryStep, ContractError> {
        let Some(declared) = self.builder.declared().get(camera) else {
            return Err(ContractError::topology_resolution(
                camera,
                message.topic.clone(),
                "camera index outside the declared rig",
            ));
        };

        if self.slots[camera].is_some() {
            debug!(camera, "duplicate calibration message ignored");
            return Ok(DiscoveryStep::Duplicate { camera });
        }

        let info = match &message.payload {
            MessagePayload::CameraInfo(info) => info,
            MessagePayload::Malformed(record) => {
                return Err(ContractError::topology_resolution(
                    camera,
                    declared.info_topic.clone(),
                    format!("malformed calibration record on line {}: {}", record.line, record.reason),
                ));
            }
            other => {
                return Err(ContractError::topology_resolution(
                    camera,
                    declared.info_topic.clone(),
                    format!("expected camera_info payload, got {}", other.kind()),
                ));
            }
        };

        let discovered = DiscoveredCamera::from_info(declared, info)?;
        info!(
            camera,
            camera_name = %discovered.camera_name,
            model = %discovered.model,
            "camera calibration accepted"
        );
        self.slots[camera] = Some(discovered);
        self.resolved += 1;

        let remaining = self.remaining();
        if remaining > 0 {
            return Ok(DiscoveryStep::Accepted { camera, remaining });
        }

        let cameras = self.slots.iter_mut().filter_map(Option::take).collect();
        let rig = self.builder.build(cameras)?;
        Ok(DiscoveryStep::Resolved(rig))
    }

    pub fn remaining(&self) -> usize {
        self.slots.len() - self.resolved
    }

    pub fn is_resolved(&self, camera: usize) -> bool {
        self.slots.get(camera).is_some_and(Option::is_some)
    }

    /// Calibration topics still waiting for their first message
    pub fn missing_topics(&self) -> Vec<Topic> {
        self.slots
            .iter()
            .zip(self.builder.declared())
            .filter(|(slot, _)| slot.is_none())
            .map(|(_, declared)| declared.info_topic.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        CameraGroupSpec, CameraInfo, GlobalPose, ImageMessage, IntrinsicModel, MalformedRecord,
        PixelEncoding, Quaternion, RigDeclaration, Timestamp, TopicNaming, Vector3,
    };

    fn discovery() -> TopologyDiscovery {
        let declaration = RigDeclaration::new(
            vec![
                CameraGroupSpec::stereo("cam0", "cam1"),
                CameraGroupSpec::mono("cam2"),
            ],
            "imu",
        );
        let declared = declaration.cameras(&TopicNaming::default());
        TopologyDiscovery::new(RigTopologyBuilder::new(&declaration, declared))
    }

    fn info_message(camera: usize, x: f64) -> LogMessage {
        LogMessage::new(
            format!("cam{camera}/camera_info"),
            Timestamp::from_nanos(1),
            MessagePayload::CameraInfo(CameraInfo {
                camera_name: format!("cam{camera}"),
                intrinsics: IntrinsicModel {
                    model_type: "kannala_brandt".into(),
                    image_width: 1280,
                    image_height: 720,
                    parameters: vec![0.0, 0.0, 0.0, 0.0, 500.0, 500.0, 640.0, 360.0],
                },
                pose: GlobalPose {
                    position: Vector3::new(x, 0.0, 0.0),
                    orientation: Quaternion::IDENTITY,
                },
            }),
        )
    }

    #[test]
    fn test_resolves_only_after_every_camera() {
        let mut discovery = discovery();
        assert!(matches!(
            discovery.offer(2, &info_message(2, 0.0)).unwrap(),
            DiscoveryStep::Accepted { camera: 2, remaining: 2 }
        ));
        assert!(matches!(
            discovery.offer(0, &info_message(0, 0.0)).unwrap(),
            DiscoveryStep::Accepted { remaining: 1, .. }
        ));
        assert_eq!(discovery.missing_topics(), vec![Topic::from("cam1/camera_info")]);

        match discovery.offer(1, &info_message(1, 1.0)).unwrap() {
            DiscoveryStep::Resolved(rig) => {
                assert_eq!(rig.len(), 3);
                let t = rig.pose(1).unwrap().translation.vector;
                assert!((t.x - 1.0).abs() < 1e-12);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_first_calibration_wins() {
        let mut discovery = discovery();
        discovery.offer(0, &info_message(0, 0.0)).unwrap();
        assert!(matches!(
            discovery.offer(0, &info_message(0, 9.0)).unwrap(),
            DiscoveryStep::Duplicate { camera: 0 }
        ));
        assert_eq!(discovery.remaining(), 2);
        assert!(discovery.is_resolved(0));
    }

    #[test]
    fn test_wrong_payload_is_fatal() {
        let mut discovery = discovery();
        let message = LogMessage::new(
            "cam1/camera_info",
            Timestamp::from_nanos(1),
            MessagePayload::Image(ImageMessage {
                height: 1,
                width: 1,
                encoding: PixelEncoding::Mono8,
                data: vec![0u8].into(),
            }),
        );
        let err = discovery.offer(1, &message).unwrap_err();
        assert!(matches!(err, ContractError::TopologyResolution { camera: 1, .. }));
    }

    #[test]
    fn test_malformed_first_calibration_is_fatal() {
        let mut discovery = discovery();
        let bad = LogMessage::new(
            "cam1/camera_info",
            Timestamp::from_nanos(0),
            MessagePayload::Malformed(MalformedRecord {
                line: 2,
                reason: "invalid type: string \"oops\", expected a sequence".into(),
            }),
        );
        let err = discovery.offer(1, &bad).unwrap_err();
        match err {
            ContractError::TopologyResolution { camera, topic, message } => {
                assert_eq!(camera, 1);
                assert_eq!(topic, "cam1/camera_info");
                assert!(message.contains("line 2"), "got: {message}");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!discovery.is_resolved(1));
    }

    #[test]
    fn test_malformed_after_resolution_is_ignored() {
        let mut discovery = discovery();
        discovery.offer(0, &info_message(0, 0.0)).unwrap();
        let late = LogMessage::new(
            "cam0/camera_info",
            Timestamp::from_nanos(3),
            MessagePayload::Malformed(MalformedRecord {
                line: 7,
                reason: "missing field `orientation`".into(),
            }),
        );
        assert!(matches!(
            discovery.offer(0, &late).unwrap(),
            DiscoveryStep::Duplicate { camera: 0 }
        ));
    }
}
