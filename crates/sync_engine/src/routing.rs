//! Topic to handler mapping, built once from the rig declaration.

use std::collections::HashMap;

use contracts::{DeclaredCamera, RigDeclaration, Topic, TopicNaming};

/// Handler a topic is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// One-time calibration message for camera `i`
    Calibration(usize),
    /// Image stream of camera `i`
    Image(usize),
    /// Inertial stream
    Inertial,
}

impl Route {
    pub fn camera(self) -> Option<usize> {
        match self {
            Self::Calibration(i) | Self::Image(i) => Some(i),
            Self::Inertial => None,
        }
    }
}

/// O(1) topic dispatch table
#[derive(Debug, Clone)]
pub struct TopicRouter {
    routes: HashMap<Topic, Route>,
    cameras: Vec<DeclaredCamera>,
    imu_topic: Topic,
}

impl TopicRouter {
    pub fn new(declaration: &RigDeclaration, naming: &TopicNaming) -> Self {
        let cameras = declaration.cameras(naming);
        let mut routes = HashMap::with_capacity(cameras.len() * 2 + 1);
        for camera in &cameras {
            routes.insert(camera.info_topic.clone(), Route::Calibration(camera.index));
            routes.insert(camera.image_topic.clone(), Route::Image(camera.index));
        }
        routes.insert(declaration.imu_topic.clone(), Route::Inertial);

        Self {
            routes,
            cameras,
            imu_topic: declaration.imu_topic.clone(),
        }
    }

    /// Route for `topic`; `None` means the topic is not consumed.
    #[inline]
    pub fn route(&self, topic: &str) -> Option<Route> {
        self.routes.get(topic).copied()
    }

    /// Declared cameras in index order
    pub fn cameras(&self) -> &[DeclaredCamera] {
        &self.cameras
    }

    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    pub fn imu_topic(&self) -> &Topic {
        &self.imu_topic
    }

    /// Every consumed topic, sorted
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self.routes.keys().cloned().collect();
        topics.sort();
        topics
    }
}
