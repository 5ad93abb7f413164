//! Configuration validation
//!
//! Rules:
//! - at least one stereo group
//! - inertial topic and camera namespaces are non-empty
//! - every derived topic is unique
//! - image and calibration suffixes differ
//! - buffer capacities > 0

use contracts::{ContractError, SessionConfig};

/// Validate a SessionConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &SessionConfig) -> Result<(), ContractError> {
    validate_groups(config)?;
    validate_topic_names(config)?;
    validate_suffixes(config)?;
    validate_unique_topics(config)?;
    validate_capacities(config)?;
    Ok(())
}

fn validate_groups(config: &SessionConfig) -> Result<(), ContractError> {
    if config.rig.stereo_count() == 0 {
        return Err(ContractError::config_validation(
            "rig.groups",
            "at least one stereo group is required",
        ));
    }
    Ok(())
}

fn validate_topic_names(config: &SessionConfig) -> Result<(), ContractError> {
    if config.rig.imu_topic.trim().is_empty() {
        return Err(ContractError::config_validation(
            "rig.imu_topic",
            "inertial topic cannot be empty",
        ));
    }

    for (idx, group) in config.rig.groups.iter().enumerate() {
        if group.namespaces().iter().any(|ns| ns.trim().is_empty()) {
            return Err(ContractError::config_validation(
                format!("rig.groups[{idx}]"),
                "camera topic cannot be empty",
            ));
        }
    }
    Ok(())
}

fn validate_suffixes(config: &SessionConfig) -> Result<(), ContractError> {
    if config.topics.image_suffix == config.topics.info_suffix {
        return Err(ContractError::config_validation(
            "topics.image_suffix / topics.info_suffix",
            format!(
                "image and calibration suffixes must differ, both are '{}'",
                config.topics.image_suffix
            ),
        ));
    }
    Ok(())
}

/// Camera image/info topics and the inertial topic must not collide
fn validate_unique_topics(config: &SessionConfig) -> Result<(), ContractError> {
    match config.rig.duplicate_topic(&config.topics) {
        Some(topic) => Err(ContractError::config_validation(
            format!("rig[topic={topic}]"),
            "duplicate topic",
        )),
        None => Ok(()),
    }
}

fn validate_capacities(config: &SessionConfig) -> Result<(), ContractError> {
    let checks = [
        ("sync.imu_buffer_capacity", config.sync.imu_buffer_capacity),
        ("sync.join_queue_size", config.sync.join_queue_size),
        ("replay.monitor_capacity", config.replay.monitor_capacity),
    ];
    for (field, value) in checks {
        if value == 0 {
            return Err(ContractError::config_validation(
                field,
                format!("{field} must be > 0"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{CameraGroupSpec, RigDeclaration};

    fn minimal_config() -> SessionConfig {
        SessionConfig::for_rig(RigDeclaration::new(
            vec![
                CameraGroupSpec::stereo("cam0", "cam1"),
                CameraGroupSpec::mono("cam2"),
            ],
            "imu0",
        ))
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&minimal_config()).is_ok());
    }

    #[test]
    fn test_no_stereo_group() {
        let mut config = minimal_config();
        config.rig.groups.remove(0);
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("stereo group"), "got: {err}");
    }

    #[test]
    fn test_empty_imu_topic() {
        let mut config = minimal_config();
        config.rig.imu_topic = "".into();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("rig.imu_topic"), "got: {err}");
    }

    #[test]
    fn test_duplicate_camera_topic() {
        let mut config = minimal_config();
        config.rig.groups.push(CameraGroupSpec::mono("cam0"));
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("duplicate topic"), "got: {err}");
    }

    #[test]
    fn test_imu_collides_with_camera_topic() {
        let mut config = minimal_config();
        config.rig.imu_topic = "cam2/image_raw".into();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("duplicate topic"), "got: {err}");
    }

    #[test]
    fn test_identical_suffixes() {
        let mut config = minimal_config();
        config.topics.info_suffix = config.topics.image_suffix.clone();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("must differ"), "got: {err}");
    }

    #[test]
    fn test_zero_capacity() {
        let mut config = minimal_config();
        config.sync.imu_buffer_capacity = 0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("imu_buffer_capacity"), "got: {err}");
    }
}
