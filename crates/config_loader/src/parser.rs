//! Configuration parsing
//!
//! Supports TOML (primary), JSON, and the line-oriented topology text format.

use contracts::{CameraGroupSpec, ContractError, RigDeclaration, SessionConfig, Topic};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    /// JSON
    Json,
    /// Line-oriented topology declaration (`stereo l r` / `mono t` / `imu t`)
    Topology,
}

impl ConfigFormat {
    /// Infer format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            "cfg" | "txt" => Some(Self::Topology),
            _ => None,
        }
    }
}

/// Parse TOML session configuration
pub fn parse_toml(content: &str) -> Result<SessionConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse JSON session configuration
pub fn parse_json(content: &str) -> Result<SessionConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse a topology declaration; everything but the rig takes defaults.
///
/// Structural rules (at least one stereo group, exactly one `imu`) are checked
/// here because the text format carries nothing else to validate against.
pub fn parse_topology(content: &str) -> Result<SessionConfig, ContractError> {
    let mut groups = Vec::new();
    let mut imu_topic: Option<Topic> = None;

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let mut tokens = raw.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };
        let operands: Vec<&str> = tokens.collect();

        match keyword.to_ascii_lowercase().as_str() {
            "stereo" => {
                let [left, right] = expect_operands::<2>(line_no, "stereo", &operands)?;
                groups.push(CameraGroupSpec::stereo(left, right));
            }
            "mono" => {
                let [topic] = expect_operands::<1>(line_no, "mono", &operands)?;
                groups.push(CameraGroupSpec::mono(topic));
            }
            "imu" => {
                let [topic] = expect_operands::<1>(line_no, "imu", &operands)?;
                if imu_topic.is_some() {
                    return Err(ContractError::config_parse(format!(
                        "line {line_no}: duplicate imu declaration"
                    )));
                }
                imu_topic = Some(topic.into());
            }
            other => {
                return Err(ContractError::config_parse(format!(
                    "line {line_no}: unknown keyword '{other}'"
                )));
            }
        }
    }

    if !groups.iter().any(CameraGroupSpec::is_stereo) {
        return Err(ContractError::config_parse(
            "topology declares no stereo group",
        ));
    }
    let imu_topic = imu_topic
        .ok_or_else(|| ContractError::config_parse("topology declares no imu topic"))?;

    Ok(SessionConfig::for_rig(RigDeclaration::new(groups, imu_topic)))
}

fn expect_operands<'a, const N: usize>(
    line_no: usize,
    keyword: &str,
    operands: &[&'a str],
) -> Result<[&'a str; N], ContractError> {
    <[&str; N]>::try_from(operands).map_err(|_| {
        ContractError::config_parse(format!(
            "line {line_no}: '{keyword}' expects {N} operand(s), got {}",
            operands.len()
        ))
    })
}

/// Parse by format
pub fn parse(content: &str, format: ConfigFormat) -> Result<SessionConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
        ConfigFormat::Topology => parse_topology(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::MissPolicy;

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[rig]
imu_topic = "imu0"
groups = [
    { kind = "stereo", left = "cam0", right = "cam1" },
    { kind = "mono", topic = "cam2" },
]

[sync]
miss_policy = "await_inertial"
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.rig.camera_count(), 3);
        assert_eq!(config.rig.imu_topic, "imu0");
        assert_eq!(config.sync.miss_policy, MissPolicy::AwaitInertial);
        assert_eq!(config.sync.imu_buffer_capacity, 50);
        assert_eq!(config.topics.image_suffix, "/image_raw");
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "rig": {
                "groups": [{ "kind": "stereo", "left": "cam0", "right": "cam1" }],
                "imu_topic": "imu0"
            },
            "topics": { "image_suffix": "/image" }
        }"#;
        let config = parse_json(content).unwrap();
        assert_eq!(config.topics.image_suffix, "/image");
        assert_eq!(config.topics.info_suffix, "/camera_info");
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let result = parse_toml("invalid toml [[[");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_parse_topology_text() {
        let content = "STEREO cam0 cam1\n\n  mono   cam2\nImu imu0\n";
        let config = parse_topology(content).unwrap();
        assert_eq!(
            config.rig.groups,
            vec![
                CameraGroupSpec::stereo("cam0", "cam1"),
                CameraGroupSpec::mono("cam2"),
            ]
        );
        assert_eq!(config.rig.imu_topic, "imu0");
    }

    #[test]
    fn test_parse_topology_duplicate_imu() {
        let err = parse_topology("stereo a b\nimu x\nimu y\n").unwrap_err();
        assert!(err.to_string().contains("duplicate imu"), "got: {err}");
    }

    #[test]
    fn test_parse_topology_requires_stereo_and_imu() {
        let err = parse_topology("mono a\nimu x\n").unwrap_err();
        assert!(err.to_string().contains("no stereo"), "got: {err}");

        let err = parse_topology("stereo a b\n").unwrap_err();
        assert!(err.to_string().contains("no imu"), "got: {err}");
    }

    #[test]
    fn test_parse_topology_bad_operands() {
        let err = parse_topology("stereo a\nimu x\n").unwrap_err();
        assert!(err.to_string().contains("line 1"), "got: {err}");

        let err = parse_topology("stereo a b\nlidar z\n").unwrap_err();
        assert!(err.to_string().contains("unknown keyword"), "got: {err}");
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("cfg"), Some(ConfigFormat::Topology));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
