//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{MissPolicy, SessionConfig, TopicNaming};

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    camera_count: usize,
    stereo_groups: usize,
    mono_groups: usize,
    imu_topic: String,
    topics: Vec<String>,
    imu_buffer_capacity: usize,
    join_queue_size: usize,
    miss_policy: MissPolicy,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            let stereo_groups = config.rig.stereo_count();

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    camera_count: config.rig.camera_count(),
                    stereo_groups,
                    mono_groups: config.rig.groups.len() - stereo_groups,
                    imu_topic: config.rig.imu_topic.to_string(),
                    topics: config
                        .rig
                        .topics(&config.topics)
                        .iter()
                        .map(|t| t.to_string())
                        .collect(),
                    imu_buffer_capacity: config.sync.imu_buffer_capacity,
                    join_queue_size: config.sync.join_queue_size,
                    miss_policy: config.sync.miss_policy,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &SessionConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.sync.join_queue_size == 1 {
        warnings.push(
            "sync.join_queue_size is 1 - any interleaving across cameras evicts pending images"
                .to_string(),
        );
    }

    if config.sync.imu_buffer_capacity < config.sync.join_queue_size {
        warnings.push(format!(
            "sync.imu_buffer_capacity ({}) is smaller than sync.join_queue_size ({}) - \
             inertial samples may be evicted before their images complete",
            config.sync.imu_buffer_capacity, config.sync.join_queue_size
        ));
    }

    if config.sync.miss_policy == MissPolicy::AwaitInertial {
        warnings.push(
            "sync.miss_policy = await_inertial - image sets wait for late inertial samples"
                .to_string(),
        );
    }

    if config.topics != TopicNaming::default() {
        warnings.push(format!(
            "non-default topic suffixes: image '{}', calibration '{}'",
            config.topics.image_suffix, config.topics.info_suffix
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Cameras: {}", summary.camera_count);
            println!("  Stereo groups: {}", summary.stereo_groups);
            println!("  Mono groups: {}", summary.mono_groups);
            println!("  IMU topic: {}", summary.imu_topic);
            println!("  Topics: {}", summary.topics.len());
            println!("  IMU buffer: {}", summary.imu_buffer_capacity);
            println!("  Join queue: {}", summary.join_queue_size);
            println!("  Miss policy: {:?}", summary.miss_policy);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
