//! `info` command implementation.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{LogSource, MessagePayload, SessionConfig, Timestamp};
use replay::{JsonlLog, LogReadStats};

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Log summary for JSON output
#[derive(Serialize)]
struct LogInfo {
    path: String,
    messages: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_stamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_stamp: Option<String>,
    duration_secs: f64,
    invalid_lines: u64,
    missing_image_data: u64,
    topics: BTreeMap<String, TopicInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rig_check: Option<RigCheck>,
}

#[derive(Serialize)]
struct TopicInfo {
    kind: &'static str,
    count: u64,
    first_stamp_ns: u64,
    last_stamp_ns: u64,
}

/// Declared topics compared with what the log contains
#[derive(Serialize)]
struct RigCheck {
    declared_cameras: usize,
    missing_calibration: Vec<String>,
    missing_images: Vec<String>,
    imu_present: bool,
}

impl RigCheck {
    fn is_replayable(&self) -> bool {
        self.missing_calibration.is_empty() && self.imu_present
    }
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(log = %args.log.display(), "Scanning log");

    if !args.log.exists() {
        return Err(CliError::log_not_found(&args.log).into());
    }

    let config = match &args.config {
        Some(path) => Some(
            config_loader::ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
        ),
        None => None,
    };

    let info = scan_log(&args.log, config.as_ref())?;

    if args.json {
        let json = serde_json::to_string_pretty(&info).context("Failed to serialize log info")?;
        println!("{}", json);
    } else {
        print_log_info(&info);
    }

    Ok(())
}

fn scan_log(path: &Path, config: Option<&SessionConfig>) -> Result<LogInfo> {
    let mut log = JsonlLog::open(path)
        .with_context(|| format!("Failed to open log {}", path.display()))?;

    let mut topics: BTreeMap<String, TopicInfo> = BTreeMap::new();
    let mut first: Option<Timestamp> = None;
    let mut last: Option<Timestamp> = None;
    let mut messages = 0u64;

    while let Some(message) = log.next_message()? {
        // Already counted as an invalid line
        if matches!(message.payload, MessagePayload::Malformed(_)) {
            continue;
        }
        messages += 1;
        let stamp = message.stamp;
        first = Some(first.map_or(stamp, |f| f.min(stamp)));
        last = Some(last.map_or(stamp, |l| l.max(stamp)));

        let entry = topics
            .entry(message.topic.to_string())
            .or_insert_with(|| TopicInfo {
                kind: message.kind(),
                count: 0,
                first_stamp_ns: stamp.as_nanos(),
                last_stamp_ns: stamp.as_nanos(),
            });
        entry.count += 1;
        entry.last_stamp_ns = stamp.as_nanos();
    }
    let stats: LogReadStats = log.stats();
    log.close();

    let rig_check = config.map(|config| {
        let cameras = config.rig.cameras(&config.topics);
        let absent = |topic: &contracts::Topic| !topics.contains_key(topic.as_str());
        RigCheck {
            declared_cameras: cameras.len(),
            missing_calibration: cameras
                .iter()
                .filter(|c| absent(&c.info_topic))
                .map(|c| c.info_topic.to_string())
                .collect(),
            missing_images: cameras
                .iter()
                .filter(|c| absent(&c.image_topic))
                .map(|c| c.image_topic.to_string())
                .collect(),
            imu_present: !absent(&config.rig.imu_topic),
        }
    });

    let duration_secs = match (first, last) {
        (Some(f), Some(l)) => l.saturating_since(f) as f64 / 1e9,
        _ => 0.0,
    };

    Ok(LogInfo {
        path: log.path().display().to_string(),
        messages,
        first_stamp: first.map(|s| s.to_string()),
        last_stamp: last.map(|s| s.to_string()),
        duration_secs,
        invalid_lines: stats.invalid,
        missing_image_data: stats.missing_data,
        topics,
        rig_check,
    })
}

fn print_log_info(info: &LogInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Rig Syncer Log Info                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📂 Log");
    println!("   ├─ Path: {}", info.path);
    println!("   ├─ Messages: {}", info.messages);
    match (&info.first_stamp, &info.last_stamp) {
        (Some(first), Some(last)) => {
            println!("   ├─ Time range: {} .. {}", first, last);
        }
        _ => {
            println!("   ├─ Time range: (empty)");
        }
    }
    println!("   ├─ Duration: {:.3}s", info.duration_secs);
    println!("   ├─ Invalid lines: {}", info.invalid_lines);
    println!("   └─ Missing image data: {}", info.missing_image_data);

    println!("\n📡 Topics ({})", info.topics.len());
    let count = info.topics.len();
    for (i, (topic, t)) in info.topics.iter().enumerate() {
        let prefix = if i == count - 1 { "└─" } else { "├─" };
        println!("   {} {} ({}, {} messages)", prefix, topic, t.kind, t.count);
    }

    if let Some(check) = &info.rig_check {
        println!("\n📷 Rig Check ({} cameras)", check.declared_cameras);
        println!(
            "   ├─ IMU topic: {}",
            if check.imu_present { "present" } else { "missing" }
        );
        if !check.missing_images.is_empty() {
            println!("   ├─ Missing image topics: {:?}", check.missing_images);
        }
        if check.missing_calibration.is_empty() {
            println!("   └─ Calibration topics: all present");
        } else {
            println!("   └─ Missing calibration topics: {:?}", check.missing_calibration);
        }
        if !check.is_replayable() {
            println!("\n⚠ This log cannot resolve the declared rig");
        }
    }

    println!();
}
