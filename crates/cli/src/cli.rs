//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Rig Syncer - replay a recorded camera/IMU log into a rig calibration session
#[derive(Parser, Debug)]
#[command(
    name = "rig-syncer",
    author,
    version,
    about = "Multi-camera + IMU log replay and frame synchronization",
    long_about = "Replays a recorded multi-topic log of camera images, camera calibration \n\
                  messages and inertial samples. Discovers the rig topology, synchronizes \n\
                  images with inertial samples by exact timestamp, and feeds the batches \n\
                  to an estimation engine."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "RIG_SYNCER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "RIG_SYNCER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a log through a calibration session
    Run(RunArgs),

    /// Validate a rig configuration without replaying
    Validate(ValidateArgs),

    /// Summarize the contents of a recorded log
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Rig configuration (TOML, JSON, or .cfg/.txt topology declaration)
    #[arg(short, long, default_value = "rig.toml", env = "RIG_SYNCER_CONFIG")]
    pub config: PathBuf,

    /// Log directory (containing messages.jsonl) or .jsonl file
    #[arg(short, long, env = "RIG_SYNCER_LOG")]
    pub log: PathBuf,

    /// Directory receiving rig_extrinsics.json
    #[arg(short, long, env = "RIG_SYNCER_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "RIG_SYNCER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Stop after this many emitted batches (0 = unlimited)
    #[arg(long, default_value = "0", env = "RIG_SYNCER_MAX_BATCHES")]
    pub max_batches: u64,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "rig.toml", env = "RIG_SYNCER_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Log directory (containing messages.jsonl) or .jsonl file
    #[arg(short, long, env = "RIG_SYNCER_LOG")]
    pub log: PathBuf,

    /// Check the log against this rig configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
