//! `run` command implementation.

use anyhow::{Context, Result};
use tracing::{info, warn};

use replay::ShutdownFlag;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }
    if !args.log.exists() {
        return Err(CliError::log_not_found(&args.log).into());
    }

    let session = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        cameras = session.rig.camera_count(),
        stereo_groups = session.rig.stereo_count(),
        imu_topic = %session.rig.imu_topic,
        miss_policy = ?session.sync.miss_policy,
        "Configuration loaded"
    );

    let pipeline_config = PipelineConfig {
        session,
        log_path: args.log.clone(),
        output_dir: args.output.clone(),
        max_batches: (args.max_batches != 0).then_some(args.max_batches),
        metrics_port: (args.metrics_port != 0).then_some(args.metrics_port),
    };

    let shutdown = ShutdownFlag::new();
    let signal_flag = shutdown.clone();
    let signal_task = tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        warn!("Received shutdown signal, stopping replay...");
        signal_flag.request();
    });

    let result = Pipeline::new(pipeline_config).run(shutdown).await;
    signal_task.abort();

    let stats = result.context("Pipeline execution failed")?;
    if stats.cancelled {
        warn!(
            batches = stats.batches_emitted,
            "Replay cancelled before the end of the log, no estimate produced"
        );
    } else {
        info!(
            batches = stats.batches_emitted,
            misses = stats.misses,
            duration_secs = stats.duration.as_secs_f64(),
            "Replay completed successfully"
        );
    }
    stats.print_summary();

    info!("Rig Syncer finished");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
