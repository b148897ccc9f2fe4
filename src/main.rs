// src/main.rs

mod audit;
mod authorization;
mod config;
mod decision;
mod detection;
mod error;
mod pipeline;
mod replay;
mod tracking;
mod types;

use anyhow::{Context, Result};
use authorization::AllowListStore;
use pipeline::{DynPipeline, GateEvent, PipelineMetrics};
use replay::{find_recordings, load_recording, replay_detectors, run_replay, ReplayStats};
use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use types::Config;

fn main() -> Result<()> {
    let config_path =
        std::env::var("CHECKPOINT_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load_or_default(&config_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚧 Checkpoint Gate Starting");
    if Path::new(&config_path).exists() {
        info!("✓ Configuration loaded from {}", config_path);
    } else {
        info!("✓ Using default configuration ({} not found)", config_path);
    }
    info!(
        "Tracker: max_disappeared={}, max_distance={:.1}",
        config.tracker.max_disappeared, config.tracker.max_distance
    );

    seed_allow_list(&config)?;

    let recordings = find_recordings(&config.replay.input_dir)?;
    if recordings.is_empty() {
        error!("No recordings found in {}", config.replay.input_dir);
        return Ok(());
    }

    for (idx, path) in recordings.iter().enumerate() {
        info!("\n========================================");
        info!(
            "Replaying recording {}/{}: {}",
            idx + 1,
            recordings.len(),
            path.display()
        );
        info!("========================================\n");

        match process_recording(path, &config) {
            Ok((stats, metrics)) => log_stats(&stats, &metrics),
            Err(e) => error!("Failed to replay recording: {:#}", e),
        }
    }

    match audit::read_violations(&config.audit.violation_log_path) {
        Ok(records) => info!(
            "📒 Violation log holds {} record(s): {}",
            records.len(),
            config.audit.violation_log_path
        ),
        Err(_) => info!("📒 No violations on file"),
    }

    Ok(())
}

fn process_recording(path: &Path, config: &Config) -> Result<(ReplayStats, PipelineMetrics)> {
    let frames = load_recording(path)?;
    let (identifier_detector, safety_detector) = replay_detectors(&frames);

    let mut pipeline = DynPipeline::from_config(config)
        .with_detectors(Box::new(identifier_detector), Box::new(safety_detector));

    let stats = run_replay(&mut pipeline, &frames);
    log_events(&pipeline.drain_events());
    info!("{}", pipeline.session().status_line());

    Ok((stats, pipeline.metrics().clone()))
}

/// Append configured identifiers to the allow-list before any lookup runs.
fn seed_allow_list(config: &Config) -> Result<()> {
    if config.authorization.allow_all || config.authorization.seed_identifiers.is_empty() {
        return Ok(());
    }

    let store = AllowListStore::new(&config.authorization.allow_list_path);
    let mut added = 0;
    for identifier in &config.authorization.seed_identifiers {
        if store
            .add_authorized(identifier)
            .with_context(|| format!("seed allow-list with {:?}", identifier))?
        {
            added += 1;
        }
    }
    info!(
        "✓ Allow-list {}: {} of {} seed identifier(s) added",
        store.path().display(),
        added,
        config.authorization.seed_identifiers.len()
    );
    Ok(())
}

fn log_events(events: &[GateEvent]) {
    let mut failures = 0;
    for event in events {
        if event.is_failure() {
            failures += 1;
            warn!("  event: {}", event);
        } else {
            debug!("  event: {}", event);
        }
    }
    info!("  Events: {} ({} failure(s))", events.len(), failures);
}

fn log_stats(stats: &ReplayStats, metrics: &PipelineMetrics) {
    info!("\n✓ Recording replayed successfully!");
    info!("  Total frames: {}", stats.frames);
    info!("  ✅ Access granted: {}", stats.granted);
    info!("  ⛔ Access denied: {}", stats.denied);
    info!("  ❔ No identifier: {}", stats.no_identifier);
    if stats.safety_violations > 0 {
        warn!("  😴 Safety violations: {}", stats.safety_violations);
    } else {
        info!("  😴 Safety violations: 0");
    }
    if stats.errors > 0 {
        warn!("  ⚠️  Lookup errors: {}", stats.errors);
    }
    info!("  Violations recorded: {}", stats.violations);
    info!("  Session resets: {}", stats.session_resets);
    if let Some(decision) = stats.final_decision {
        if decision.is_granted() {
            info!("  Final decision: ✅ {}", decision);
        } else {
            info!("  Final decision: {}", decision);
        }
    }

    let summary = metrics.summary();
    if summary.audit_failures > 0 {
        warn!("  📒 Audit write failures: {}", summary.audit_failures);
    }
    if summary.coasting_frames > 0 {
        info!("  Coasting frames: {}", summary.coasting_frames);
    }
    if summary.rejected_detections > 0 {
        warn!("  Rejected detections: {}", summary.rejected_detections);
    }
    info!("  Processing Speed: {:.1} FPS", summary.fps);
    match serde_json::to_string(&summary) {
        Ok(json) => debug!("metrics: {}", json),
        Err(e) => warn!("Could not serialize metrics: {}", e),
    }
}
