// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! facecam Runtime Binary
//!
//! Hosts a preview session with a synthetic camera and a headless display
//! surface, driven through a scripted lifecycle: activate, resume, deliver
//! the authorization decision, present frames (toggling the camera facing
//! along the way), then suspend and destroy.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use facecam::core::{
    GrantResult, HeadlessSurface, MemoryAuthorizer, PreviewConfig, PreviewController,
    SyntheticCameraProvider,
};
use tracing_appender::non_blocking::WorkerGuard;

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "facecam-runtime")]
#[command(author, version, about = "Simulated camera preview session", long_about = None)]
struct Args {
    /// Config file, or a directory containing facecam.yaml
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Stop after this many frames were presented
    #[arg(long, default_value = "300")]
    frames: u64,

    /// Toggle the camera facing every N presented frames (0 disables)
    #[arg(long, default_value = "0")]
    toggle_every: u64,

    /// Deny camera authorization instead of granting it
    #[arg(long)]
    deny: bool,

    /// Seconds to wait for video before giving up
    #[arg(long, default_value = "10")]
    timeout_secs: u64,

    /// Override the synthetic sensor rotation (0, 90, 180, 270)
    #[arg(long, value_name = "DEGREES")]
    rotation: Option<u32>,

    /// Preview view width
    #[arg(long, default_value = "720")]
    view_width: u32,

    /// Preview view height
    #[arg(long, default_value = "1280")]
    view_height: u32,

    /// Also write logs to ~/.facecam/logs/<NAME>.log
    #[arg(long, value_name = "NAME")]
    log_file: Option<String>,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

fn get_logs_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    Ok(home.join(".facecam").join("logs"))
}

fn setup_logging(log_file: Option<&str>) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let stdout_layer = tracing_subscriber::fmt::layer();

    let Some(name) = log_file else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stdout_layer)
            .init();
        return Ok(None);
    };

    let logs_dir = get_logs_dir()?;
    std::fs::create_dir_all(&logs_dir)
        .with_context(|| format!("Failed to create {}", logs_dir.display()))?;

    let file_appender = tracing_appender::rolling::never(&logs_dir, format!("{}.log", name));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    tracing::info!("Log file: {}", logs_dir.join(format!("{}.log", name)).display());
    Ok(Some(guard))
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> Result<PreviewConfig> {
    let config = match path {
        Some(path) if path.is_file() => PreviewConfig::from_file(path)?,
        Some(dir) => PreviewConfig::load(dir)?,
        None => {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            PreviewConfig::load_or_default(&cwd)
        }
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = setup_logging(args.log_file.as_deref())?;

    let mut config = load_config(args.config.as_deref())?;
    if let Some(rotation) = args.rotation {
        config.camera.sensor_rotation = rotation;
    }
    config.validate()?;

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    tracing::info!(
        "Starting preview session: graph '{}', {} camera {}x{} @ {} fps",
        config.graph.graph_name,
        config.initial_facing,
        config.camera.width,
        config.camera.height,
        config.camera.fps
    );

    let mut controller = PreviewController::builder(config.clone())
        .camera_provider(SyntheticCameraProvider::new(config.camera.clone()))
        .authorizer(MemoryAuthorizer::new())
        .build()?;

    controller.activate()?;
    controller.resume()?;

    let decision = if args.deny {
        GrantResult::Denied
    } else {
        GrantResult::Granted
    };
    let (code, permissions, results) = MemoryAuthorizer::camera_result(decision);
    controller.on_authorization_result(code, &permissions, &results)?;

    let surface = Arc::new(HeadlessSurface::new());
    let mut surface_bound = false;
    let mut next_toggle = args.toggle_every;
    let deadline = Instant::now() + Duration::from_secs(args.timeout_secs);

    while running.load(Ordering::SeqCst) {
        controller.pump_events_timeout(Duration::from_millis(20));

        // The host creates the surface once the view becomes visible.
        if controller.is_display_visible() && !surface_bound {
            controller.surface_created(surface.clone());
            controller.surface_changed(args.view_width, args.view_height);
            surface_bound = true;
        }

        let presented = surface.presented();
        if presented >= args.frames {
            break;
        }
        if args.toggle_every > 0 && presented >= next_toggle {
            controller.toggle_camera_facing()?;
            next_toggle = presented + args.toggle_every;
        }
        if presented == 0 && Instant::now() >= deadline {
            tracing::warn!("No video after {}s, stopping", args.timeout_secs);
            break;
        }
    }

    if surface_bound {
        controller.surface_destroyed();
        surface.mark_destroyed();
    }
    controller.suspend()?;
    controller.destroy()?;

    let stats = controller.stats();
    tracing::info!(
        "Session finished: {} frames presented, {} camera starts, {} converters, destination {}",
        surface.presented(),
        stats.camera_starts,
        stats.converter_creations,
        controller
            .destination_size()
            .map(|size| size.to_string())
            .unwrap_or_else(|| "unset".to_string())
    );
    println!(
        "presented={} camera_starts={} facing={}",
        surface.presented(),
        stats.camera_starts,
        controller.facing()
    );

    Ok(())
}
