// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Camera source that renders gradient frames on a background thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};

use crate::core::camera::{CameraNotifier, CameraProvider, CameraSource};
use crate::core::facing::CameraFacing;
use crate::core::frames::{FrameSurfaceTexture, SubmitOutcome, VideoFrame, monotonic_timestamp_us};
use crate::core::geometry::Size;
use crate::core::{PreviewError, Result};

/// Synthetic capture parameters. Width and height are in sensor orientation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticCameraConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Sensor orientation relative to the display, in degrees
    pub sensor_rotation: u32,
}

impl Default for SyntheticCameraConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
            sensor_rotation: 90,
        }
    }
}

impl SyntheticCameraConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PreviewError::Configuration(format!(
                "camera resolution {}x{} must be non-zero",
                self.width, self.height
            )));
        }
        if !(1..=240).contains(&self.fps) {
            return Err(PreviewError::Configuration(format!(
                "camera fps {} must be between 1 and 240",
                self.fps
            )));
        }
        if !matches!(self.sensor_rotation, 0 | 90 | 180 | 270) {
            return Err(PreviewError::Configuration(format!(
                "sensor rotation {} must be 0, 90, 180 or 270",
                self.sensor_rotation
            )));
        }
        Ok(())
    }

    pub fn frame_size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn is_rotated(&self) -> bool {
        matches!(self.sensor_rotation, 90 | 270)
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.fps.max(1)))
    }
}

#[derive(Default)]
struct CaptureCounters {
    frame_seen: AtomicBool,
    produced: AtomicU64,
    dropped: AtomicU64,
}

struct Capture {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

pub struct SyntheticCamera {
    config: SyntheticCameraConfig,
    counters: Arc<CaptureCounters>,
    capture: Option<Capture>,
    facing: Option<CameraFacing>,
}

impl SyntheticCamera {
    pub fn new(config: SyntheticCameraConfig) -> Self {
        Self {
            config,
            counters: Arc::new(CaptureCounters::default()),
            capture: None,
            facing: None,
        }
    }

    pub fn facing(&self) -> Option<CameraFacing> {
        self.facing
    }

    pub fn is_running(&self) -> bool {
        self.capture.is_some()
    }

    pub fn frames_produced(&self) -> u64 {
        self.counters.produced.load(Ordering::Relaxed)
    }

    fn run_capture(
        config: SyntheticCameraConfig,
        facing: CameraFacing,
        texture: FrameSurfaceTexture,
        notifier: CameraNotifier,
        counters: Arc<CaptureCounters>,
        stop: Receiver<()>,
    ) {
        let size = config.frame_size();
        let interval = config.frame_interval();
        notifier.started(texture.id(), size);

        let mut frame_number = 0u64;
        loop {
            let frame = gradient_frame(size, facing, frame_number);
            match texture.submit(frame) {
                SubmitOutcome::Queued => {}
                SubmitOutcome::Dropped => {
                    counters.dropped.fetch_add(1, Ordering::Relaxed);
                }
                SubmitOutcome::Closed => {
                    tracing::debug!("{} texture closed, ending capture", notifier.session());
                    break;
                }
            }
            counters.produced.fetch_add(1, Ordering::Relaxed);
            counters.frame_seen.store(true, Ordering::Release);
            frame_number += 1;

            match stop.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        tracing::debug!(
            "{} produced {} frames ({} dropped)",
            notifier.session(),
            counters.produced.load(Ordering::Relaxed),
            counters.dropped.load(Ordering::Relaxed)
        );
        notifier.stopped();
    }
}

impl CameraSource for SyntheticCamera {
    fn start(
        &mut self,
        facing: CameraFacing,
        texture: FrameSurfaceTexture,
        notifier: CameraNotifier,
    ) -> Result<()> {
        if self.capture.is_some() {
            return Err(PreviewError::Camera(
                "synthetic camera is already capturing".to_string(),
            ));
        }
        self.config.validate()?;

        self.counters = Arc::new(CaptureCounters::default());
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let config = self.config.clone();
        let counters = Arc::clone(&self.counters);
        let session = notifier.session();

        let handle = std::thread::Builder::new()
            .name(format!("synthetic-camera-{}", session.0))
            .spawn(move || Self::run_capture(config, facing, texture, notifier, counters, stop_rx))
            .map_err(|e| PreviewError::Camera(format!("Failed to spawn capture thread: {}", e)))?;

        tracing::info!(
            "Synthetic {} camera started ({}, {} fps, {})",
            facing,
            self.config.frame_size(),
            self.config.fps,
            session
        );
        self.facing = Some(facing);
        self.capture = Some(Capture {
            stop: stop_tx,
            handle,
        });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(capture) = self.capture.take() else {
            return;
        };
        let _ = capture.stop.try_send(());
        if capture.handle.join().is_err() {
            tracing::error!("Synthetic camera capture thread panicked");
        }
        tracing::info!("Synthetic camera stopped after {} frames", self.frames_produced());
    }

    fn compute_display_size(&self, view_size: Size) -> Option<Size> {
        if !self.counters.frame_seen.load(Ordering::Acquire) {
            return None;
        }
        let frame = if self.config.is_rotated() {
            self.config.frame_size().transposed()
        } else {
            self.config.frame_size()
        };
        Some(view_size.cover(frame.aspect_ratio()))
    }

    fn is_rotated(&self) -> bool {
        self.config.is_rotated()
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Horizontal red ramp, vertical green ramp and a facing-dependent blue
/// channel that drifts with the frame number.
fn gradient_frame(size: Size, facing: CameraFacing, frame_number: u64) -> VideoFrame {
    let base_blue: u64 = match facing {
        CameraFacing::Front => 200,
        CameraFacing::Back => 60,
    };
    let blue = ((base_blue + frame_number) % 256) as u8;
    let (w, h) = (size.width.max(1), size.height.max(1));

    let mut data = Vec::with_capacity(w as usize * h as usize * 4);
    for y in 0..h {
        let green = (y * 255 / h) as u8;
        for x in 0..w {
            let red = (x * 255 / w) as u8;
            data.extend_from_slice(&[red, green, blue, 255]);
        }
    }

    VideoFrame {
        data,
        width: w,
        height: h,
        frame_number,
        timestamp_us: monotonic_timestamp_us(),
    }
}

/// Hands out a new [`SyntheticCamera`] for every camera start.
#[derive(Debug, Clone, Default)]
pub struct SyntheticCameraProvider {
    config: SyntheticCameraConfig,
}

impl SyntheticCameraProvider {
    pub fn new(config: SyntheticCameraConfig) -> Self {
        Self { config }
    }
}

impl CameraProvider for SyntheticCameraProvider {
    fn create(&mut self) -> Result<Box<dyn CameraSource>> {
        self.config.validate()?;
        Ok(Box::new(SyntheticCamera::new(self.config.clone())))
    }
}
