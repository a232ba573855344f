// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! End-to-end frame flow with the synthetic camera and a headless surface.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use facecam::core::{
    FrameProcessor, GraphConfig, GraphProcessor, HeadlessSurface, MemoryAuthorizer,
    PreviewConfig, PreviewController, Result, Size, SyntheticCameraConfig,
    SyntheticCameraProvider,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

fn camera_config() -> SyntheticCameraConfig {
    SyntheticCameraConfig {
        width: 16,
        height: 12,
        fps: 200,
        sensor_rotation: 90,
    }
}

/// Controller with a synthetic camera plus a handle on its frame processor.
fn running_preview() -> (PreviewController, Arc<Mutex<Option<Arc<FrameProcessor>>>>) {
    init_logging();
    let slot: Arc<Mutex<Option<Arc<FrameProcessor>>>> = Arc::new(Mutex::new(None));
    let factory_slot = Arc::clone(&slot);

    let config = PreviewConfig {
        camera: camera_config(),
        ..PreviewConfig::default()
    };
    let controller = PreviewController::builder(config)
        .camera_provider(SyntheticCameraProvider::new(camera_config()))
        .authorizer(MemoryAuthorizer::pre_granted())
        .processor_factory(move |graph: &GraphConfig| -> Result<Arc<dyn GraphProcessor>> {
            let processor = Arc::new(FrameProcessor::new(graph.clone())?);
            *factory_slot.lock() = Some(Arc::clone(&processor));
            Ok(processor)
        })
        .build()
        .unwrap();
    (controller, slot)
}

fn processor(slot: &Arc<Mutex<Option<Arc<FrameProcessor>>>>) -> Arc<FrameProcessor> {
    slot.lock().clone().expect("processor created on activate")
}

#[test]
fn test_no_frames_reach_destroyed_surface() {
    let (mut controller, slot) = running_preview();
    controller.activate().unwrap();
    let surface = Arc::new(HeadlessSurface::new());
    controller.surface_created(surface.clone());
    controller.resume().unwrap();

    assert!(controller.pump_events_timeout(Duration::from_secs(5)) >= 1);
    assert!(controller.is_display_visible());
    assert!(wait_for(|| surface.presented() >= 5));

    controller.surface_destroyed();
    surface.mark_destroyed();
    let presented = surface.presented();
    let unbound_before = processor(&slot).stats().output.dropped_unbound;

    // Frames keep flowing into the processor but are dropped unbound.
    assert!(wait_for(|| processor(&slot).stats().output.dropped_unbound > unbound_before + 3));
    assert_eq!(surface.presented_after_destroy(), 0);
    assert_eq!(surface.presented(), presented);
}

#[test]
fn test_frames_follow_destination_size() {
    let (mut controller, _slot) = running_preview();
    controller.activate().unwrap();
    let surface = Arc::new(HeadlessSurface::new());
    controller.surface_created(surface.clone());
    controller.resume().unwrap();
    controller.pump_events_timeout(Duration::from_secs(5));
    assert!(wait_for(|| surface.presented() >= 2));

    // 12x16 portrait frame covering 32x24 is 32x43, then swapped for rotation.
    let destination = controller.surface_changed(32, 24);
    assert_eq!(destination, Some(Size::new(43, 32)));
    assert!(wait_for(|| surface.last_size() == Some(Size::new(43, 32))));
}

#[test]
fn test_camera_switch_keeps_timestamps_increasing() {
    let (mut controller, slot) = running_preview();
    controller.activate().unwrap();
    let surface = Arc::new(HeadlessSurface::new());
    controller.surface_created(surface.clone());
    controller.resume().unwrap();
    assert!(wait_for(|| surface.presented() >= 3));

    for _ in 0..4 {
        controller.toggle_camera_facing().unwrap();
        let before = surface.presented();
        assert!(wait_for(|| surface.presented() >= before + 2));
    }
    controller.pump_events();

    let stats = processor(&slot).stats();
    assert_eq!(stats.rejected, 0);
    assert!(stats.accepted >= 11);
    assert_eq!(controller.stats().camera_starts, 5);
}

#[test]
fn test_suspend_resume_reacquires_context() {
    let (mut controller, slot) = running_preview();
    controller.activate().unwrap();
    let surface = Arc::new(HeadlessSurface::new());
    controller.surface_created(surface.clone());

    for _ in 0..3 {
        controller.resume().unwrap();
        assert!(wait_for(|| controller.converter_stats().is_some_and(|s| s.forwarded > 0)));
        controller.suspend().unwrap();
        assert!(!controller.render_context().is_leased());
    }
    controller.destroy().unwrap();
    assert!(processor(&slot).is_closed());
}
