// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Display surface controller.
//!
//! Owns visibility of the preview view and the binding between the
//! processor's video output and the current destination surface.

use std::sync::Arc;

use crate::core::bridge::FrameConverter;
use crate::core::camera::CameraSource;
use crate::core::geometry::{Size, destination_size};
use crate::core::output::{DestinationSurface, SurfaceId};
use crate::core::processor::GraphProcessor;

/// Host view that contains the destination surface.
///
/// Showing the view is what makes the host create the surface, so the
/// controller keeps it hidden until the camera has started.
pub trait PreviewView: Send {
    fn set_visible(&mut self, visible: bool);
}

/// View with no host counterpart.
#[derive(Debug, Default)]
pub struct DetachedView;

impl PreviewView for DetachedView {
    fn set_visible(&mut self, _visible: bool) {}
}

pub struct DisplaySurfaceController {
    view: Box<dyn PreviewView>,
    processor: Arc<dyn GraphProcessor>,
    visible: bool,
    surface: Option<SurfaceId>,
    destination: Option<Size>,
}

impl DisplaySurfaceController {
    /// Create the controller with its view hidden.
    pub fn new(mut view: Box<dyn PreviewView>, processor: Arc<dyn GraphProcessor>) -> Self {
        view.set_visible(false);
        Self {
            view,
            processor,
            visible: false,
            surface: None,
            destination: None,
        }
    }

    pub fn show(&mut self) {
        if !self.visible {
            self.visible = true;
            self.view.set_visible(true);
            tracing::info!("Preview display visible");
        }
    }

    pub fn hide(&mut self) {
        if self.visible {
            self.visible = false;
            self.view.set_visible(false);
            tracing::info!("Preview display hidden");
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    /// Last destination size computed from a geometry change.
    pub fn destination_size(&self) -> Option<Size> {
        self.destination
    }

    pub fn surface_created(&mut self, surface: DestinationSurface) {
        tracing::debug!("Surface {} created", surface.id());
        self.surface = Some(surface.id());
        self.processor.video_output().set_surface(Some(surface));
    }

    /// Recompute the destination size for a view of `view_size`.
    ///
    /// Without a camera, or before its first frame, the raw view size is used.
    /// The result is pushed to `converter` when one is alive and remembered for
    /// the next one.
    pub fn surface_changed(
        &mut self,
        view_size: Size,
        camera: Option<&dyn CameraSource>,
        converter: Option<&FrameConverter>,
    ) -> Size {
        let computed = camera.and_then(|c| c.compute_display_size(view_size));
        let rotated = camera.is_some_and(|c| c.is_rotated());
        let size = destination_size(view_size, computed, rotated);

        if computed.is_none() {
            tracing::debug!("Camera has no display size yet, using view size {}", view_size);
        }
        tracing::info!(
            "Surface changed to {} (display {}, rotated: {}) -> destination {}",
            view_size,
            computed.unwrap_or(view_size),
            rotated,
            size
        );

        self.destination = Some(size);
        if let Some(converter) = converter {
            converter.set_destination_size(size);
        }
        size
    }

    /// Clear the processor's destination before returning.
    pub fn surface_destroyed(&mut self) {
        if let Some(id) = self.surface.take() {
            tracing::debug!("Surface {} destroyed", id);
        }
        self.processor.video_output().set_surface(None);
    }

    /// Push the remembered destination size into a freshly created converter.
    pub fn apply_destination(&self, converter: &FrameConverter) {
        if let Some(size) = self.destination {
            converter.set_destination_size(size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::facing::CameraFacing;
    use crate::core::frames::{FrameSurfaceTexture, VideoFrame};
    use crate::core::camera::CameraNotifier;
    use crate::core::output::DisplaySurface;
    use crate::core::processor::{FrameProcessor, GraphConfig};
    use crate::core::Result;
    use parking_lot::Mutex;

    struct FixedCamera {
        display: Option<Size>,
        rotated: bool,
    }

    impl CameraSource for FixedCamera {
        fn start(&mut self, _: CameraFacing, _: FrameSurfaceTexture, _: CameraNotifier) -> Result<()> {
            Ok(())
        }
        fn stop(&mut self) {}
        fn compute_display_size(&self, _view_size: Size) -> Option<Size> {
            self.display
        }
        fn is_rotated(&self) -> bool {
            self.rotated
        }
    }

    struct VisibilityLog(Arc<Mutex<Vec<bool>>>);

    impl PreviewView for VisibilityLog {
        fn set_visible(&mut self, visible: bool) {
            self.0.lock().push(visible);
        }
    }

    struct NullSurface;

    impl DisplaySurface for NullSurface {
        fn id(&self) -> SurfaceId {
            SurfaceId(7)
        }
        fn present(&self, _frame: &VideoFrame) -> Result<()> {
            Ok(())
        }
    }

    fn controller() -> (DisplaySurfaceController, Arc<FrameProcessor>, Arc<Mutex<Vec<bool>>>) {
        let processor = Arc::new(FrameProcessor::new(GraphConfig::default()).unwrap());
        let log = Arc::new(Mutex::new(Vec::new()));
        let display = DisplaySurfaceController::new(
            Box::new(VisibilityLog(log.clone())),
            processor.clone(),
        );
        (display, processor, log)
    }

    #[test]
    fn test_starts_hidden_and_toggles_once() {
        let (mut display, _processor, log) = controller();
        assert!(!display.is_visible());

        display.show();
        display.show();
        display.hide();

        assert_eq!(*log.lock(), vec![false, true, false]);
    }

    #[test]
    fn test_geometry_without_camera_uses_view_size() {
        let (mut display, _processor, _log) = controller();
        let size = display.surface_changed(Size::new(720, 1280), None, None);
        assert_eq!(size, Size::new(720, 1280));
        assert_eq!(display.destination_size(), Some(size));
    }

    #[test]
    fn test_geometry_before_first_frame_ignores_rotation_of_nothing() {
        let (mut display, _processor, _log) = controller();
        let camera = FixedCamera {
            display: None,
            rotated: false,
        };
        let size = display.surface_changed(Size::new(720, 1280), Some(&camera), None);
        assert_eq!(size, Size::new(720, 1280));
    }

    #[test]
    fn test_geometry_rotated_camera_swaps() {
        let (mut display, _processor, _log) = controller();
        let camera = FixedCamera {
            display: Some(Size::new(960, 1280)),
            rotated: true,
        };
        let size = display.surface_changed(Size::new(720, 1280), Some(&camera), None);
        assert_eq!(size, Size::new(1280, 960));
    }

    #[test]
    fn test_surface_binding_follows_lifecycle() {
        let (mut display, processor, _log) = controller();
        display.surface_created(Arc::new(NullSurface));
        assert!(processor.video_output().has_surface());
        assert_eq!(display.surface(), Some(SurfaceId(7)));

        display.surface_destroyed();
        assert!(!processor.video_output().has_surface());
        assert_eq!(display.surface(), None);
    }
}
