// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Processor video output and its destination surface binding.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::core::Result;
use crate::core::frames::VideoFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

/// On-screen drawable target that processed frames are rendered into.
pub trait DisplaySurface: Send + Sync {
    fn id(&self) -> SurfaceId;

    fn present(&self, frame: &VideoFrame) -> Result<()>;
}

pub type DestinationSurface = Arc<dyn DisplaySurface>;

/// Destination side of a graph processor.
pub trait VideoOutput: Send + Sync {
    /// Bind or clear the destination. Clearing is synchronous: once this
    /// returns with `None`, the previous surface receives no further frames.
    fn set_surface(&self, surface: Option<DestinationSurface>);

    fn set_flip_y(&self, flip_y: bool);

    fn has_surface(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputStats {
    pub presented: u64,
    /// Frames that arrived while no destination was bound
    pub dropped_unbound: u64,
}

struct OutputState {
    surface: Option<DestinationSurface>,
    flip_y: bool,
}

/// [`VideoOutput`] that presents frames under the binding lock.
///
/// `render` holds the lock for the whole presentation, so `set_surface(None)`
/// cannot return while a frame is still being drawn to the old surface.
pub struct SurfaceOutput {
    state: Mutex<OutputState>,
    presented: AtomicU64,
    dropped_unbound: AtomicU64,
}

impl Default for SurfaceOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceOutput {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(OutputState {
                surface: None,
                flip_y: false,
            }),
            presented: AtomicU64::new(0),
            dropped_unbound: AtomicU64::new(0),
        }
    }

    /// Present `frame` on the bound surface.
    ///
    /// Returns `Ok(false)` when no surface is bound and the frame was dropped.
    pub fn render(&self, mut frame: VideoFrame) -> Result<bool> {
        let state = self.state.lock();
        let Some(surface) = state.surface.as_ref() else {
            let dropped = self.dropped_unbound.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped == 1 || dropped % 300 == 0 {
                tracing::debug!("No destination surface bound, dropped {} frames so far", dropped);
            }
            return Ok(false);
        };

        if state.flip_y {
            frame.flip_vertical();
        }
        surface.present(&frame)?;
        self.presented.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    pub fn flip_y(&self) -> bool {
        self.state.lock().flip_y
    }

    pub fn stats(&self) -> OutputStats {
        OutputStats {
            presented: self.presented.load(Ordering::Relaxed),
            dropped_unbound: self.dropped_unbound.load(Ordering::Relaxed),
        }
    }
}

impl VideoOutput for SurfaceOutput {
    fn set_surface(&self, surface: Option<DestinationSurface>) {
        let mut state = self.state.lock();
        match (&state.surface, &surface) {
            (_, Some(next)) => tracing::debug!("Binding destination {}", next.id()),
            (Some(prev), None) => tracing::debug!("Clearing destination {}", prev.id()),
            (None, None) => {}
        }
        state.surface = surface;
    }

    fn set_flip_y(&self, flip_y: bool) {
        self.state.lock().flip_y = flip_y;
    }

    fn has_surface(&self) -> bool {
        self.state.lock().surface.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingSurface {
        frames: Mutex<Vec<VideoFrame>>,
    }

    impl DisplaySurface for RecordingSurface {
        fn id(&self) -> SurfaceId {
            SurfaceId(1)
        }

        fn present(&self, frame: &VideoFrame) -> Result<()> {
            self.frames.lock().push(frame.clone());
            Ok(())
        }
    }

    fn two_row_frame() -> VideoFrame {
        VideoFrame::new(vec![1, 1, 1, 1, 2, 2, 2, 2], 1, 2, 0, 0).unwrap()
    }

    #[test]
    fn test_unbound_frames_are_dropped() {
        let output = SurfaceOutput::new();
        assert!(!output.render(two_row_frame()).unwrap());
        assert_eq!(output.stats().dropped_unbound, 1);
        assert_eq!(output.stats().presented, 0);
    }

    #[test]
    fn test_flip_applied_on_present() {
        let output = SurfaceOutput::new();
        let surface = Arc::new(RecordingSurface {
            frames: Mutex::new(Vec::new()),
        });
        output.set_surface(Some(surface.clone()));
        output.set_flip_y(true);

        assert!(output.render(two_row_frame()).unwrap());

        let frames = surface.frames.lock();
        assert_eq!(frames[0].pixel(0, 0), Some([2, 2, 2, 2]));
    }

    #[test]
    fn test_clearing_surface_stops_presentation() {
        let output = SurfaceOutput::new();
        let surface = Arc::new(RecordingSurface {
            frames: Mutex::new(Vec::new()),
        });
        output.set_surface(Some(surface.clone()));
        output.render(two_row_frame()).unwrap();
        output.set_surface(None);
        output.render(two_row_frame()).unwrap();

        assert!(!output.has_surface());
        assert_eq!(surface.frames.lock().len(), 1);
        assert_eq!(output.stats(), OutputStats { presented: 1, dropped_unbound: 1 });
    }
}
