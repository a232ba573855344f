// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Display geometry helpers.

use serde::{Deserialize, Serialize};

/// Width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Same area with width and height exchanged.
    pub const fn transposed(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    /// Scale a frame of the given aspect ratio so it covers `self` entirely.
    ///
    /// One dimension matches the view exactly, the other overflows it. Returns
    /// `self` unchanged for degenerate inputs.
    pub fn cover(self, frame_aspect: f64) -> Self {
        if self.is_empty() || !(frame_aspect.is_finite() && frame_aspect > 0.0) {
            return self;
        }

        if frame_aspect < self.aspect_ratio() {
            Self {
                width: self.width,
                height: (self.width as f64 / frame_aspect).round() as u32,
            }
        } else {
            Self {
                width: (self.height as f64 * frame_aspect).round() as u32,
                height: self.height,
            }
        }
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Destination size handed to the frame converter after a geometry change.
///
/// `computed` is the camera's ideal display size for `view`, or `None` when the
/// camera has not produced a frame yet, in which case the raw view size is
/// used. A rotated camera gets width and height swapped.
pub fn destination_size(view: Size, computed: Option<Size>, rotated: bool) -> Size {
    let display = computed.unwrap_or(view);
    if rotated {
        display.transposed()
    } else {
        display
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_to_view_size() {
        let view = Size::new(1080, 1920);
        assert_eq!(destination_size(view, None, false), view);
    }

    #[test]
    fn test_rotation_swaps_dimensions() {
        let view = Size::new(1080, 1920);
        let computed = Some(Size::new(1440, 1920));

        let upright = destination_size(view, computed, false);
        let rotated = destination_size(view, computed, true);

        assert_eq!(upright, Size::new(1440, 1920));
        assert_eq!(rotated, Size::new(1920, 1440));
    }

    #[test]
    fn test_rotation_applies_to_fallback() {
        let view = Size::new(720, 1280);
        assert_eq!(destination_size(view, None, true), Size::new(1280, 720));
    }

    #[test]
    fn test_cover_wider_frame_matches_height() {
        // Portrait view, 4:3 frame rotated into portrait (3:4).
        let view = Size::new(1080, 1920);
        let covered = view.cover(480.0 / 640.0);
        assert_eq!(covered, Size::new(1440, 1920));
    }

    #[test]
    fn test_cover_narrower_frame_matches_width() {
        let view = Size::new(1920, 1080);
        let covered = view.cover(4.0 / 3.0);
        assert_eq!(covered, Size::new(1920, 1440));
    }

    #[test]
    fn test_cover_degenerate_inputs() {
        assert_eq!(Size::new(0, 100).cover(1.5), Size::new(0, 100));
        assert_eq!(Size::new(100, 100).cover(0.0), Size::new(100, 100));
        assert_eq!(Size::new(100, 100).cover(f64::NAN), Size::new(100, 100));
    }

    #[test]
    fn test_display() {
        assert_eq!(Size::new(640, 480).to_string(), "640x480");
    }
}
