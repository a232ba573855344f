// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Frame data and the texture stream that carries camera frames into the
//! converter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::core::geometry::Size;
use crate::core::{PreviewError, Result};

const BYTES_PER_PIXEL: usize = 4;

/// RGBA8 video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    /// Tightly packed RGBA rows, top row first.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Sequential frame number within the producing session
    pub frame_number: u64,
    /// Capture timestamp in microseconds
    pub timestamp_us: i64,
}

impl VideoFrame {
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        frame_number: u64,
        timestamp_us: i64,
    ) -> Result<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(PreviewError::InvalidArgument(format!(
                "Frame {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            frame_number,
            timestamp_us,
        })
    }

    /// Frame filled with a single RGBA colour.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4], frame_number: u64, timestamp_us: i64) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * BYTES_PER_PIXEL);
        for _ in 0..pixels {
            data.extend_from_slice(&rgba);
        }
        Self {
            data,
            width,
            height,
            frame_number,
            timestamp_us,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = self.data.get(idx..idx + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Mirror the frame around its horizontal axis in place.
    pub fn flip_vertical(&mut self) {
        let stride = self.width as usize * BYTES_PER_PIXEL;
        let rows = self.height as usize;
        for row in 0..rows / 2 {
            let (top, bottom) = self.data.split_at_mut((rows - 1 - row) * stride);
            top[row * stride..(row + 1) * stride].swap_with_slice(&mut bottom[..stride]);
        }
    }

    /// Nearest-neighbour rescale to `target`.
    pub fn resized(&self, target: Size) -> VideoFrame {
        if target == self.size() || target.is_empty() || self.size().is_empty() {
            return self.clone();
        }

        let mut output = vec![0u8; target.width as usize * target.height as usize * BYTES_PER_PIXEL];
        let x_ratio = self.width as f64 / target.width as f64;
        let y_ratio = self.height as f64 / target.height as f64;

        for y in 0..target.height {
            let src_y = ((y as f64 * y_ratio) as u32).min(self.height - 1);
            for x in 0..target.width {
                let src_x = ((x as f64 * x_ratio) as u32).min(self.width - 1);
                let src_idx = (src_y as usize * self.width as usize + src_x as usize) * BYTES_PER_PIXEL;
                let dst_idx = (y as usize * target.width as usize + x as usize) * BYTES_PER_PIXEL;
                output[dst_idx..dst_idx + BYTES_PER_PIXEL]
                    .copy_from_slice(&self.data[src_idx..src_idx + BYTES_PER_PIXEL]);
            }
        }

        VideoFrame {
            data: output,
            width: target.width,
            height: target.height,
            frame_number: self.frame_number,
            timestamp_us: self.timestamp_us,
        }
    }
}

/// Microseconds since the first call in this process. Never goes backwards.
pub fn monotonic_timestamp_us() -> i64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    i64::try_from(epoch.elapsed().as_micros()).unwrap_or(i64::MAX)
}

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

impl std::fmt::Display for TextureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "texture-{}", self.0)
    }
}

/// Outcome of pushing a frame into a [`FrameSurfaceTexture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Queued,
    /// All buffers busy; the frame was discarded.
    Dropped,
    /// The owning converter has been closed.
    Closed,
}

/// Handle to the texture stream a camera writes into.
///
/// Cloning shares the same stream. The capacity is the converter's buffer
/// count; a full stream drops the incoming frame rather than blocking the
/// camera thread.
#[derive(Debug, Clone)]
pub struct FrameSurfaceTexture {
    id: TextureId,
    tx: Sender<VideoFrame>,
    dropped: Arc<AtomicU64>,
}

impl FrameSurfaceTexture {
    pub(crate) fn bounded(capacity: usize) -> (Self, Receiver<VideoFrame>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        let texture = Self {
            id: TextureId(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed)),
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (texture, rx)
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn submit(&self, frame: VideoFrame) -> SubmitOutcome {
        match self.tx.try_send(frame) {
            Ok(()) => SubmitOutcome::Queued,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                SubmitOutcome::Dropped
            }
            Err(TrySendError::Disconnected(_)) => SubmitOutcome::Closed,
        }
    }

    /// Frames discarded because every buffer was in use.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn striped(width: u32, height: u32) -> VideoFrame {
        let mut data = Vec::new();
        for y in 0..height {
            for _ in 0..width {
                data.extend_from_slice(&[y as u8, 0, 0, 255]);
            }
        }
        VideoFrame::new(data, width, height, 0, 0).unwrap()
    }

    #[test]
    fn test_new_rejects_wrong_length() {
        let result = VideoFrame::new(vec![0; 10], 2, 2, 0, 0);
        assert!(matches!(result, Err(PreviewError::InvalidArgument(_))));
    }

    #[test]
    fn test_flip_vertical_reverses_rows() {
        let mut frame = striped(3, 3);
        frame.flip_vertical();
        assert_eq!(frame.pixel(0, 0).unwrap()[0], 2);
        assert_eq!(frame.pixel(2, 1).unwrap()[0], 1);
        assert_eq!(frame.pixel(1, 2).unwrap()[0], 0);
    }

    #[test]
    fn test_flip_vertical_even_height() {
        let mut frame = striped(2, 4);
        frame.flip_vertical();
        let rows: Vec<u8> = (0..4).map(|y| frame.pixel(0, y).unwrap()[0]).collect();
        assert_eq!(rows, vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_resized_keeps_metadata() {
        let frame = VideoFrame::filled(4, 4, [10, 20, 30, 255], 7, 1234);
        let scaled = frame.resized(Size::new(2, 8));
        assert_eq!(scaled.size(), Size::new(2, 8));
        assert_eq!(scaled.frame_number, 7);
        assert_eq!(scaled.timestamp_us, 1234);
        assert_eq!(scaled.pixel(1, 7), Some([10, 20, 30, 255]));
    }

    #[test]
    fn test_texture_drops_when_full() {
        let (texture, rx) = FrameSurfaceTexture::bounded(2);
        let frame = VideoFrame::filled(1, 1, [0; 4], 0, 0);

        assert_eq!(texture.submit(frame.clone()), SubmitOutcome::Queued);
        assert_eq!(texture.submit(frame.clone()), SubmitOutcome::Queued);
        assert_eq!(texture.submit(frame.clone()), SubmitOutcome::Dropped);
        assert_eq!(texture.dropped_frames(), 1);

        drop(rx);
        assert_eq!(texture.submit(frame), SubmitOutcome::Closed);
    }

    #[test]
    fn test_monotonic_timestamps() {
        let a = monotonic_timestamp_us();
        let b = monotonic_timestamp_us();
        assert!(a >= 0);
        assert!(b >= a);
    }

    #[test]
    fn test_texture_ids_are_unique() {
        let (a, _rx_a) = FrameSurfaceTexture::bounded(1);
        let (b, _rx_b) = FrameSurfaceTexture::bounded(1);
        assert_ne!(a.id(), b.id());
    }
}
