// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Frame-conversion bridge between the camera texture stream and a frame
//! consumer.
//!
//! A [`FrameConverter`] owns the render context lease for its whole lifetime
//! and runs a worker thread that:
//! 1. Receives frames the camera wrote into its [`FrameSurfaceTexture`]
//! 2. Keeps timestamps strictly increasing across camera switches and across
//!    converters sharing the same context
//! 3. Flips and rescales to the destination size
//! 4. Pushes the result into the consumer

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use crate::core::context::{ContextLease, RenderContext};
use crate::core::frames::{FrameSurfaceTexture, VideoFrame};
use crate::core::geometry::Size;
use crate::core::processor::FrameConsumer;
use crate::core::{PreviewError, Result};

pub const DEFAULT_BUFFER_COUNT: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConverterStats {
    pub forwarded: u64,
    /// Frames the consumer refused
    pub consumer_errors: u64,
    /// Frames received before a consumer was attached
    pub dropped_no_consumer: u64,
    /// Frames the camera could not queue because every buffer was busy
    pub dropped_busy: u64,
}

struct ConverterShared {
    consumer: RwLock<Option<Arc<dyn FrameConsumer>>>,
    destination: Mutex<Option<Size>>,
    flip_y: AtomicBool,
    forwarded: AtomicU64,
    consumer_errors: AtomicU64,
    dropped_no_consumer: AtomicU64,
}

impl ConverterShared {
    fn forward(
        &self,
        mut frame: VideoFrame,
        timestamps: &mut TimestampSequencer,
        context: &RenderContext,
    ) {
        let Some(consumer) = self.consumer.read().clone() else {
            self.dropped_no_consumer.fetch_add(1, Ordering::Relaxed);
            return;
        };

        frame.timestamp_us = timestamps.next(frame.timestamp_us);
        context.record_timestamp_us(frame.timestamp_us);
        if self.flip_y.load(Ordering::Relaxed) {
            frame.flip_vertical();
        }
        let destination = *self.destination.lock();
        if let Some(size) = destination {
            if size != frame.size() {
                frame = frame.resized(size);
            }
        }

        match consumer.on_new_frame(frame) {
            Ok(()) => {
                self.forwarded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                let errors = self.consumer_errors.fetch_add(1, Ordering::Relaxed) + 1;
                if errors == 1 || errors % 100 == 0 {
                    tracing::warn!("Consumer rejected frame ({} rejections so far): {}", errors, e);
                }
            }
        }
    }
}

/// Rewrites capture timestamps so they never go backwards.
///
/// A restarted camera begins a new clock; the first frame after such a jump is
/// shifted to one microsecond past the previous frame and the shift is kept
/// for the rest of the stream. Arithmetic saturates at the `i64` range.
#[derive(Debug, Default)]
struct TimestampSequencer {
    last: Option<i64>,
    offset: i64,
}

impl TimestampSequencer {
    /// Continue after `last`, the final timestamp of an earlier stream.
    fn resuming_after(last: Option<i64>) -> Self {
        Self { last, offset: 0 }
    }

    fn next(&mut self, raw: i64) -> i64 {
        let mut adjusted = raw.saturating_add(self.offset);
        if let Some(last) = self.last {
            if adjusted <= last {
                let floor = last.saturating_add(1);
                self.offset = self.offset.saturating_add(floor.saturating_sub(adjusted));
                adjusted = floor;
            }
        }
        self.last = Some(adjusted);
        adjusted
    }
}

pub struct FrameConverter {
    texture: FrameSurfaceTexture,
    shared: Arc<ConverterShared>,
    shutdown: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
    lease: Option<ContextLease>,
    generation: u64,
}

impl FrameConverter {
    /// Lease `context` and start the conversion worker.
    ///
    /// `buffer_count` bounds how many camera frames may wait for conversion.
    /// Fails with [`PreviewError::ContextBusy`] while another converter is
    /// alive on the same context.
    pub fn new(context: &RenderContext, buffer_count: usize) -> Result<Self> {
        if buffer_count == 0 {
            return Err(PreviewError::Configuration(
                "converter needs at least one buffer".to_string(),
            ));
        }

        let lease = context.acquire()?;
        let generation = lease.generation();
        let (texture, frames_rx) = FrameSurfaceTexture::bounded(buffer_count);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);

        let shared = Arc::new(ConverterShared {
            consumer: RwLock::new(None),
            destination: Mutex::new(None),
            flip_y: AtomicBool::new(false),
            forwarded: AtomicU64::new(0),
            consumer_errors: AtomicU64::new(0),
            dropped_no_consumer: AtomicU64::new(0),
        });

        let worker_shared = Arc::clone(&shared);
        let worker_context = context.clone();
        let worker = std::thread::Builder::new()
            .name(format!("frame-converter-{}", generation))
            .spawn(move || Self::run_worker(frames_rx, shutdown_rx, worker_shared, worker_context))
            .map_err(|e| PreviewError::Converter(format!("Failed to spawn converter thread: {}", e)))?;

        tracing::info!(
            "Frame converter {} started on context '{}' with {} buffers ({})",
            generation,
            context.label(),
            buffer_count,
            texture.id()
        );

        Ok(Self {
            texture,
            shared,
            shutdown: Some(shutdown_tx),
            worker: Some(worker),
            lease: Some(lease),
            generation,
        })
    }

    fn run_worker(
        frames: Receiver<VideoFrame>,
        shutdown: Receiver<()>,
        shared: Arc<ConverterShared>,
        context: RenderContext,
    ) {
        let mut timestamps = TimestampSequencer::resuming_after(context.last_timestamp_us());
        loop {
            crossbeam_channel::select! {
                recv(frames) -> msg => match msg {
                    Ok(frame) => shared.forward(frame, &mut timestamps, &context),
                    Err(_) => break,
                },
                recv(shutdown) -> _ => break,
            }
        }
        tracing::debug!("Frame converter worker exiting");
    }

    /// Texture the camera should write frames into.
    pub fn surface_texture(&self) -> FrameSurfaceTexture {
        self.texture.clone()
    }

    pub fn set_consumer(&self, consumer: Arc<dyn FrameConsumer>) {
        *self.shared.consumer.write() = Some(consumer);
    }

    pub fn set_flip_y(&self, flip_y: bool) {
        self.shared.flip_y.store(flip_y, Ordering::Relaxed);
    }

    pub fn set_destination_size(&self, size: Size) {
        tracing::debug!("Converter {} destination size {}", self.generation, size);
        *self.shared.destination.lock() = Some(size);
    }

    pub fn destination_size(&self) -> Option<Size> {
        *self.shared.destination.lock()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_closed(&self) -> bool {
        self.lease.is_none()
    }

    pub fn stats(&self) -> ConverterStats {
        ConverterStats {
            forwarded: self.shared.forwarded.load(Ordering::Relaxed),
            consumer_errors: self.shared.consumer_errors.load(Ordering::Relaxed),
            dropped_no_consumer: self.shared.dropped_no_consumer.load(Ordering::Relaxed),
            dropped_busy: self.texture.dropped_frames(),
        }
    }

    /// Stop the worker and release the render context. Idempotent.
    pub fn close(&mut self) {
        // Dropping the sender wakes the worker's select.
        self.shutdown.take();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::error!("Frame converter {} worker panicked", self.generation);
            }
        }
        if let Some(lease) = self.lease.take() {
            drop(lease);
            tracing::info!("Frame converter {} closed ({:?})", self.generation, self.stats());
        }
    }
}

impl Drop for FrameConverter {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    struct Collect(Mutex<Vec<VideoFrame>>);

    impl FrameConsumer for Collect {
        fn on_new_frame(&self, frame: VideoFrame) -> Result<()> {
            self.0.lock().push(frame);
            Ok(())
        }
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

    #[test]
    fn test_sequencer_keeps_timestamps_increasing() {
        let mut seq = TimestampSequencer::default();
        assert_eq!(seq.next(100), 100);
        assert_eq!(seq.next(200), 200);
        // Camera restarted with a fresh clock.
        assert_eq!(seq.next(0), 201);
        assert_eq!(seq.next(50), 251);
    }

    #[test]
    fn test_sequencer_saturates_on_extreme_timestamps() {
        let mut seq = TimestampSequencer::default();
        assert_eq!(seq.next(100), 100);
        assert_eq!(seq.next(i64::MIN), 101);
        assert_eq!(seq.next(i64::MIN + 5), 102);
        assert_eq!(seq.next(i64::MAX), i64::MAX);
        assert_eq!(seq.next(0), i64::MAX);

        let mut fresh = TimestampSequencer::default();
        assert_eq!(fresh.next(i64::MIN), i64::MIN);
        assert_eq!(fresh.next(i64::MAX), i64::MAX);
    }

    #[test]
    fn test_sequencer_resumes_after_previous_stream() {
        let mut seq = TimestampSequencer::resuming_after(Some(5_000));
        assert_eq!(seq.next(0), 5_001);
        assert_eq!(seq.next(33), 5_034);

        let mut first = TimestampSequencer::resuming_after(None);
        assert_eq!(first.next(0), 0);
    }

    #[test]
    fn test_next_converter_continues_timeline() {
        let context = RenderContext::new("test");
        let sink = Arc::new(Collect(Mutex::new(Vec::new())));

        let mut first = FrameConverter::new(&context, 2).unwrap();
        first.set_consumer(sink.clone());
        first.surface_texture().submit(VideoFrame::filled(1, 1, [0; 4], 0, 90_000));
        assert!(wait_for(|| sink.0.lock().len() == 1));
        first.close();
        assert_eq!(context.last_timestamp_us(), Some(90_000));

        // The camera behind the new converter starts its clock again.
        let second = FrameConverter::new(&context, 2).unwrap();
        second.set_consumer(sink.clone());
        second.surface_texture().submit(VideoFrame::filled(1, 1, [0; 4], 0, 0));
        assert!(wait_for(|| sink.0.lock().len() == 2));
        assert_eq!(sink.0.lock()[1].timestamp_us, 90_001);
    }

    #[test]
    fn test_zero_buffers_rejected() {
        let context = RenderContext::new("test");
        assert!(matches!(
            FrameConverter::new(&context, 0),
            Err(PreviewError::Configuration(_))
        ));
        assert!(!context.is_leased());
    }

    #[test]
    fn test_context_exclusive_until_close() {
        let context = RenderContext::new("test");
        let mut first = FrameConverter::new(&context, 2).unwrap();
        assert!(matches!(
            FrameConverter::new(&context, 2),
            Err(PreviewError::ContextBusy(_))
        ));

        first.close();
        first.close();
        assert!(first.is_closed());
        let second = FrameConverter::new(&context, 2).unwrap();
        assert_eq!(second.generation(), 2);
    }

    #[test]
    fn test_forwards_resized_and_flipped_frames() {
        let context = RenderContext::new("test");
        let converter = FrameConverter::new(&context, 2).unwrap();
        let sink = Arc::new(Collect(Mutex::new(Vec::new())));
        converter.set_consumer(sink.clone());
        converter.set_flip_y(true);
        converter.set_destination_size(Size::new(1, 4));

        let frame = VideoFrame::new(vec![1, 1, 1, 1, 2, 2, 2, 2], 1, 2, 0, 10).unwrap();
        converter.surface_texture().submit(frame);

        assert!(wait_for(|| !sink.0.lock().is_empty()));
        let received = sink.0.lock()[0].clone();
        assert_eq!(received.size(), Size::new(1, 4));
        assert_eq!(received.pixel(0, 0), Some([2, 2, 2, 2]));
        assert_eq!(received.pixel(0, 3), Some([1, 1, 1, 1]));
        assert_eq!(converter.stats().forwarded, 1);
    }

    #[test]
    fn test_frames_without_consumer_are_dropped() {
        let context = RenderContext::new("test");
        let converter = FrameConverter::new(&context, 2).unwrap();
        converter.surface_texture().submit(VideoFrame::filled(1, 1, [0; 4], 0, 0));

        assert!(wait_for(|| converter.stats().dropped_no_consumer == 1));
    }

    #[test]
    fn test_texture_closed_after_close() {
        let context = RenderContext::new("test");
        let mut converter = FrameConverter::new(&context, 2).unwrap();
        let texture = converter.surface_texture();
        converter.close();

        let outcome = texture.submit(VideoFrame::filled(1, 1, [0; 4], 0, 0));
        assert_eq!(outcome, crate::core::frames::SubmitOutcome::Closed);
    }
}
