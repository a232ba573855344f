// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::core::frames::VideoFrame;
use crate::core::geometry::Size;
use crate::core::output::{DisplaySurface, SurfaceId};
use crate::core::{PreviewError, Result};

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// Off-screen [`DisplaySurface`] that records what was presented.
///
/// After [`HeadlessSurface::mark_destroyed`] any presentation fails and is
/// counted, which makes use-after-destroy observable.
#[derive(Debug)]
pub struct HeadlessSurface {
    id: SurfaceId,
    presented: AtomicU64,
    presented_after_destroy: AtomicU64,
    destroyed: AtomicBool,
    last_frame: Mutex<Option<(Size, u64, i64)>>,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self {
            id: SurfaceId(NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed)),
            presented: AtomicU64::new(0),
            presented_after_destroy: AtomicU64::new(0),
            destroyed: AtomicBool::new(false),
            last_frame: Mutex::new(None),
        }
    }

    pub fn mark_destroyed(&self) {
        self.destroyed.store(true, Ordering::Release);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub fn presented(&self) -> u64 {
        self.presented.load(Ordering::Relaxed)
    }

    pub fn presented_after_destroy(&self) -> u64 {
        self.presented_after_destroy.load(Ordering::Relaxed)
    }

    /// Size of the most recently presented frame.
    pub fn last_size(&self) -> Option<Size> {
        self.last_frame.lock().map(|(size, _, _)| size)
    }

    /// Timestamp of the most recently presented frame.
    pub fn last_timestamp_us(&self) -> Option<i64> {
        self.last_frame.lock().map(|(_, _, ts)| ts)
    }
}

impl DisplaySurface for HeadlessSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn present(&self, frame: &VideoFrame) -> Result<()> {
        if self.is_destroyed() {
            self.presented_after_destroy.fetch_add(1, Ordering::Relaxed);
            return Err(PreviewError::Surface(format!("{} has been destroyed", self.id)));
        }
        self.presented.fetch_add(1, Ordering::Relaxed);
        *self.last_frame.lock() = Some((frame.size(), frame.frame_number, frame.timestamp_us));
        Ok(())
    }
}
