// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Camera capture contract.
//!
//! The capture subsystem itself lives outside this crate. A [`CameraSource`]
//! is one capture session helper: the controller asks a [`CameraProvider`] for
//! a fresh source every time it (re)starts the camera and always stops the
//! previous source first.

use crossbeam_channel::Sender;

use crate::core::Result;
use crate::core::facing::CameraFacing;
use crate::core::frames::{FrameSurfaceTexture, TextureId};
use crate::core::geometry::Size;

/// Monotonic id of one camera start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Messages a camera sends back to the controller thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraEvent {
    /// The camera is delivering frames into `texture`.
    Started {
        session: SessionId,
        texture: TextureId,
        frame_size: Size,
    },
    Stopped { session: SessionId },
}

impl CameraEvent {
    pub fn session(&self) -> SessionId {
        match self {
            Self::Started { session, .. } | Self::Stopped { session } => *session,
        }
    }
}

/// Per-session sender for [`CameraEvent`]s.
#[derive(Debug, Clone)]
pub struct CameraNotifier {
    session: SessionId,
    tx: Sender<CameraEvent>,
}

impl CameraNotifier {
    pub fn new(session: SessionId, tx: Sender<CameraEvent>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn started(&self, texture: TextureId, frame_size: Size) {
        // The controller may already be gone during shutdown.
        let _ = self.tx.send(CameraEvent::Started {
            session: self.session,
            texture,
            frame_size,
        });
    }

    pub fn stopped(&self) {
        let _ = self.tx.send(CameraEvent::Stopped {
            session: self.session,
        });
    }
}

/// One camera capture session.
pub trait CameraSource: Send {
    /// Begin delivering frames into `texture`.
    ///
    /// Not idempotent: callers stop or replace a running source before starting
    /// another one. `notifier` receives `Started` once frames flow.
    fn start(
        &mut self,
        facing: CameraFacing,
        texture: FrameSurfaceTexture,
        notifier: CameraNotifier,
    ) -> Result<()>;

    /// Stop capture and release the texture. Safe to call repeatedly.
    fn stop(&mut self);

    /// Ideal display size for a view of `view_size`, or `None` until the
    /// camera has seen its first frame.
    fn compute_display_size(&self, view_size: Size) -> Option<Size>;

    /// Whether the sensor is rotated a quarter turn relative to the display.
    fn is_rotated(&self) -> bool;
}

/// Creates a fresh [`CameraSource`] for every camera start.
pub trait CameraProvider: Send {
    fn create(&mut self) -> Result<Box<dyn CameraSource>>;
}

impl<F> CameraProvider for F
where
    F: FnMut() -> Result<Box<dyn CameraSource>> + Send,
{
    fn create(&mut self) -> Result<Box<dyn CameraSource>> {
        self()
    }
}
