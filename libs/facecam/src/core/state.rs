// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Preview lifecycle state machine.
//!
//! Every lifecycle input is a pure transform of [`PreviewState`] that returns
//! the next state plus the [`LifecycleCommand`]s the controller must execute,
//! in order. Keeping the transforms free of side effects lets the sequencing
//! rules be tested without any camera, converter, or surface.
//!
//! # Phases
//!
//! ```text
//! ┌─────────┐ activate() ┌─────────┐ resume() ┌─────────┐
//! │ Initial │───────────►│ Created │─────────►│ Resumed │◄─┐
//! └─────────┘            └─────────┘          └────┬────┘  │
//!                                                  │       │ resume()
//!                                        suspend() ▼       │
//!                                             ┌────────┐   │
//!                                             │ Paused │───┘
//!                                             └────────┘
//! destroy() from any phase after Initial ──► Destroyed
//! ```

use crate::core::camera::{CameraEvent, SessionId};
use crate::core::facing::CameraFacing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecyclePhase {
    #[default]
    Initial,
    Created,
    Resumed,
    Paused,
    Destroyed,
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => write!(f, "Initial"),
            Self::Created => write!(f, "Created"),
            Self::Resumed => write!(f, "Resumed"),
            Self::Paused => write!(f, "Paused"),
            Self::Destroyed => write!(f, "Destroyed"),
        }
    }
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleCommand {
    InitializeAssets,
    CreateProcessor,
    /// Build the display surface controller, initially hidden.
    CreateDisplay,
    RequestAuthorization,
    CreateConverter,
    CloseConverter,
    StartCamera {
        session: SessionId,
        facing: CameraFacing,
    },
    StopCamera {
        session: SessionId,
    },
    ShowDisplay,
    HideDisplay,
    CloseProcessor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewState {
    pub phase: LifecyclePhase,
    pub facing: CameraFacing,
    pub converter_alive: bool,
    /// Session of the camera currently running, if any
    pub camera: Option<SessionId>,
    /// Whether the current session has reported `Started`
    pub camera_started: bool,
    pub display_visible: bool,
    next_session: u64,
}

/// Result of applying one lifecycle input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: PreviewState,
    pub commands: Vec<LifecycleCommand>,
}

impl Transition {
    fn unchanged(state: PreviewState) -> Self {
        Self {
            state,
            commands: Vec::new(),
        }
    }
}

impl Default for PreviewState {
    fn default() -> Self {
        Self::new(CameraFacing::default())
    }
}

impl PreviewState {
    pub fn new(facing: CameraFacing) -> Self {
        Self {
            phase: LifecyclePhase::Initial,
            facing,
            converter_alive: false,
            camera: None,
            camera_started: false,
            display_visible: false,
            next_session: 1,
        }
    }

    pub fn activate(self) -> Transition {
        if self.phase != LifecyclePhase::Initial {
            return Transition::unchanged(self);
        }
        let mut state = self;
        state.phase = LifecyclePhase::Created;
        Transition {
            state,
            commands: vec![
                LifecycleCommand::InitializeAssets,
                LifecycleCommand::CreateProcessor,
                LifecycleCommand::CreateDisplay,
                LifecycleCommand::RequestAuthorization,
            ],
        }
    }

    /// Bring the preview to the foreground.
    ///
    /// A live converter is closed before its replacement is created, so a
    /// repeated resume never leaves two converters holding the context. A
    /// running camera is stopped before the texture it writes into is closed.
    pub fn resume(self, authorized: bool) -> Transition {
        match self.phase {
            LifecyclePhase::Created | LifecyclePhase::Paused | LifecyclePhase::Resumed => {}
            LifecyclePhase::Initial | LifecyclePhase::Destroyed => return Transition::unchanged(self),
        }

        let mut state = self;
        let mut commands = Vec::new();
        if let Some(session) = state.camera.take() {
            commands.push(LifecycleCommand::StopCamera { session });
            state.camera_started = false;
        }
        if state.converter_alive {
            commands.push(LifecycleCommand::CloseConverter);
        }
        commands.push(LifecycleCommand::CreateConverter);
        state.converter_alive = true;
        state.phase = LifecyclePhase::Resumed;

        if authorized {
            state.restart_camera(&mut commands);
        }
        Transition { state, commands }
    }

    /// Send the preview to the background. Safe in any phase.
    pub fn suspend(self) -> Transition {
        if self.phase != LifecyclePhase::Resumed {
            return Transition::unchanged(self);
        }
        let mut state = self;
        let mut commands = Vec::new();
        state.release(&mut commands);
        state.phase = LifecyclePhase::Paused;
        Transition { state, commands }
    }

    /// Explicit start-on-grant: a fresh grant while resumed and idle starts
    /// the camera.
    pub fn authorization_changed(self, authorized: bool) -> Transition {
        if !authorized || self.phase != LifecyclePhase::Resumed || self.camera.is_some() {
            return Transition::unchanged(self);
        }
        let mut state = self;
        let mut commands = Vec::new();
        state.restart_camera(&mut commands);
        Transition { state, commands }
    }

    /// Flip the facing. While resumed and authorized the running session is
    /// replaced by a new one; otherwise the facing applies at the next start.
    pub fn toggle_facing(self, authorized: bool) -> Transition {
        let mut state = self;
        state.facing = state.facing.toggled();
        let mut commands = Vec::new();
        if authorized && state.phase == LifecyclePhase::Resumed {
            state.restart_camera(&mut commands);
        }
        Transition { state, commands }
    }

    pub fn camera_event(self, event: &CameraEvent) -> Transition {
        let current = self.camera == Some(event.session());
        let mut state = self;
        let mut commands = Vec::new();

        match event {
            CameraEvent::Started { .. } if current && state.phase == LifecyclePhase::Resumed => {
                state.camera_started = true;
                if !state.display_visible {
                    state.display_visible = true;
                    commands.push(LifecycleCommand::ShowDisplay);
                }
            }
            CameraEvent::Stopped { .. } if current => {
                state.camera_started = false;
            }
            _ => {}
        }
        Transition { state, commands }
    }

    /// Roll back after a `StartCamera` command failed to execute.
    pub fn camera_failed(self, session: SessionId) -> PreviewState {
        let mut state = self;
        if state.camera == Some(session) {
            state.camera = None;
            state.camera_started = false;
        }
        state
    }

    pub fn destroy(self) -> Transition {
        if matches!(self.phase, LifecyclePhase::Initial | LifecyclePhase::Destroyed) {
            let mut state = self;
            state.phase = LifecyclePhase::Destroyed;
            return Transition::unchanged(state);
        }
        let mut state = self;
        let mut commands = Vec::new();
        state.release(&mut commands);
        commands.push(LifecycleCommand::CloseProcessor);
        state.phase = LifecyclePhase::Destroyed;
        Transition { state, commands }
    }

    fn restart_camera(&mut self, commands: &mut Vec<LifecycleCommand>) {
        if let Some(session) = self.camera.take() {
            commands.push(LifecycleCommand::StopCamera { session });
        }
        let session = SessionId(self.next_session);
        self.next_session += 1;
        self.camera = Some(session);
        self.camera_started = false;
        commands.push(LifecycleCommand::StartCamera {
            session,
            facing: self.facing,
        });
    }

    fn release(&mut self, commands: &mut Vec<LifecycleCommand>) {
        if let Some(session) = self.camera.take() {
            commands.push(LifecycleCommand::StopCamera { session });
        }
        self.camera_started = false;
        if self.converter_alive {
            commands.push(LifecycleCommand::CloseConverter);
            self.converter_alive = false;
        }
        commands.push(LifecycleCommand::HideDisplay);
        self.display_visible = false;
    }
}
