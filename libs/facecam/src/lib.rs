// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Camera preview controller.
//!
//! Streams camera frames through an externally supplied processing graph and
//! presents the processed output on a display surface:
//!
//! ```text
//! CameraSource ──texture──► FrameConverter ──► GraphProcessor ──► DisplaySurface
//!      ▲                                                               ▲
//!      └──────────────── PreviewController (lifecycle) ───────────────┘
//! ```
//!
//! The host drives a [`PreviewController`] from one thread; camera, converter
//! and processor work happens on their own threads.

#![allow(clippy::type_complexity)] // Boxed collaborator traits are clear in context

pub mod core;

pub use crossbeam_channel;

pub use crate::core::*;
