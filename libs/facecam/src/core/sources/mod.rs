// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Camera sources.
//!
//! ## Available Sources
//!
//! - **SyntheticCamera**: gradient frames from a background thread, for hosts
//!   without capture hardware

pub mod synthetic_camera;

pub use synthetic_camera::{SyntheticCamera, SyntheticCameraConfig, SyntheticCameraProvider};
