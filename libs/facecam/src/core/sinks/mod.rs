// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Display surfaces.
//!
//! ## Available Sinks
//!
//! - **HeadlessSurface**: off-screen surface that counts presented frames

pub mod headless_surface;

pub use headless_surface::HeadlessSurface;
