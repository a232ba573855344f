// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod assets;
pub mod authorization;
pub mod bridge;
pub mod camera;
pub mod config;
pub mod context;
pub mod controller;
pub mod display;
pub mod error;
pub mod facing;
pub mod frames;
pub mod geometry;
pub mod output;
pub mod processor;
pub mod sinks;
pub mod sources;
pub mod state;

pub use assets::{AssetSource, BundledAssets, DirectoryAssets};
pub use authorization::{Authorizer, CAMERA_PERMISSION, CAMERA_REQUEST_CODE, GrantResult, MemoryAuthorizer};
pub use bridge::{ConverterStats, DEFAULT_BUFFER_COUNT, FrameConverter};
pub use camera::{CameraEvent, CameraNotifier, CameraProvider, CameraSource, SessionId};
pub use config::PreviewConfig;
pub use context::{ContextLease, RenderContext};
pub use controller::{ControllerStats, PreviewController, PreviewControllerBuilder};
pub use display::{DetachedView, DisplaySurfaceController, PreviewView};
pub use error::*;
pub use facing::CameraFacing;
pub use frames::{FrameSurfaceTexture, SubmitOutcome, TextureId, VideoFrame, monotonic_timestamp_us};
pub use geometry::{Size, destination_size};
pub use output::{DestinationSurface, DisplaySurface, OutputStats, SurfaceId, SurfaceOutput, VideoOutput};
pub use processor::{
    DEFAULT_GRAPH_NAME, DEFAULT_INPUT_STREAM, DEFAULT_OUTPUT_STREAM, DefaultProcessorFactory,
    FrameConsumer, FrameProcessor, GraphConfig, GraphProcessor, GraphRunner, IdentityRunner,
    ProcessorFactory, ProcessorStats,
};
pub use sinks::HeadlessSurface;
pub use sources::{SyntheticCamera, SyntheticCameraConfig, SyntheticCameraProvider};
pub use state::{LifecycleCommand, LifecyclePhase, PreviewState, Transition};
