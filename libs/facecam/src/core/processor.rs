// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Graph processor contract and the in-crate frame processor.
//!
//! The processing graph is an opaque, externally compiled resource identified
//! by name. This crate never interprets it: a [`GraphRunner`] is the seam where
//! an execution engine plugs in, and [`IdentityRunner`] passes frames through
//! untouched.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::frames::VideoFrame;
use crate::core::output::{OutputStats, SurfaceOutput, VideoOutput};
use crate::core::{PreviewError, Result};

pub const DEFAULT_GRAPH_NAME: &str = "face_pixelization_live_gpu.binarypb";
pub const DEFAULT_INPUT_STREAM: &str = "input_video";
pub const DEFAULT_OUTPUT_STREAM: &str = "output_video";

/// Named graph plus the stream tags frames enter and leave through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub graph_name: String,
    pub input_stream: String,
    pub output_stream: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            graph_name: DEFAULT_GRAPH_NAME.to_string(),
            input_stream: DEFAULT_INPUT_STREAM.to_string(),
            output_stream: DEFAULT_OUTPUT_STREAM.to_string(),
        }
    }
}

impl GraphConfig {
    pub fn new(
        graph_name: impl Into<String>,
        input_stream: impl Into<String>,
        output_stream: impl Into<String>,
    ) -> Self {
        Self {
            graph_name: graph_name.into(),
            input_stream: input_stream.into(),
            output_stream: output_stream.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("graph_name", &self.graph_name),
            ("input_stream", &self.input_stream),
            ("output_stream", &self.output_stream),
        ] {
            if value.trim().is_empty() {
                return Err(PreviewError::Configuration(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }
}

/// Anything that accepts converted frames.
pub trait FrameConsumer: Send + Sync {
    fn on_new_frame(&self, frame: VideoFrame) -> Result<()>;
}

/// Frame sink that runs a processing graph and renders its video output.
pub trait GraphProcessor: FrameConsumer {
    fn graph(&self) -> &GraphConfig;

    fn video_output(&self) -> &dyn VideoOutput;

    /// This processor as the consumer end of a frame converter.
    fn as_consumer(self: Arc<Self>) -> Arc<dyn FrameConsumer>;

    /// Stop processing. Frames pushed afterwards are rejected.
    fn close(&self) -> Result<()>;
}

/// Builds the graph processor when the preview is activated.
pub trait ProcessorFactory: Send {
    fn create(&mut self, graph: &GraphConfig) -> Result<Arc<dyn GraphProcessor>>;
}

impl<F> ProcessorFactory for F
where
    F: FnMut(&GraphConfig) -> Result<Arc<dyn GraphProcessor>> + Send,
{
    fn create(&mut self, graph: &GraphConfig) -> Result<Arc<dyn GraphProcessor>> {
        self(graph)
    }
}

/// Factory for [`FrameProcessor`] with the identity runner.
#[derive(Debug, Default)]
pub struct DefaultProcessorFactory;

impl ProcessorFactory for DefaultProcessorFactory {
    fn create(&mut self, graph: &GraphConfig) -> Result<Arc<dyn GraphProcessor>> {
        Ok(Arc::new(FrameProcessor::new(graph.clone())?))
    }
}

/// One processing step applied to every frame on its way to the output.
pub trait GraphRunner: Send {
    fn run(&mut self, graph: &GraphConfig, frame: VideoFrame) -> Result<VideoFrame>;
}

#[derive(Debug, Default)]
pub struct IdentityRunner;

impl GraphRunner for IdentityRunner {
    fn run(&mut self, _graph: &GraphConfig, frame: VideoFrame) -> Result<VideoFrame> {
        Ok(frame)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub accepted: u64,
    pub rejected: u64,
    pub output: OutputStats,
}

struct RunnerState {
    runner: Box<dyn GraphRunner>,
    last_timestamp_us: Option<i64>,
    closed: bool,
}

/// In-crate [`GraphProcessor`].
///
/// Frame timestamps must be strictly increasing; anything else is rejected
/// with [`PreviewError::InvalidArgument`]. After [`GraphProcessor::close`]
/// every frame fails with [`PreviewError::FailedPrecondition`].
pub struct FrameProcessor {
    graph: GraphConfig,
    state: Mutex<RunnerState>,
    output: SurfaceOutput,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl FrameProcessor {
    pub fn new(graph: GraphConfig) -> Result<Self> {
        Self::with_runner(graph, Box::new(IdentityRunner))
    }

    pub fn with_runner(graph: GraphConfig, runner: Box<dyn GraphRunner>) -> Result<Self> {
        graph.validate()?;
        tracing::info!(
            "Created frame processor for graph '{}' ({} -> {})",
            graph.graph_name,
            graph.input_stream,
            graph.output_stream
        );
        Ok(Self {
            graph,
            state: Mutex::new(RunnerState {
                runner,
                last_timestamp_us: None,
                closed: false,
            }),
            output: SurfaceOutput::new(),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        })
    }

    pub fn stats(&self) -> ProcessorStats {
        ProcessorStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            output: self.output.stats(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn process(&self, frame: VideoFrame) -> Result<VideoFrame> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PreviewError::FailedPrecondition(format!(
                "graph '{}' is closed",
                self.graph.graph_name
            )));
        }
        if let Some(last) = state.last_timestamp_us {
            if frame.timestamp_us <= last {
                return Err(PreviewError::InvalidArgument(format!(
                    "timestamp {} is not greater than previous {}",
                    frame.timestamp_us, last
                )));
            }
        }
        state.last_timestamp_us = Some(frame.timestamp_us);
        state.runner.run(&self.graph, frame)
    }
}

impl FrameConsumer for FrameProcessor {
    fn on_new_frame(&self, frame: VideoFrame) -> Result<()> {
        let processed = match self.process(frame) {
            Ok(processed) => processed,
            Err(e) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.output.render(processed)?;
        Ok(())
    }
}

impl GraphProcessor for FrameProcessor {
    fn graph(&self) -> &GraphConfig {
        &self.graph
    }

    fn video_output(&self) -> &dyn VideoOutput {
        &self.output
    }

    fn as_consumer(self: Arc<Self>) -> Arc<dyn FrameConsumer> {
        self
    }

    fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.closed {
            state.closed = true;
            tracing::info!("Closed graph '{}'", self.graph.graph_name);
        }
        Ok(())
    }
}
