// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Preview lifecycle orchestration.
//!
//! [`PreviewController`] owns every collaborator of a preview session and is
//! driven from a single thread by the host: lifecycle callbacks, surface
//! callbacks, the facing toggle, and [`PreviewController::pump_events`] for
//! messages sent by camera threads. Each input runs a [`PreviewState`]
//! transition and then executes the returned commands in order.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::core::assets::{AssetSource, BundledAssets, DirectoryAssets};
use crate::core::authorization::{Authorizer, GrantResult};
use crate::core::bridge::{ConverterStats, FrameConverter};
use crate::core::camera::{CameraEvent, CameraNotifier, CameraProvider, CameraSource, SessionId};
use crate::core::config::PreviewConfig;
use crate::core::context::RenderContext;
use crate::core::display::{DetachedView, DisplaySurfaceController, PreviewView};
use crate::core::facing::CameraFacing;
use crate::core::geometry::Size;
use crate::core::output::DestinationSurface;
use crate::core::processor::{DefaultProcessorFactory, GraphProcessor, ProcessorFactory};
use crate::core::state::{LifecycleCommand, LifecyclePhase, PreviewState, Transition};
use crate::core::{PreviewError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    pub camera_starts: u64,
    pub camera_stops: u64,
    pub converter_creations: u64,
    pub events_handled: u64,
    /// Events from sessions that had already been replaced
    pub stale_events: u64,
}

struct ActiveCamera {
    session: SessionId,
    source: Box<dyn CameraSource>,
}

/// Builder for [`PreviewController`].
///
/// A camera provider and an authorizer are required. Assets default to the
/// configured asset directory (or bundled assets), the processor to
/// [`DefaultProcessorFactory`], and the view to [`DetachedView`].
pub struct PreviewControllerBuilder {
    config: PreviewConfig,
    camera_provider: Option<Box<dyn CameraProvider>>,
    authorizer: Option<Box<dyn Authorizer>>,
    assets: Option<Box<dyn AssetSource>>,
    processor_factory: Option<Box<dyn ProcessorFactory>>,
    view: Option<Box<dyn PreviewView>>,
    context: Option<RenderContext>,
}

impl PreviewControllerBuilder {
    pub fn new(config: PreviewConfig) -> Self {
        Self {
            config,
            camera_provider: None,
            authorizer: None,
            assets: None,
            processor_factory: None,
            view: None,
            context: None,
        }
    }

    pub fn camera_provider(mut self, provider: impl CameraProvider + 'static) -> Self {
        self.camera_provider = Some(Box::new(provider));
        self
    }

    pub fn authorizer(mut self, authorizer: impl Authorizer + 'static) -> Self {
        self.authorizer = Some(Box::new(authorizer));
        self
    }

    pub fn assets(mut self, assets: impl AssetSource + 'static) -> Self {
        self.assets = Some(Box::new(assets));
        self
    }

    pub fn processor_factory(mut self, factory: impl ProcessorFactory + 'static) -> Self {
        self.processor_factory = Some(Box::new(factory));
        self
    }

    pub fn view(mut self, view: impl PreviewView + 'static) -> Self {
        self.view = Some(Box::new(view));
        self
    }

    /// Share an existing render context instead of creating one.
    pub fn render_context(mut self, context: RenderContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn build(self) -> Result<PreviewController> {
        self.config.validate()?;

        let camera_provider = self.camera_provider.ok_or_else(|| {
            PreviewError::Configuration("a camera provider is required".to_string())
        })?;
        let authorizer = self
            .authorizer
            .ok_or_else(|| PreviewError::Configuration("an authorizer is required".to_string()))?;

        let assets: Box<dyn AssetSource> = match (self.assets, &self.config.asset_dir) {
            (Some(assets), _) => assets,
            (None, Some(dir)) => Box::new(DirectoryAssets::new(dir.clone())),
            (None, None) => Box::new(BundledAssets::default()),
        };
        let processor_factory = self
            .processor_factory
            .unwrap_or_else(|| Box::new(DefaultProcessorFactory));
        let context = self
            .context
            .unwrap_or_else(|| RenderContext::new(self.config.context_label.clone()));
        let (events_tx, events_rx) = crossbeam_channel::unbounded();

        Ok(PreviewController {
            state: PreviewState::new(self.config.initial_facing),
            config: self.config,
            context,
            camera_provider,
            authorizer,
            assets,
            processor_factory,
            view: self.view,
            processor: None,
            display: None,
            converter: None,
            camera: None,
            events_tx,
            events_rx,
            stats: ControllerStats::default(),
        })
    }
}

pub struct PreviewController {
    config: PreviewConfig,
    state: PreviewState,
    context: RenderContext,
    camera_provider: Box<dyn CameraProvider>,
    authorizer: Box<dyn Authorizer>,
    assets: Box<dyn AssetSource>,
    processor_factory: Box<dyn ProcessorFactory>,
    view: Option<Box<dyn PreviewView>>,
    processor: Option<Arc<dyn GraphProcessor>>,
    display: Option<DisplaySurfaceController>,
    converter: Option<FrameConverter>,
    camera: Option<ActiveCamera>,
    events_tx: Sender<CameraEvent>,
    events_rx: Receiver<CameraEvent>,
    stats: ControllerStats,
}

impl PreviewController {
    pub fn builder(config: PreviewConfig) -> PreviewControllerBuilder {
        PreviewControllerBuilder::new(config)
    }

    // =========================================================================
    // Lifecycle entry points
    // =========================================================================

    /// Initialize assets, build the processor and the hidden display, then
    /// request camera authorization.
    pub fn activate(&mut self) -> Result<()> {
        tracing::info!("Activating preview");
        let transition = self.take_state().activate();
        self.apply(transition)
    }

    /// Create a fresh converter and start the camera when authorized.
    pub fn resume(&mut self) -> Result<()> {
        let authorized = self.authorizer.is_authorized();
        tracing::info!("Resuming preview (authorized: {})", authorized);
        let transition = self.take_state().resume(authorized);
        self.apply(transition)
    }

    /// Close the converter, stop the camera and hide the display.
    pub fn suspend(&mut self) -> Result<()> {
        tracing::info!("Suspending preview");
        let transition = self.take_state().suspend();
        self.apply(transition)
    }

    /// Forward an authorization decision, then start the camera if it was
    /// granted while the preview is in the foreground.
    pub fn on_authorization_result(
        &mut self,
        request_code: i32,
        permissions: &[String],
        grant_results: &[GrantResult],
    ) -> Result<()> {
        self.authorizer
            .on_authorization_result(request_code, permissions, grant_results);
        let authorized = self.authorizer.is_authorized();
        let transition = self.take_state().authorization_changed(authorized);
        self.apply(transition)
    }

    pub fn toggle_camera_facing(&mut self) -> Result<()> {
        let authorized = self.authorizer.is_authorized();
        let transition = self.take_state().toggle_facing(authorized);
        tracing::info!("Camera facing toggled to {}", transition.state.facing);
        self.apply(transition)
    }

    /// Tear everything down. Further lifecycle calls are ignored.
    pub fn destroy(&mut self) -> Result<()> {
        if self.state.phase == LifecyclePhase::Destroyed {
            return Ok(());
        }
        tracing::info!("Destroying preview");
        let transition = self.take_state().destroy();
        self.apply(transition)
    }

    // =========================================================================
    // Camera events
    // =========================================================================

    /// Handle every camera event already queued. Returns how many were handled.
    pub fn pump_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for a camera event, then drain the queue.
    pub fn pump_events_timeout(&mut self, timeout: Duration) -> usize {
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => {
                self.handle_event(event);
                1 + self.pump_events()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn handle_event(&mut self, event: CameraEvent) {
        self.stats.events_handled += 1;
        if self.state.camera != Some(event.session()) {
            self.stats.stale_events += 1;
            tracing::debug!("Ignoring {:?} from superseded {}", event, event.session());
        }
        if let CameraEvent::Started { frame_size, texture, session } = &event {
            tracing::debug!("{} started: {} into {}", session, frame_size, texture);
        }

        let transition = self.take_state().camera_event(&event);
        if let Err(e) = self.apply(transition) {
            tracing::warn!("Failed to handle camera event: {}", e);
        }
    }

    // =========================================================================
    // Surface callbacks
    // =========================================================================

    pub fn surface_created(&mut self, surface: DestinationSurface) {
        match self.display.as_mut() {
            Some(display) => display.surface_created(surface),
            None => tracing::warn!("Surface {} created before the display exists", surface.id()),
        }
    }

    /// Recompute the destination size for a view of `width` x `height`.
    pub fn surface_changed(&mut self, width: u32, height: u32) -> Option<Size> {
        let Some(display) = self.display.as_mut() else {
            tracing::warn!("Surface changed before the display exists");
            return None;
        };
        let camera = self.camera.as_ref().map(|active| active.source.as_ref());
        Some(display.surface_changed(Size::new(width, height), camera, self.converter.as_ref()))
    }

    /// Unbind the processor's destination. No frame reaches the old surface
    /// once this returns.
    pub fn surface_destroyed(&mut self) {
        if let Some(display) = self.display.as_mut() {
            display.surface_destroyed();
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn state(&self) -> &PreviewState {
        &self.state
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.state.phase
    }

    pub fn facing(&self) -> CameraFacing {
        self.state.facing
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub fn render_context(&self) -> &RenderContext {
        &self.context
    }

    pub fn is_camera_active(&self) -> bool {
        self.camera.is_some()
    }

    pub fn is_converter_alive(&self) -> bool {
        self.converter.as_ref().is_some_and(|c| !c.is_closed())
    }

    pub fn converter_stats(&self) -> Option<ConverterStats> {
        self.converter.as_ref().map(FrameConverter::stats)
    }

    pub fn is_display_visible(&self) -> bool {
        self.display.as_ref().is_some_and(DisplaySurfaceController::is_visible)
    }

    pub fn destination_size(&self) -> Option<Size> {
        self.display.as_ref().and_then(DisplaySurfaceController::destination_size)
    }

    pub fn processor(&self) -> Option<&Arc<dyn GraphProcessor>> {
        self.processor.as_ref()
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    // =========================================================================
    // Command execution
    // =========================================================================

    fn take_state(&mut self) -> PreviewState {
        std::mem::take(&mut self.state)
    }

    /// Install the new state and run its commands. Every command runs even if
    /// an earlier one failed; the first error is returned.
    fn apply(&mut self, transition: Transition) -> Result<()> {
        self.state = transition.state;
        let mut first_error = None;
        for command in transition.commands {
            tracing::trace!("Executing {:?}", command);
            if let Err(e) = self.execute(command) {
                tracing::error!("{:?} failed: {}", command, e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn execute(&mut self, command: LifecycleCommand) -> Result<()> {
        match command {
            LifecycleCommand::InitializeAssets => {
                self.assets.initialize()?;
                let graph = self.assets.resolve(&self.config.graph.graph_name)?;
                tracing::debug!("Graph resolved to {}", graph.display());
                Ok(())
            }
            LifecycleCommand::CreateProcessor => {
                let processor = self.processor_factory.create(&self.config.graph)?;
                processor.video_output().set_flip_y(self.config.flip_y);
                self.processor = Some(processor);
                Ok(())
            }
            LifecycleCommand::CreateDisplay => {
                let processor = self.require_processor()?;
                let view = self.view.take().unwrap_or_else(|| Box::new(DetachedView));
                self.display = Some(DisplaySurfaceController::new(view, processor));
                Ok(())
            }
            LifecycleCommand::RequestAuthorization => {
                self.authorizer.request_camera_authorization();
                Ok(())
            }
            LifecycleCommand::CreateConverter => self.create_converter(),
            LifecycleCommand::CloseConverter => {
                if let Some(mut converter) = self.converter.take() {
                    converter.close();
                }
                Ok(())
            }
            LifecycleCommand::StartCamera { session, facing } => {
                let result = self.start_camera(session, facing);
                if result.is_err() {
                    self.state = self.take_state().camera_failed(session);
                }
                result
            }
            LifecycleCommand::StopCamera { session } => {
                self.stop_camera(session);
                Ok(())
            }
            LifecycleCommand::ShowDisplay => {
                if let Some(display) = self.display.as_mut() {
                    display.show();
                }
                Ok(())
            }
            LifecycleCommand::HideDisplay => {
                if let Some(display) = self.display.as_mut() {
                    display.hide();
                }
                Ok(())
            }
            LifecycleCommand::CloseProcessor => match self.processor.as_ref() {
                Some(processor) => processor.close(),
                None => Ok(()),
            },
        }
    }

    fn require_processor(&self) -> Result<Arc<dyn GraphProcessor>> {
        self.processor
            .clone()
            .ok_or_else(|| PreviewError::FailedPrecondition("graph processor was not created".to_string()))
    }

    fn create_converter(&mut self) -> Result<()> {
        if let Some(mut previous) = self.converter.take() {
            tracing::warn!("Replacing converter {} that was still open", previous.generation());
            previous.close();
        }

        let created = self.require_processor().and_then(|processor| {
            let converter = FrameConverter::new(&self.context, self.config.converter_buffers)?;
            converter.set_flip_y(self.config.flip_y);
            converter.set_consumer(processor.as_consumer());
            Ok(converter)
        });
        let converter = match created {
            Ok(converter) => converter,
            Err(e) => {
                self.state.converter_alive = false;
                return Err(e);
            }
        };

        if let Some(display) = self.display.as_ref() {
            display.apply_destination(&converter);
        }
        self.stats.converter_creations += 1;
        self.converter = Some(converter);
        Ok(())
    }

    fn start_camera(&mut self, session: SessionId, facing: CameraFacing) -> Result<()> {
        if let Some(previous) = self.camera.as_ref().map(|active| active.session) {
            self.stop_camera(previous);
        }
        let texture = self
            .converter
            .as_ref()
            .map(FrameConverter::surface_texture)
            .ok_or_else(|| PreviewError::FailedPrecondition("no live frame converter".to_string()))?;

        let mut source = self.camera_provider.create()?;
        let notifier = CameraNotifier::new(session, self.events_tx.clone());
        source.start(facing, texture, notifier)?;

        tracing::info!("Started {} camera ({})", facing, session);
        self.stats.camera_starts += 1;
        self.camera = Some(ActiveCamera { session, source });
        Ok(())
    }

    fn stop_camera(&mut self, session: SessionId) {
        let Some(mut active) = self.camera.take() else {
            return;
        };
        if active.session != session {
            tracing::warn!("Stopping {} while {} was requested", active.session, session);
        }
        active.source.stop();
        self.stats.camera_stops += 1;
        tracing::info!("Stopped camera ({})", active.session);
    }
}

impl Drop for PreviewController {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            tracing::warn!("Error while dropping preview controller: {}", e);
        }
    }
}
