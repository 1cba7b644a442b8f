//! Window host: owns the event loop handler and drives one tick per redraw.

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::config::WindowConfig;
use crate::controls::ControlPanel;
use crate::error::SimulationError;
use crate::gpu::{GpuContext, SurfaceTarget};
use crate::math::Camera;
use crate::params::SurfaceSize;
use crate::scheduler::{FrameScheduler, StopHandle, TickOutcome};
use crate::session::Session;
use crate::shader::ShaderLibrary;

/// Everything that exists only while the window is open.
///
/// Fields drop in order, so the session goes before the device it uses.
struct Running {
    session: Session,
    surface: SurfaceTarget,
    context: GpuContext,
    window: Arc<Window>,
}

pub(crate) struct App {
    window_config: WindowConfig,
    shaders: ShaderLibrary,
    camera: Camera,
    scheduler: FrameScheduler<ControlPanel>,
    stop: StopHandle,
    running: Option<Running>,
    error: Option<SimulationError>,
}

impl App {
    pub(crate) fn new(
        window_config: WindowConfig,
        shaders: ShaderLibrary,
        camera: Camera,
        controls: ControlPanel,
        stop: StopHandle,
    ) -> Self {
        let scheduler = FrameScheduler::with_stop_handle(controls, stop.clone());
        Self {
            window_config,
            shaders,
            camera,
            scheduler,
            stop,
            running: None,
            error: None,
        }
    }

    /// The error that ended the loop, if any.
    pub(crate) fn into_result(self) -> Result<(), SimulationError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: SimulationError) {
        log::error!("{}", err);
        self.error = Some(err);
        self.shutdown(event_loop);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.stop.stop();
        self.running = None;
        event_loop.exit();
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<Running, SimulationError> {
        let attrs = Window::default_attributes()
            .with_title(self.window_config.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.window_config.width,
                self.window_config.height,
            ));
        let window = Arc::new(event_loop.create_window(attrs)?);

        let (context, surface) = pollster::block_on(GpuContext::with_window(window.clone()))?;

        let params = *self.scheduler.source().params();
        let session = Session::new(&context, &self.shaders, surface.format(), &params, self.camera)?;

        Ok(Running {
            session,
            surface,
            context,
            window,
        })
    }

    /// Draw one frame. Returns `false` once the loop should end.
    fn redraw(&mut self) -> Result<bool, SimulationError> {
        let Some(running) = &mut self.running else {
            return Ok(true);
        };

        let Some(frame) = running.surface.acquire(&running.context.device)? else {
            running.window.request_redraw();
            return Ok(true);
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        match self.scheduler.tick(&mut running.session, &view, running.surface.size())? {
            TickOutcome::Continue => {
                running.window.pre_present_notify();
                frame.present();
                if let Some(fps) = self.scheduler.take_fps_sample() {
                    log::trace!("{:.1} fps", fps);
                    running.window.set_title(&self.scheduler.stats().title(&self.window_config.title));
                }
                running.window.request_redraw();
                Ok(true)
            }
            TickOutcome::Stopped => Ok(false),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(running) => {
                running.window.request_redraw();
                self.running = Some(running);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::Resized(physical_size) => {
                if let Some(running) = &mut self.running {
                    running
                        .surface
                        .resize(&running.context.device, SurfaceSize::from(physical_size));
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                if code == KeyCode::Escape {
                    self.shutdown(event_loop);
                } else {
                    self.scheduler.source_mut().handle_key(code);
                }
            }
            WindowEvent::RedrawRequested => match self.redraw() {
                Ok(true) => {}
                Ok(false) => self.shutdown(event_loop),
                Err(err) => self.fail(event_loop, err),
            },
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.running = None;
    }
}
