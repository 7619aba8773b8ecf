//! Camera Overlay - Main Entry Point
//!
//! Creates the borderless transparent overlay window and drives the
//! event loop. Input events are translated into controller calls; the
//! controller talks back to the window through the host bridge.

use std::sync::Arc;
use std::time::{Duration, Instant};

use camera_overlay::bridge::ExitSignal;
use camera_overlay::controller::settings::BehaviorMode;
use camera_overlay::App;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{DeviceEvent, DeviceId, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId, WindowLevel};

const WINDOW_TITLE: &str = "Camera Overlay";
const DEFAULT_WIDTH: u32 = 400;
const DEFAULT_HEIGHT: u32 = 400;
const TARGET_FPS: u32 = 60;

/// Behavior mode selection, e.g. `CAMERA_OVERLAY_MODE=window`
const MODE_ENV: &str = "CAMERA_OVERLAY_MODE";

/// Application state machine
enum AppState {
    /// Initial state before the window is created
    Uninitialized,
    /// Window and graphics context are ready
    Running { window: Arc<Window>, app: App },
}

/// Main application handler implementing winit's ApplicationHandler trait
struct OverlayApp {
    state: AppState,
    mode: BehaviorMode,
    exit: ExitSignal,
    next_redraw_at: Instant,
}

impl OverlayApp {
    fn new(mode: BehaviorMode) -> Self {
        Self {
            state: AppState::Uninitialized,
            mode,
            exit: ExitSignal::new(),
            next_redraw_at: Instant::now(),
        }
    }
}

impl ApplicationHandler for OverlayApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let AppState::Uninitialized = &self.state {
            log::info!("Creating overlay window (mode: {:?})...", self.mode);

            let window_attributes = WindowAttributes::default()
                .with_title(WINDOW_TITLE)
                .with_inner_size(LogicalSize::new(DEFAULT_WIDTH, DEFAULT_HEIGHT))
                .with_decorations(false)
                .with_transparent(true)
                .with_window_level(WindowLevel::AlwaysOnTop);

            let window = Arc::new(
                event_loop
                    .create_window(window_attributes)
                    .expect("Failed to create window"),
            );

            log::info!(
                "Window created: {}x{}",
                window.inner_size().width,
                window.inner_size().height
            );

            let app = pollster::block_on(App::new(window.clone(), self.mode, self.exit.clone()));

            log::info!("Camera Overlay ready (scroll: zoom, right-click: settings)");

            self.state = AppState::Running { window, app };
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let AppState::Running { window: _, app } = &mut self.state else {
            return;
        };

        // Let egui handle the event first
        let egui_consumed = app.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting...");
                event_loop.exit();
            }

            WindowEvent::Resized(physical_size) => {
                app.resize(physical_size);
            }

            WindowEvent::CursorMoved { position, .. } => {
                app.on_cursor_moved(position.x, position.y);
            }

            WindowEvent::CursorLeft { .. } => {
                app.on_cursor_left();
            }

            WindowEvent::MouseInput { state, button, .. } => {
                app.on_mouse_input(state, button, egui_consumed);
            }

            WindowEvent::MouseWheel { delta, .. } => {
                app.on_mouse_wheel(delta, egui_consumed);
            }

            WindowEvent::RedrawRequested => {
                app.update_camera();

                match app.render() {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => {
                        log::warn!("Surface lost, reconfiguring...");
                        app.resize(app.size());
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of GPU memory!");
                        event_loop.exit();
                    }
                    Err(e) => {
                        log::warn!("Surface error: {:?}", e);
                    }
                }
            }

            _ => {}
        }

        // The bridge raises the exit flag; the loop owns the actual exit
        if self.exit.is_raised() {
            app.shut_down();
            event_loop.exit();
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        // Window cursor events stop while the overlay is click-through;
        // device motion keeps hover re-detection alive.
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if let AppState::Running { app, .. } = &mut self.state {
                app.on_device_mouse_motion(dx, dy);
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let AppState::Running { window, .. } = &mut self.state else {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        };

        // Drive redraws at target FPS
        let frame_duration = Duration::from_nanos(1_000_000_000u64 / TARGET_FPS as u64);
        let now = Instant::now();

        if now >= self.next_redraw_at {
            window.request_redraw();
            self.next_redraw_at = now + frame_duration;
        }

        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_redraw_at));
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Camera Overlay v{}", env!("CARGO_PKG_VERSION"));

    let mode = std::env::var(MODE_ENV)
        .ok()
        .and_then(|v| {
            let parsed = BehaviorMode::from_env_value(&v);
            if parsed.is_none() {
                log::warn!("Unrecognized {}={:?}, using default mode", MODE_ENV, v);
            }
            parsed
        })
        .unwrap_or_default();

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = OverlayApp::new(mode);
    event_loop.run_app(&mut app).expect("Event loop error");
}
