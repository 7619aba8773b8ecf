//! Application state holding the wgpu graphics context
//!
//! Glues the presentation controller to the real world: owns the wgpu
//! device/surface, uploads camera frames to a GPU texture, renders the
//! shape-clipped preview pass plus the egui UI, and executes the camera
//! side effects the controller decides on.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use egui::{Pos2, Vec2};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::window::Window;

use crate::bridge::{detect_bridge, ExitSignal, HostBridge};
use crate::camera::session::{CameraSession, SessionUpdate};
use crate::camera::{self, CameraFrame};
use crate::controller::settings::{BehaviorMode, Shape};
use crate::controller::OverlayController;
use crate::ui::{self, UiState};

/// Uniform parameters for the preview pass (matches preview.wgsl)
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct PreviewParams {
    rect_min: [f32; 2],
    rect_max: [f32; 2],
    surface_size: [f32; 2],
    tex_aspect: f32,
    opacity: f32,
    corner_radius: f32,
    shape_kind: u32,
    mirror: u32,
    _pad: f32,
}

/// Corner radius of the rounded shapes in logical pixels
const CORNER_RADIUS: f32 = 16.0;

/// Main application state
pub struct App {
    /// Reference to the window
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,

    // Overlay state
    controller: OverlayController,
    bridge: Box<dyn HostBridge>,

    // Camera
    session: CameraSession,
    camera_live: bool,
    camera_texture: Option<wgpu::Texture>,
    preview_bind_group: Option<wgpu::BindGroup>,
    last_camera_frame: u64,

    // Preview pipeline
    preview_pipeline: wgpu::RenderPipeline,
    preview_bind_group_layout: wgpu::BindGroupLayout,
    preview_params_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,

    // egui integration
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,

    // Cursor position in logical coordinates
    cursor_position: Pos2,
    // Cursor position in screen coordinates, kept alive through device
    // motion deltas while the window is unhittable
    global_cursor: Option<(f64, f64)>,
}

impl App {
    /// Create a new App instance with initialized wgpu context
    pub async fn new(window: Arc<Window>, mode: BehaviorMode, exit: ExitSignal) -> Self {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .expect("Failed to create surface");

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .expect("Failed to find suitable GPU adapter");

        log::info!("Using GPU: {}", adapter.get_info().name);
        log::info!("Backend: {:?}", adapter.get_info().backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Camera Overlay Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::MemoryUsage,
                },
                None,
            )
            .await
            .expect("Failed to create device");

        let surface_caps = surface.get_capabilities(&adapter);

        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        // The overlay background must stay transparent, so prefer an alpha
        // mode that composites the surface over the desktop.
        let alpha_mode = [
            wgpu::CompositeAlphaMode::PreMultiplied,
            wgpu::CompositeAlphaMode::PostMultiplied,
        ]
        .into_iter()
        .find(|m| surface_caps.alpha_modes.contains(m))
        .unwrap_or_else(|| {
            log::warn!("Surface does not support transparency, overlay will be opaque");
            surface_caps.alpha_modes[0]
        });

        log::info!("Surface format: {:?}, alpha mode: {:?}", surface_format, alpha_mode);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 1,
        };

        surface.configure(&device, &config);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Preview Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // Preview pipeline: camera texture -> shape-clipped quad
        let preview_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Preview Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/preview.wgsl").into()),
        });

        let preview_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Preview Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let preview_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Preview Pipeline Layout"),
                bind_group_layouts: &[&preview_bind_group_layout],
                push_constant_ranges: &[],
            });

        let preview_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Preview Pipeline"),
            layout: Some(&preview_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &preview_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &preview_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    // Premultiplied alpha over the transparent surface
                    blend: Some(wgpu::BlendState {
                        color: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::One,
                            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                            operation: wgpu::BlendOperation::Add,
                        },
                        alpha: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::One,
                            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                            operation: wgpu::BlendOperation::Add,
                        },
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let preview_params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Preview Params Buffer"),
            size: std::mem::size_of::<PreviewParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Initialize egui
        let egui_ctx = egui::Context::default();
        let mut style = (*egui_ctx.style()).clone();
        style.visuals.window_shadow = egui::epaint::Shadow::NONE;
        egui_ctx.set_style(style);

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        // Overlay controller and host bridge
        let mut bridge = detect_bridge(window.clone(), exit);
        let mut controller = OverlayController::new(mode);
        controller.push_initial_state(bridge.as_mut());

        // Initial device enumeration and camera start
        let mut session = CameraSession::new();
        controller.set_devices(camera::list_video_devices());
        session.apply(
            controller.settings().camera_enabled,
            controller.settings().active_device_id.as_deref(),
            controller.devices(),
        );

        Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            controller,
            bridge,
            session,
            camera_live: false,
            camera_texture: None,
            preview_bind_group: None,
            last_camera_frame: 0,
            preview_pipeline,
            preview_bind_group_layout,
            preview_params_buffer,
            sampler,
            egui_ctx,
            egui_state,
            egui_renderer,
            cursor_position: Pos2::ZERO,
            global_cursor: None,
        }
    }

    /// Handle a window event, returning true if egui consumed it
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(&self.window, event);
        response.consumed
    }

    /// Resize the surface
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Get current size
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    fn scale_factor(&self) -> f32 {
        self.window.scale_factor() as f32
    }

    /// Surface size in logical coordinates
    fn logical_size(&self) -> Vec2 {
        Vec2::new(self.config.width as f32, self.config.height as f32) / self.scale_factor()
    }

    // ───────────────────────────────────────────────────────────────────────
    // Input plumbing (physical event coordinates -> logical controller space)
    // ───────────────────────────────────────────────────────────────────────

    pub fn on_cursor_moved(&mut self, x: f64, y: f64) {
        if let Ok(origin) = self.window.inner_position() {
            self.global_cursor = Some((origin.x as f64 + x, origin.y as f64 + y));
        }
        let point = Pos2::new(x as f32, y as f32) / self.scale_factor();
        self.cursor_position = point;
        self.controller.on_pointer_move(point, self.bridge.as_mut());
    }

    pub fn on_cursor_left(&mut self) {
        self.controller.on_pointer_leave_preview(self.bridge.as_mut());
    }

    /// Device-level mouse motion, delivered regardless of hit-testing.
    /// While passthrough is engaged the window receives no cursor events,
    /// so hover re-detection runs off these deltas applied to the last
    /// known screen-space cursor position.
    pub fn on_device_mouse_motion(&mut self, dx: f64, dy: f64) {
        if !self.controller.passthrough_engaged() {
            return;
        }
        let Some(global) = self.global_cursor.as_mut() else { return };
        global.0 += dx;
        global.1 += dy;
        let (gx, gy) = *global;
        let Ok(origin) = self.window.inner_position() else { return };
        let point = Pos2::new((gx - origin.x as f64) as f32, (gy - origin.y as f64) as f32)
            / self.scale_factor();
        self.cursor_position = point;
        self.controller.on_pointer_move(point, self.bridge.as_mut());
    }

    pub fn on_mouse_input(&mut self, state: ElementState, button: MouseButton, egui_consumed: bool) {
        match (button, state) {
            (MouseButton::Left, ElementState::Pressed) => {
                if !egui_consumed {
                    self.controller.on_drag_start(self.cursor_position, self.bridge.as_mut());
                }
            }
            (MouseButton::Left, ElementState::Released) => {
                self.controller.on_drag_end(self.cursor_position, self.bridge.as_mut());
            }
            (MouseButton::Right, ElementState::Pressed) => {
                if !egui_consumed {
                    self.controller.on_context_menu(
                        self.cursor_position,
                        self.logical_size(),
                        self.bridge.as_mut(),
                    );
                    // The panel needs a current device list while it is open
                    self.refresh_devices();
                }
            }
            _ => {}
        }
    }

    pub fn on_mouse_wheel(&mut self, delta: MouseScrollDelta, egui_consumed: bool) {
        if egui_consumed {
            return;
        }
        match delta {
            MouseScrollDelta::LineDelta(_, y) => {
                if y != 0.0 {
                    self.controller.on_wheel(y > 0.0, self.bridge.as_mut());
                }
            }
            // Touchpads emit many small pixel deltas per swipe; the
            // controller accumulates them into discrete steps
            MouseScrollDelta::PixelDelta(pos) => {
                self.controller.on_scroll_pixels(pos.y as f32, self.bridge.as_mut());
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Camera side effects
    // ───────────────────────────────────────────────────────────────────────

    /// Re-enumerate devices; a fresh selection re-applies camera settings
    pub fn refresh_devices(&mut self) {
        if self.controller.set_devices(camera::list_video_devices()) {
            self.apply_camera_settings();
        }
    }

    /// Apply the current camera settings: release the previous stream and
    /// request a new one. Clears any previous acquisition error.
    pub fn apply_camera_settings(&mut self) {
        self.controller.set_camera_error(None);
        self.camera_live = false;
        self.last_camera_frame = 0;
        self.session.apply(
            self.controller.settings().camera_enabled,
            self.controller.settings().active_device_id.as_deref(),
            self.controller.devices(),
        );
    }

    /// Poll acquisition outcomes and new frames; upload frames to the GPU
    pub fn update_camera(&mut self) {
        for update in self.session.poll() {
            match update {
                SessionUpdate::Opened { label, width, height } => {
                    log::info!("Camera live: {} ({}x{})", label, width, height);
                    self.camera_live = true;
                    self.controller.set_camera_error(None);
                }
                SessionUpdate::Failed(error) => {
                    log::warn!("Camera acquisition failed: {}", error);
                    self.camera_live = false;
                    self.controller.set_camera_error(Some(error.to_string()));
                }
            }
        }

        let Some(frame) = self.session.latest_frame() else { return };
        if frame.frame_number <= self.last_camera_frame {
            return;
        }
        self.last_camera_frame = frame.frame_number;
        self.upload_frame(&frame);
    }

    /// Upload a camera frame, (re)creating the texture on size change
    fn upload_frame(&mut self, frame: &CameraFrame) {
        let needs_new_texture = match &self.camera_texture {
            None => true,
            Some(tex) => {
                let size = tex.size();
                size.width != frame.width || size.height != frame.height
            }
        };

        if needs_new_texture {
            log::info!("Creating camera texture: {}x{}", frame.width, frame.height);

            let camera_texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Camera Texture"),
                size: wgpu::Extent3d {
                    width: frame.width,
                    height: frame.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });

            let view = camera_texture.create_view(&wgpu::TextureViewDescriptor::default());

            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Preview Bind Group"),
                layout: &self.preview_bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.preview_params_buffer.as_entire_binding(),
                    },
                ],
            });

            self.camera_texture = Some(camera_texture);
            self.preview_bind_group = Some(bind_group);
        }

        if let Some(camera_texture) = &self.camera_texture {
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: camera_texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &frame.data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(frame.width * 4),
                    rows_per_image: Some(frame.height),
                },
                wgpu::Extent3d {
                    width: frame.width,
                    height: frame.height,
                    depth_or_array_layers: 1,
                },
            );
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Rendering
    // ───────────────────────────────────────────────────────────────────────

    /// Render a frame
    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Render Encoder") });

        // Clear to fully transparent
        {
            let _clear_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }

        // Preview pass: the last received frame stays visible through an
        // acquisition error (the error panel is drawn on top)
        if self.controller.settings().camera_enabled {
            if let Some(bind_group) = &self.preview_bind_group {
                let params = self.preview_params();
                self.queue
                    .write_buffer(&self.preview_params_buffer, 0, bytemuck::bytes_of(&params));

                let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Preview Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });

                render_pass.set_pipeline(&self.preview_pipeline);
                render_pass.set_bind_group(0, bind_group, &[]);
                render_pass.draw(0..3, 0..1);
            }
        }

        // UI pass
        self.render_ui(&mut encoder, &view);

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }

    /// Build the preview uniform from the current derived geometry
    fn preview_params(&self) -> PreviewParams {
        let scale = self.scale_factor();
        let geometry = self.controller.geometry();
        let rect = geometry.rect();
        let settings = self.controller.settings();

        let tex_aspect = self
            .camera_texture
            .as_ref()
            .map(|t| {
                let size = t.size();
                size.width as f32 / size.height.max(1) as f32
            })
            .unwrap_or(16.0 / 9.0);

        let shape_kind = match settings.shape {
            Shape::Circle => 0,
            Shape::Square => 1,
            Shape::Horizontal | Shape::Vertical => 2,
        };

        PreviewParams {
            rect_min: [rect.min.x * scale, rect.min.y * scale],
            rect_max: [rect.max.x * scale, rect.max.y * scale],
            surface_size: [self.config.width as f32, self.config.height as f32],
            tex_aspect,
            opacity: settings.opacity,
            corner_radius: CORNER_RADIUS * scale,
            shape_kind,
            mirror: 1,
            _pad: 0.0,
        }
    }

    fn render_ui(&mut self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let raw_input = self.egui_state.take_egui_input(&self.window);

        let state = UiState {
            settings: self.controller.settings().clone(),
            devices: self.controller.devices().to_vec(),
            panel_anchor: self.controller.panel_anchor(),
            camera_error: self.controller.camera_error().map(str::to_string),
            camera_live: self.camera_live,
            preview_rect: self.controller.geometry().rect(),
            surface_size: self.logical_size(),
        };

        let mut actions = ui::UiActions::default();
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            actions = ui::draw(ctx, &state);
        });

        // Apply UI actions
        if actions.close_panel {
            self.controller.close_panel(self.bridge.as_mut());
        }
        if actions.refresh_devices {
            self.refresh_devices();
        }
        if actions.retry_camera {
            self.apply_camera_settings();
        }
        if !actions.settings_update.is_empty() {
            let camera_changed =
                self.controller.update_settings(actions.settings_update, self.bridge.as_mut());
            if camera_changed {
                self.apply_camera_settings();
            }
        }
        if actions.exit {
            self.controller.request_exit(self.bridge.as_mut());
        }

        self.egui_state.handle_platform_output(&self.window, full_output.platform_output);

        let paint_jobs = self.egui_ctx.tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };

        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let render_pass_static: &mut wgpu::RenderPass<'static> =
                unsafe { std::mem::transmute(&mut render_pass) };

            self.egui_renderer.render(render_pass_static, &paint_jobs, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }

    /// Release the camera before the window goes away
    pub fn shut_down(&mut self) {
        self.session.shut_down();
    }
}
