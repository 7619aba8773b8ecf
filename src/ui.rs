//! Overlay UI
//!
//! egui surfaces drawn on top of the preview: the settings panel (opened by
//! secondary click), the camera status/error panel, and the bottom hint
//! strip. The app collects a state snapshot, runs the UI, and applies the
//! returned actions afterwards, so nothing here borrows the app.

use egui::{Align2, Color32, Pos2, Rect, RichText, Vec2};

use crate::camera::VideoDevice;
use crate::controller::settings::{Settings, SettingsUpdate, Shape, OPACITY_MAX, OPACITY_MIN};

/// Snapshot of everything the UI reads
pub struct UiState {
    pub settings: Settings,
    pub devices: Vec<VideoDevice>,
    pub panel_anchor: Option<Pos2>,
    pub camera_error: Option<String>,
    pub camera_live: bool,
    pub preview_rect: Rect,
    pub surface_size: Vec2,
}

/// Everything the UI asks the app to do
#[derive(Default)]
pub struct UiActions {
    pub settings_update: SettingsUpdate,
    pub close_panel: bool,
    pub refresh_devices: bool,
    pub retry_camera: bool,
    pub exit: bool,
}

/// Draw all overlay UI for one frame
pub fn draw(ctx: &egui::Context, state: &UiState) -> UiActions {
    let mut actions = UiActions::default();
    draw_preview_status(ctx, state, &mut actions);
    if let Some(anchor) = state.panel_anchor {
        draw_panel(ctx, state, anchor, &mut actions);
    }
    draw_hint(ctx, state.surface_size);
    actions
}

/// Camera-off placeholder or acquisition error with a retry control,
/// centered on the preview rect. Everything else stays functional while an
/// error is shown.
fn draw_preview_status(ctx: &egui::Context, state: &UiState, actions: &mut UiActions) {
    let message: Option<(RichText, bool)> = if let Some(err) = &state.camera_error {
        Some((RichText::new(err.as_str()).color(Color32::from_rgb(0xf8, 0x71, 0x71)), true))
    } else if !state.settings.camera_enabled {
        Some((RichText::new("Camera is off").color(Color32::GRAY), false))
    } else if !state.camera_live {
        Some((RichText::new("Connecting…").color(Color32::GRAY), false))
    } else {
        None
    };

    let Some((text, retryable)) = message else { return };

    egui::Area::new(egui::Id::new("preview_status"))
        .pivot(Align2::CENTER_CENTER)
        .fixed_pos(state.preview_rect.center())
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                ui.set_max_width(state.preview_rect.width() * 0.8);
                ui.vertical_centered(|ui| {
                    ui.label(text);
                    if retryable && ui.button("Retry").clicked() {
                        actions.retry_camera = true;
                    }
                });
            });
        });
}

/// The settings panel, fixed at the clamped context-menu anchor
fn draw_panel(ctx: &egui::Context, state: &UiState, anchor: Pos2, actions: &mut UiActions) {
    let mut open = true;

    egui::Window::new("Control Panel")
        .open(&mut open)
        .fixed_pos(anchor)
        .movable(false)
        .resizable(false)
        .collapsible(false)
        .show(ctx, |ui| {
            // Camera on/off
            let mut camera_enabled = state.settings.camera_enabled;
            if ui.checkbox(&mut camera_enabled, "Camera enabled").changed() {
                actions.settings_update.camera_enabled = Some(camera_enabled);
            }

            ui.separator();

            // Device selection
            ui.label("Device");
            let selected_label = state
                .settings
                .active_device_id
                .as_ref()
                .and_then(|id| state.devices.iter().find(|d| &d.id == id))
                .map(|d| d.label.clone())
                .unwrap_or_else(|| "No devices found".to_string());
            ui.horizontal(|ui| {
                egui::ComboBox::from_id_salt("device_select")
                    .selected_text(selected_label)
                    .show_ui(ui, |ui| {
                        for device in &state.devices {
                            let selected =
                                state.settings.active_device_id.as_deref() == Some(&device.id);
                            if ui.selectable_label(selected, &device.label).clicked() {
                                actions.settings_update.active_device_id =
                                    Some(Some(device.id.clone()));
                            }
                        }
                    });
                if ui.button("Refresh").clicked() {
                    actions.refresh_devices = true;
                }
            });

            ui.separator();

            // Shape grid (2x2)
            ui.label("Shape");
            let shapes = Shape::all();
            for row in shapes.chunks(2) {
                ui.horizontal(|ui| {
                    for &shape in row {
                        if ui
                            .selectable_label(state.settings.shape == shape, shape.label())
                            .clicked()
                        {
                            actions.settings_update.shape = Some(shape);
                        }
                    }
                });
            }

            ui.separator();

            // Opacity
            let mut opacity = state.settings.opacity;
            if ui
                .add(
                    egui::Slider::new(&mut opacity, OPACITY_MIN..=OPACITY_MAX)
                        .step_by(0.05)
                        .text("Opacity"),
                )
                .changed()
            {
                actions.settings_update.opacity = Some(opacity);
            }

            // Always on top
            let mut on_top = state.settings.always_on_top;
            if ui.checkbox(&mut on_top, "Always on top").changed() {
                actions.settings_update.always_on_top = Some(on_top);
            }

            ui.separator();

            if ui
                .button(RichText::new("Quit Overlay").color(Color32::from_rgb(0xf8, 0x71, 0x71)))
                .clicked()
            {
                actions.exit = true;
            }
        });

    if !open {
        actions.close_panel = true;
    }
}

/// Bottom hint strip, non-interactive
fn draw_hint(ctx: &egui::Context, surface_size: Vec2) {
    egui::Area::new(egui::Id::new("hint_strip"))
        .pivot(Align2::CENTER_BOTTOM)
        .fixed_pos(Pos2::new(surface_size.x / 2.0, surface_size.y - 12.0))
        .interactable(false)
        .show(ctx, |ui| {
            ui.label(
                RichText::new("Scroll: zoom  •  Right-click: settings  •  Drag: move")
                    .small()
                    .color(Color32::from_white_alpha(140)),
            );
        });
}
