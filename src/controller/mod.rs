//! Presentation controller
//!
//! Owns the settings record and the transient interaction state, derives
//! preview geometry, and issues host-window commands in reaction to state
//! transitions. The controller never talks to the camera or the GPU; it
//! only decides, and the app layer executes.
//!
//! Interaction state machine: `Idle` is initial; a primary press over the
//! preview enters `Dragging` (exited on release); a secondary press outside
//! an active drag enters `PanelOpen` (exited on explicit close or a primary
//! click outside the panel). Dragging and the panel are mutually exclusive,
//! with dragging taking precedence. Mouse passthrough is forced off in
//! either state.

pub mod geometry;
pub mod settings;

use egui::{Pos2, Vec2};

use crate::bridge::HostBridge;
use crate::camera::VideoDevice;

use geometry::{
    clamp_panel_anchor, hits_preview, preview_size, PreviewGeometry, HOST_PADDING,
    HOST_PADDING_WITH_PANEL,
};
use settings::{BehaviorMode, Settings, SettingsUpdate, ZOOM_STEP};

/// Default preview origin in surface-local logical coordinates
const INITIAL_ORIGIN: Pos2 = Pos2::new(100.0, 100.0);

/// Pixel-delta scroll distance that equals one discrete zoom step
const SCROLL_PIXELS_PER_STEP: f32 = 50.0;

/// Transient interaction state, separate from the settings record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interaction {
    Idle,
    /// Primary button held over the preview; `offset` is the initial
    /// pointer position minus the preview origin, so the preview follows
    /// the cursor without jumping.
    Dragging { offset: Vec2 },
    /// Settings panel open, anchored at a viewport-clamped position
    PanelOpen { anchor: Pos2 },
}

/// The overlay's presentation controller
pub struct OverlayController {
    mode: BehaviorMode,
    settings: Settings,
    interaction: Interaction,
    /// Preview origin; the only piece of derived geometry with its own
    /// state (everything else is recomputed from settings)
    origin: Pos2,
    /// Whether the pointer is currently over the visible preview. Starts
    /// true: until the cursor has actually been located the window must
    /// stay hittable, otherwise it could never receive the cursor event
    /// that seeds hover tracking.
    pointer_over_preview: bool,
    /// Last camera acquisition error, shown in place of the preview
    camera_error: Option<String>,
    /// Enumerated capture devices, refreshed on demand
    devices: Vec<VideoDevice>,
    /// Last passthrough state sent to the bridge, to avoid repeats
    passthrough_sent: Option<bool>,
    /// Host size last requested (including padding), for grow checks
    host_size_sent: Option<Vec2>,
    /// Pixel-delta scroll distance carried between wheel events
    scroll_accum: f32,
}

impl OverlayController {
    pub fn new(mode: BehaviorMode) -> Self {
        Self {
            mode,
            settings: Settings::default(),
            interaction: Interaction::Idle,
            origin: INITIAL_ORIGIN,
            pointer_over_preview: true,
            camera_error: None,
            devices: Vec::new(),
            passthrough_sent: None,
            host_size_sent: None,
            scroll_accum: 0.0,
        }
    }

    pub fn mode(&self) -> BehaviorMode {
        self.mode
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn interaction(&self) -> Interaction {
        self.interaction
    }

    pub fn devices(&self) -> &[VideoDevice] {
        &self.devices
    }

    pub fn camera_error(&self) -> Option<&str> {
        self.camera_error.as_deref()
    }

    pub fn set_camera_error(&mut self, error: Option<String>) {
        self.camera_error = error;
    }

    pub fn panel_anchor(&self) -> Option<Pos2> {
        match self.interaction {
            Interaction::PanelOpen { anchor } => Some(anchor),
            _ => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.interaction, Interaction::Dragging { .. })
    }

    pub fn is_panel_open(&self) -> bool {
        matches!(self.interaction, Interaction::PanelOpen { .. })
    }

    /// Whether the last passthrough command made the window unhittable.
    /// While engaged the window receives no cursor events, so the app
    /// drives hover re-detection from device-level mouse motion.
    pub fn passthrough_engaged(&self) -> bool {
        self.passthrough_sent == Some(true)
    }

    /// Current derived geometry (recomputed, never cached)
    pub fn geometry(&self) -> PreviewGeometry {
        let size = preview_size(self.settings.zoom, self.settings.shape);
        PreviewGeometry { origin: self.origin, width: size.x, height: size.y }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Settings & devices
    // ───────────────────────────────────────────────────────────────────────

    /// Merge a partial settings update and issue the host commands its
    /// changes require. Returns true when camera-affecting fields changed
    /// and the caller must re-apply camera settings.
    pub fn update_settings(
        &mut self,
        update: SettingsUpdate,
        bridge: &mut dyn HostBridge,
    ) -> bool {
        let before = self.settings.clone();
        self.settings.merge(update);

        if self.settings.always_on_top != before.always_on_top {
            bridge.set_always_on_top(self.settings.always_on_top);
        }
        if self.settings.zoom != before.zoom || self.settings.shape != before.shape {
            self.push_resize(bridge);
        }

        self.settings.camera_enabled != before.camera_enabled
            || self.settings.active_device_id != before.active_device_id
    }

    /// Store a refreshed device list. If no device is pinned and the list
    /// is non-empty, the first device is selected as a side effect; an
    /// empty list leaves the selection unset. Returns true when the
    /// selection changed.
    pub fn set_devices(&mut self, devices: Vec<VideoDevice>) -> bool {
        self.devices = devices;
        if self.settings.active_device_id.is_none() {
            if let Some(first) = self.devices.first() {
                log::info!("Auto-selecting camera {} ({})", first.id, first.label);
                self.settings.active_device_id = Some(first.id.clone());
                return true;
            }
        }
        false
    }

    // ───────────────────────────────────────────────────────────────────────
    // Input events
    // ───────────────────────────────────────────────────────────────────────

    /// Adjust zoom by one step per discrete scroll event: scroll up
    /// increases, scroll down decreases.
    pub fn on_wheel(&mut self, scroll_up: bool, bridge: &mut dyn HostBridge) {
        let delta = if scroll_up { ZOOM_STEP } else { -ZOOM_STEP };
        let before = self.settings.zoom;
        self.settings.adjust_zoom(delta);
        if self.settings.zoom != before {
            self.push_resize(bridge);
        }
    }

    /// Pixel-delta scrolling (touchpads emit many small events per swipe).
    /// Deltas accumulate and convert into discrete zoom steps, one per
    /// line-height's worth of travel; the remainder carries over.
    pub fn on_scroll_pixels(&mut self, dy: f32, bridge: &mut dyn HostBridge) {
        self.scroll_accum += dy;
        let steps = (self.scroll_accum / SCROLL_PIXELS_PER_STEP).trunc();
        self.scroll_accum -= steps * SCROLL_PIXELS_PER_STEP;
        for _ in 0..steps.abs() as u32 {
            self.on_wheel(steps > 0.0, bridge);
        }
    }

    /// Secondary press: open the settings panel at a viewport-clamped
    /// anchor. Ignored while dragging (dragging wins). The panel must stay
    /// clickable, so passthrough is disabled.
    pub fn on_context_menu(&mut self, point: Pos2, viewport: Vec2, bridge: &mut dyn HostBridge) {
        if self.is_dragging() {
            return;
        }
        self.interaction = Interaction::PanelOpen { anchor: clamp_panel_anchor(point, viewport) };
        self.sync_passthrough(bridge);
        self.push_resize(bridge);
    }

    /// Primary press: start dragging when the press lands on the preview.
    /// Closes an open panel (whether or not a drag starts). Returns true
    /// when a drag began.
    pub fn on_drag_start(&mut self, point: Pos2, bridge: &mut dyn HostBridge) -> bool {
        let was_panel_open = self.is_panel_open();
        if was_panel_open {
            self.interaction = Interaction::Idle;
            self.push_resize(bridge);
        }

        let over_preview = hits_preview(&self.geometry(), self.settings.shape, point);
        if !over_preview || !self.mode.allows_drag() {
            if was_panel_open {
                self.sync_passthrough(bridge);
            }
            return false;
        }

        self.interaction = Interaction::Dragging { offset: point - self.origin };
        self.sync_passthrough(bridge);
        true
    }

    /// Pointer move. While dragging, the preview origin tracks the pointer
    /// minus the press offset and the host grows when the preview would
    /// leave it; otherwise only the hover state updates.
    pub fn on_pointer_move(&mut self, point: Pos2, bridge: &mut dyn HostBridge) {
        match self.interaction {
            Interaction::Dragging { offset } => {
                self.origin = point - offset;
                let required = self.required_host_size() + Vec2::splat(HOST_PADDING);
                let grown = match self.host_size_sent {
                    Some(sent) => required.x > sent.x || required.y > sent.y,
                    None => true,
                };
                if grown {
                    self.push_resize(bridge);
                }
            }
            _ => {
                let over = hits_preview(&self.geometry(), self.settings.shape, point);
                if over != self.pointer_over_preview {
                    self.pointer_over_preview = over;
                    self.sync_passthrough(bridge);
                }
            }
        }
    }

    /// Primary release: end an active drag, re-evaluate passthrough
    /// against the current hover state, and fit the host to the moved
    /// preview (the drag itself only ever grows the host).
    pub fn on_drag_end(&mut self, point: Pos2, bridge: &mut dyn HostBridge) {
        if !self.is_dragging() {
            return;
        }
        self.interaction = Interaction::Idle;
        self.pointer_over_preview = hits_preview(&self.geometry(), self.settings.shape, point);
        self.sync_passthrough(bridge);
        self.push_resize(bridge);
    }

    /// Pointer entered the preview area: capture clicks again
    pub fn on_pointer_enter_preview(&mut self, bridge: &mut dyn HostBridge) {
        self.pointer_over_preview = true;
        self.sync_passthrough(bridge);
    }

    /// Pointer left the preview area: let clicks fall through, unless a
    /// drag is in progress or the panel is open
    pub fn on_pointer_leave_preview(&mut self, bridge: &mut dyn HostBridge) {
        self.pointer_over_preview = false;
        self.sync_passthrough(bridge);
    }

    /// Close the settings panel (explicit close or primary click outside
    /// it) and re-evaluate passthrough from the current hover state.
    pub fn close_panel(&mut self, bridge: &mut dyn HostBridge) {
        if !self.is_panel_open() {
            return;
        }
        self.interaction = Interaction::Idle;
        self.sync_passthrough(bridge);
        self.push_resize(bridge);
    }

    /// Issue an exit command to the host shell
    pub fn request_exit(&self, bridge: &mut dyn HostBridge) {
        bridge.request_exit();
    }

    // ───────────────────────────────────────────────────────────────────────
    // Derived host commands
    // ───────────────────────────────────────────────────────────────────────

    /// Whether pointer events should currently fall through the overlay
    fn passthrough_wanted(&self) -> bool {
        self.mode.allows_passthrough()
            && matches!(self.interaction, Interaction::Idle)
            && !self.pointer_over_preview
    }

    /// Push the passthrough state to the bridge when it changed
    fn sync_passthrough(&mut self, bridge: &mut dyn HostBridge) {
        let wanted = self.passthrough_wanted();
        if self.passthrough_sent != Some(wanted) {
            self.passthrough_sent = Some(wanted);
            bridge.set_mouse_passthrough(wanted, true);
        }
    }

    /// Extent the host must cover: the preview rect's far corner, origin
    /// included (the preview renders at `origin` inside the surface, so
    /// size alone would leave it clipped)
    fn required_host_size(&self) -> Vec2 {
        let geometry = self.geometry();
        Vec2::new(
            geometry.origin.x.max(0.0) + geometry.width,
            geometry.origin.y.max(0.0) + geometry.height,
        )
    }

    /// One resize command per change to (zoom, shape, origin, panel
    /// visibility)
    fn push_resize(&mut self, bridge: &mut dyn HostBridge) {
        let size = self.required_host_size();
        let padding =
            if self.is_panel_open() { HOST_PADDING_WITH_PANEL } else { HOST_PADDING };
        bridge.resize_host(size.x, size.y, padding);
        self.host_size_sent = Some(size + Vec2::splat(padding));
    }

    /// Issue the initial host state (always-on-top, passthrough, size)
    pub fn push_initial_state(&mut self, bridge: &mut dyn HostBridge) {
        bridge.set_always_on_top(self.settings.always_on_top);
        self.sync_passthrough(bridge);
        self.push_resize(bridge);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::recording::{Command, RecordingBridge};
    use settings::Shape;

    const VIEWPORT: Vec2 = Vec2::new(1200.0, 900.0);

    fn controller() -> OverlayController {
        OverlayController::new(BehaviorMode::ClickThroughOverlay)
    }

    fn device(id: &str) -> VideoDevice {
        VideoDevice { id: id.to_string(), label: format!("Camera {}", id) }
    }

    /// A point guaranteed to be on the default circle preview
    fn preview_center(c: &OverlayController) -> Pos2 {
        c.geometry().rect().center()
    }

    #[test]
    fn test_starts_idle() {
        let c = controller();
        assert_eq!(c.interaction(), Interaction::Idle);
        assert!(!c.is_dragging());
        assert!(!c.is_panel_open());
    }

    #[test]
    fn test_drag_follows_pointer_without_jumping() {
        let mut c = controller();
        let mut bridge = RecordingBridge::new();

        let press = preview_center(&c) + Vec2::new(10.0, 5.0);
        let origin_before = c.geometry().origin;
        assert!(c.on_drag_start(press, &mut bridge));
        assert!(c.is_dragging());

        let offset = press - origin_before;
        for step in [Vec2::new(30.0, 0.0), Vec2::new(-12.0, 44.0), Vec2::new(200.0, 200.0)] {
            let point = press + step;
            c.on_pointer_move(point, &mut bridge);
            assert_eq!(c.geometry().origin, point - offset);
        }

        c.on_drag_end(press + Vec2::new(200.0, 200.0), &mut bridge);
        assert_eq!(c.interaction(), Interaction::Idle);
    }

    #[test]
    fn test_drag_start_requires_preview_hit() {
        let mut c = controller();
        let mut bridge = RecordingBridge::new();
        assert!(!c.on_drag_start(Pos2::new(5.0, 5.0), &mut bridge));
        assert_eq!(c.interaction(), Interaction::Idle);
    }

    #[test]
    fn test_fixed_panel_mode_never_drags() {
        let mut c = OverlayController::new(BehaviorMode::FixedPanel);
        let mut bridge = RecordingBridge::new();
        let press = preview_center(&c);
        assert!(!c.on_drag_start(press, &mut bridge));
        assert_eq!(c.interaction(), Interaction::Idle);
    }

    #[test]
    fn test_context_menu_ignored_while_dragging() {
        let mut c = controller();
        let mut bridge = RecordingBridge::new();
        assert!(c.on_drag_start(preview_center(&c), &mut bridge));
        c.on_context_menu(Pos2::new(50.0, 50.0), VIEWPORT, &mut bridge);
        assert!(c.is_dragging());
        assert!(!c.is_panel_open());
    }

    #[test]
    fn test_drag_start_closes_panel() {
        let mut c = controller();
        let mut bridge = RecordingBridge::new();
        c.on_context_menu(Pos2::new(50.0, 50.0), VIEWPORT, &mut bridge);
        assert!(c.is_panel_open());
        assert!(c.on_drag_start(preview_center(&c), &mut bridge));
        assert!(c.is_dragging());
        assert!(!c.is_panel_open());
    }

    #[test]
    fn test_panel_anchor_is_clamped() {
        let mut c = controller();
        let mut bridge = RecordingBridge::new();
        c.on_context_menu(Pos2::new(1195.0, 895.0), VIEWPORT, &mut bridge);
        let anchor = c.panel_anchor().unwrap();
        assert!(anchor.x + geometry::PANEL_SIZE.x <= VIEWPORT.x);
        assert!(anchor.y + geometry::PANEL_SIZE.y <= VIEWPORT.y);
    }

    #[test]
    fn test_passthrough_matrix() {
        let mut c = controller();
        let mut bridge = RecordingBridge::new();
        c.push_initial_state(&mut bridge);
        // The cursor has not been located yet: stay hittable
        assert_eq!(bridge.last_passthrough(), Some(false));

        // Pointer located away from the preview: pass through
        c.on_pointer_leave_preview(&mut bridge);
        assert_eq!(bridge.last_passthrough(), Some(true));

        // Pointer over the preview: capture
        c.on_pointer_enter_preview(&mut bridge);
        assert_eq!(bridge.last_passthrough(), Some(false));

        // Pointer leaves: pass through again
        c.on_pointer_leave_preview(&mut bridge);
        assert_eq!(bridge.last_passthrough(), Some(true));

        // Panel open forces capture even with the pointer away
        c.on_context_menu(Pos2::new(10.0, 10.0), VIEWPORT, &mut bridge);
        assert_eq!(bridge.last_passthrough(), Some(false));
        c.on_pointer_leave_preview(&mut bridge);
        assert_eq!(bridge.last_passthrough(), Some(false));
    }

    #[test]
    fn test_capture_reengages_when_pointer_returns_to_preview() {
        let mut c = controller();
        let mut bridge = RecordingBridge::new();
        c.push_initial_state(&mut bridge);
        // Hittable until the cursor has actually been seen
        assert!(!c.passthrough_engaged());

        c.on_pointer_move(Pos2::new(5.0, 5.0), &mut bridge);
        assert!(c.passthrough_engaged());

        // Motion back over the preview must re-enable capture, or the
        // overlay would be permanently unreachable
        c.on_pointer_move(preview_center(&c), &mut bridge);
        assert!(!c.passthrough_engaged());
        assert_eq!(bridge.last_passthrough(), Some(false));
    }

    #[test]
    fn test_close_panel_passthrough_depends_on_hover() {
        // Pointer outside the preview: closing re-enables passthrough
        let mut c = controller();
        let mut bridge = RecordingBridge::new();
        c.on_context_menu(Pos2::new(10.0, 10.0), VIEWPORT, &mut bridge);
        c.on_pointer_move(Pos2::new(5.0, 5.0), &mut bridge);
        c.close_panel(&mut bridge);
        assert_eq!(bridge.last_passthrough(), Some(true));

        // Pointer inside the preview: closing keeps capture
        let mut c = controller();
        let mut bridge = RecordingBridge::new();
        let center = preview_center(&c);
        c.on_pointer_move(center, &mut bridge);
        c.on_context_menu(center, VIEWPORT, &mut bridge);
        c.close_panel(&mut bridge);
        assert_eq!(bridge.last_passthrough(), Some(false));
    }

    #[test]
    fn test_movable_window_mode_never_passes_through() {
        let mut c = OverlayController::new(BehaviorMode::MovableWindow);
        let mut bridge = RecordingBridge::new();
        c.push_initial_state(&mut bridge);
        c.on_pointer_leave_preview(&mut bridge);
        assert_eq!(bridge.last_passthrough(), Some(false));
    }

    #[test]
    fn test_wheel_zoom_clamped_and_resizes() {
        let mut c = controller();
        let mut bridge = RecordingBridge::new();
        for _ in 0..60 {
            c.on_wheel(true, &mut bridge);
            let zoom = c.settings().zoom;
            assert!((settings::ZOOM_MIN..=settings::ZOOM_MAX).contains(&zoom));
        }
        assert_eq!(c.settings().zoom, settings::ZOOM_MAX);
        let resizes_at_max = bridge.resize_count();
        // Further scrolling at the bound issues no redundant resize
        c.on_wheel(true, &mut bridge);
        assert_eq!(bridge.resize_count(), resizes_at_max);

        for _ in 0..60 {
            c.on_wheel(false, &mut bridge);
        }
        assert_eq!(c.settings().zoom, settings::ZOOM_MIN);
    }

    #[test]
    fn test_initial_resize_covers_preview_extent() {
        let mut c = controller();
        let mut bridge = RecordingBridge::new();
        c.push_initial_state(&mut bridge);

        // The preview sits at an offset origin inside the surface; the
        // host request must cover its far corner, not just its size
        let rect = c.geometry().rect();
        let (width, height, _) = bridge.last_resize().unwrap();
        assert!(width >= rect.max.x);
        assert!(height >= rect.max.y);
    }

    #[test]
    fn test_drag_resize_tracks_moved_origin() {
        let mut c = controller();
        let mut bridge = RecordingBridge::new();
        c.push_initial_state(&mut bridge);
        let press = preview_center(&c);
        assert!(c.on_drag_start(press, &mut bridge));

        // Dragging far right grows the host so the preview stays inside
        c.on_pointer_move(press + Vec2::new(500.0, 0.0), &mut bridge);
        let rect = c.geometry().rect();
        let (width, _, _) = bridge.last_resize().unwrap();
        assert!(width >= rect.max.x);

        // Dragging back and releasing fits the host to the new extent
        c.on_pointer_move(press, &mut bridge);
        c.on_drag_end(press, &mut bridge);
        let rect = c.geometry().rect();
        let (width, height, _) = bridge.last_resize().unwrap();
        assert!((width - rect.max.x).abs() < 1e-3);
        assert!(height >= rect.max.y);
    }

    #[test]
    fn test_pixel_scroll_accumulates_into_discrete_steps() {
        let mut c = controller();
        let mut bridge = RecordingBridge::new();

        // Small touchpad deltas below one step's travel change nothing
        for _ in 0..5 {
            c.on_scroll_pixels(8.0, &mut bridge);
        }
        assert_eq!(c.settings().zoom, 1.0);

        // Crossing the threshold emits exactly one step
        c.on_scroll_pixels(16.0, &mut bridge);
        assert!((c.settings().zoom - 1.1).abs() < 1e-4);

        // One long swipe emits multiple steps and stays clamped
        c.on_scroll_pixels(5000.0, &mut bridge);
        assert_eq!(c.settings().zoom, settings::ZOOM_MAX);

        // Reversing direction steps back down
        c.on_scroll_pixels(-60.0, &mut bridge);
        assert!(c.settings().zoom < settings::ZOOM_MAX);
    }

    #[test]
    fn test_update_settings_emits_targeted_commands() {
        let mut c = controller();
        let mut bridge = RecordingBridge::new();

        // always-on-top change emits exactly the bridge command
        c.update_settings(SettingsUpdate::always_on_top(false), &mut bridge);
        assert!(bridge.commands.contains(&Command::AlwaysOnTop(false)));

        // shape change emits one resize
        let before = bridge.resize_count();
        c.update_settings(SettingsUpdate::shape(Shape::Vertical), &mut bridge);
        assert_eq!(bridge.resize_count(), before + 1);

        // unrelated update emits nothing new
        let count = bridge.commands.len();
        c.update_settings(SettingsUpdate::opacity(0.5), &mut bridge);
        assert_eq!(bridge.commands.len(), count);
    }

    #[test]
    fn test_update_settings_reports_camera_changes() {
        let mut c = controller();
        let mut bridge = RecordingBridge::new();
        assert!(c.update_settings(SettingsUpdate::camera_enabled(false), &mut bridge));
        assert!(c.update_settings(SettingsUpdate::device(Some("1".into())), &mut bridge));
        assert!(!c.update_settings(SettingsUpdate::shape(Shape::Square), &mut bridge));
    }

    #[test]
    fn test_device_auto_selection() {
        let mut c = controller();
        // Empty enumeration leaves the selection unset
        assert!(!c.set_devices(Vec::new()));
        assert!(c.settings().active_device_id.is_none());

        // First non-empty enumeration selects the first device
        assert!(c.set_devices(vec![device("0"), device("1")]));
        assert_eq!(c.settings().active_device_id.as_deref(), Some("0"));

        // A later enumeration does not override an existing selection
        assert!(!c.set_devices(vec![device("5"), device("6")]));
        assert_eq!(c.settings().active_device_id.as_deref(), Some("0"));
    }

    #[test]
    fn test_camera_error_round_trip() {
        let mut c = controller();
        assert!(c.camera_error().is_none());
        c.set_camera_error(Some("Camera access was denied.".into()));
        assert_eq!(c.camera_error(), Some("Camera access was denied."));
        c.set_camera_error(None);
        assert!(c.camera_error().is_none());
    }

    #[test]
    fn test_exit_forwards_to_bridge() {
        let c = controller();
        let mut bridge = RecordingBridge::new();
        c.request_exit(&mut bridge);
        assert_eq!(bridge.commands, vec![Command::Exit]);
    }
}
