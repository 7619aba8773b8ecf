//! Overlay settings record
//!
//! A single flat, mutable settings record owned by the controller, updated
//! through partial merges. Zoom and opacity are clamped on every write path
//! so the record never holds an out-of-range value.

/// Zoom bounds for the preview (base dimension multiplier)
pub const ZOOM_MIN: f32 = 0.4;
pub const ZOOM_MAX: f32 = 4.0;

/// Zoom change per discrete scroll step
pub const ZOOM_STEP: f32 = 0.1;

/// Opacity bounds for the preview
pub const OPACITY_MIN: f32 = 0.1;
pub const OPACITY_MAX: f32 = 1.0;

/// Clipping shape applied to the preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// 1:1, clipped to a circle
    Circle,
    /// 1:1, no corner clipping
    Square,
    /// 16:9, rounded corners
    Horizontal,
    /// 3:4 portrait, rounded corners
    Vertical,
}

impl Shape {
    /// Aspect ratio as height / width
    pub fn aspect(self) -> f32 {
        match self {
            Shape::Circle | Shape::Square => 1.0,
            Shape::Horizontal => 9.0 / 16.0,
            Shape::Vertical => 4.0 / 3.0,
        }
    }

    /// Display name for the settings panel
    pub fn label(self) -> &'static str {
        match self {
            Shape::Circle => "Circle",
            Shape::Square => "Square",
            Shape::Horizontal => "Wide",
            Shape::Vertical => "Portrait",
        }
    }

    /// All shapes in panel order
    pub fn all() -> [Shape; 4] {
        [Shape::Circle, Shape::Square, Shape::Horizontal, Shape::Vertical]
    }
}

/// How the overlay behaves as a window
///
/// The three observed usages of this kind of overlay differ only in whether
/// the preview is draggable and whether pointer events ever fall through to
/// underlying windows. One controller covers all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BehaviorMode {
    /// Borderless overlay that is click-through everywhere except over the
    /// visible preview (default)
    #[default]
    ClickThroughOverlay,
    /// Ordinary movable window; pointer events are always captured
    MovableWindow,
    /// Fixed-position borderless panel; no dragging, no passthrough
    FixedPanel,
}

impl BehaviorMode {
    /// Parse a mode from its environment-variable spelling
    pub fn from_env_value(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "overlay" | "click-through" | "clickthrough" => Some(Self::ClickThroughOverlay),
            "window" | "movable" => Some(Self::MovableWindow),
            "fixed" | "panel" => Some(Self::FixedPanel),
            _ => None,
        }
    }

    /// Whether the preview may be dragged in this mode
    pub fn allows_drag(self) -> bool {
        !matches!(self, BehaviorMode::FixedPanel)
    }

    /// Whether pointer events may ever fall through to underlying windows
    pub fn allows_passthrough(self) -> bool {
        matches!(self, BehaviorMode::ClickThroughOverlay)
    }
}

/// Overlay settings (the single source of truth for derived geometry)
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub shape: Shape,
    pub zoom: f32,
    pub opacity: f32,
    pub always_on_top: bool,
    /// Pinned capture device; `None` requests the default device
    pub active_device_id: Option<String>,
    pub camera_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shape: Shape::Circle,
            zoom: 1.0,
            opacity: 1.0,
            always_on_top: true,
            active_device_id: None,
            camera_enabled: true,
        }
    }
}

impl Settings {
    /// Merge a partial update into the record, preserving unspecified
    /// fields. Zoom and opacity are clamped; no other validation is done.
    pub fn merge(&mut self, update: SettingsUpdate) {
        if let Some(shape) = update.shape {
            self.shape = shape;
        }
        if let Some(zoom) = update.zoom {
            self.zoom = zoom.clamp(ZOOM_MIN, ZOOM_MAX);
        }
        if let Some(opacity) = update.opacity {
            self.opacity = opacity.clamp(OPACITY_MIN, OPACITY_MAX);
        }
        if let Some(on_top) = update.always_on_top {
            self.always_on_top = on_top;
        }
        if let Some(device) = update.active_device_id {
            self.active_device_id = device;
        }
        if let Some(enabled) = update.camera_enabled {
            self.camera_enabled = enabled;
        }
    }

    /// Adjust zoom by `delta`, clamped to the valid range
    pub fn adjust_zoom(&mut self, delta: f32) {
        self.zoom = (self.zoom + delta).clamp(ZOOM_MIN, ZOOM_MAX);
    }
}

/// Partial settings update; `None` fields are left untouched.
///
/// `active_device_id` is doubly optional: the outer `Option` is "change or
/// not", the inner one is "pin a device or fall back to the default".
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub shape: Option<Shape>,
    pub zoom: Option<f32>,
    pub opacity: Option<f32>,
    pub always_on_top: Option<bool>,
    pub active_device_id: Option<Option<String>>,
    pub camera_enabled: Option<bool>,
}

impl SettingsUpdate {
    /// True when no field is set (merging would be a no-op)
    pub fn is_empty(&self) -> bool {
        self.shape.is_none()
            && self.zoom.is_none()
            && self.opacity.is_none()
            && self.always_on_top.is_none()
            && self.active_device_id.is_none()
            && self.camera_enabled.is_none()
    }

    pub fn shape(shape: Shape) -> Self {
        Self { shape: Some(shape), ..Default::default() }
    }

    pub fn opacity(opacity: f32) -> Self {
        Self { opacity: Some(opacity), ..Default::default() }
    }

    pub fn always_on_top(on_top: bool) -> Self {
        Self { always_on_top: Some(on_top), ..Default::default() }
    }

    pub fn camera_enabled(enabled: bool) -> Self {
        Self { camera_enabled: Some(enabled), ..Default::default() }
    }

    pub fn device(device: Option<String>) -> Self {
        Self { active_device_id: Some(device), ..Default::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.shape, Shape::Circle);
        assert_eq!(settings.zoom, 1.0);
        assert_eq!(settings.opacity, 1.0);
        assert!(settings.always_on_top);
        assert!(settings.camera_enabled);
        assert!(settings.active_device_id.is_none());
    }

    #[test]
    fn test_merge_preserves_unspecified_fields() {
        let mut settings = Settings::default();
        settings.merge(SettingsUpdate::shape(Shape::Horizontal));
        assert_eq!(settings.shape, Shape::Horizontal);
        assert_eq!(settings.zoom, 1.0);
        assert!(settings.camera_enabled);
    }

    #[test]
    fn test_merge_clamps_zoom_and_opacity() {
        let mut settings = Settings::default();
        settings.merge(SettingsUpdate { zoom: Some(99.0), ..Default::default() });
        assert_eq!(settings.zoom, ZOOM_MAX);
        settings.merge(SettingsUpdate { zoom: Some(0.0), ..Default::default() });
        assert_eq!(settings.zoom, ZOOM_MIN);
        settings.merge(SettingsUpdate::opacity(7.0));
        assert_eq!(settings.opacity, OPACITY_MAX);
        settings.merge(SettingsUpdate::opacity(-1.0));
        assert_eq!(settings.opacity, OPACITY_MIN);
    }

    #[test]
    fn test_adjust_zoom_stays_in_range() {
        let mut settings = Settings::default();
        for _ in 0..100 {
            settings.adjust_zoom(ZOOM_STEP);
            assert!(settings.zoom >= ZOOM_MIN && settings.zoom <= ZOOM_MAX);
        }
        assert_eq!(settings.zoom, ZOOM_MAX);
        for _ in 0..100 {
            settings.adjust_zoom(-ZOOM_STEP);
            assert!(settings.zoom >= ZOOM_MIN && settings.zoom <= ZOOM_MAX);
        }
        assert_eq!(settings.zoom, ZOOM_MIN);
    }

    #[test]
    fn test_merge_device_id() {
        let mut settings = Settings::default();
        settings.merge(SettingsUpdate::device(Some("1".to_string())));
        assert_eq!(settings.active_device_id.as_deref(), Some("1"));
        settings.merge(SettingsUpdate::device(None));
        assert!(settings.active_device_id.is_none());
    }

    #[test]
    fn test_shape_aspect() {
        assert_eq!(Shape::Circle.aspect(), 1.0);
        assert_eq!(Shape::Square.aspect(), 1.0);
        assert_eq!(Shape::Horizontal.aspect(), 9.0 / 16.0);
        assert_eq!(Shape::Vertical.aspect(), 4.0 / 3.0);
    }

    #[test]
    fn test_behavior_mode_from_env() {
        assert_eq!(
            BehaviorMode::from_env_value("overlay"),
            Some(BehaviorMode::ClickThroughOverlay)
        );
        assert_eq!(BehaviorMode::from_env_value("WINDOW"), Some(BehaviorMode::MovableWindow));
        assert_eq!(BehaviorMode::from_env_value("fixed"), Some(BehaviorMode::FixedPanel));
        assert_eq!(BehaviorMode::from_env_value("bogus"), None);
    }

    #[test]
    fn test_behavior_mode_capabilities() {
        assert!(BehaviorMode::ClickThroughOverlay.allows_drag());
        assert!(BehaviorMode::ClickThroughOverlay.allows_passthrough());
        assert!(BehaviorMode::MovableWindow.allows_drag());
        assert!(!BehaviorMode::MovableWindow.allows_passthrough());
        assert!(!BehaviorMode::FixedPanel.allows_drag());
        assert!(!BehaviorMode::FixedPanel.allows_passthrough());
    }
}
