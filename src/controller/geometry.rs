//! Derived preview geometry
//!
//! Size and anchor clamping are pure functions of the settings; geometry is
//! recomputed on demand and never stored as an independent source of truth.

use egui::{Pos2, Rect, Vec2};

use super::settings::Shape;

/// Base preview width in logical pixels at zoom 1.0
pub const BASE_DIMENSION: f32 = 300.0;

/// Logical size reserved for the settings panel when clamping its anchor
pub const PANEL_SIZE: Vec2 = Vec2::new(240.0, 360.0);

/// Extra host-window margin around the preview when the panel is hidden
pub const HOST_PADDING: f32 = 40.0;

/// Extra host-window margin when the panel is visible
pub const HOST_PADDING_WITH_PANEL: f32 = 320.0;

/// Derived preview rectangle in surface-local logical coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewGeometry {
    pub origin: Pos2,
    pub width: f32,
    pub height: f32,
}

impl PreviewGeometry {
    pub fn rect(&self) -> Rect {
        Rect::from_min_size(self.origin, Vec2::new(self.width, self.height))
    }
}

/// Compute the preview size for a zoom level and shape.
///
/// Width is the base dimension scaled by zoom; height follows the shape's
/// aspect ratio (circle/square 1:1, horizontal 16:9, vertical 3:4).
pub fn preview_size(zoom: f32, shape: Shape) -> Vec2 {
    let width = BASE_DIMENSION * zoom;
    Vec2::new(width, width * shape.aspect())
}

/// Clamp a panel anchor so the panel's bounding box stays inside the
/// viewport: `min(point, viewport - panel)` floored at the origin.
pub fn clamp_panel_anchor(point: Pos2, viewport: Vec2) -> Pos2 {
    let max_x = (viewport.x - PANEL_SIZE.x).max(0.0);
    let max_y = (viewport.y - PANEL_SIZE.y).max(0.0);
    Pos2::new(point.x.clamp(0.0, max_x), point.y.clamp(0.0, max_y))
}

/// Shape-aware hit test: whether a pointer position lands on the visible
/// preview (the circle shape only captures inside the circle).
pub fn hits_preview(geometry: &PreviewGeometry, shape: Shape, point: Pos2) -> bool {
    let rect = geometry.rect();
    if !rect.contains(point) {
        return false;
    }
    match shape {
        Shape::Circle => {
            let radius = geometry.width / 2.0;
            let center = rect.center();
            (point - center).length_sq() <= radius * radius
        }
        _ => true,
    }
}
