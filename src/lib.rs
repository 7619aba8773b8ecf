//! Camera Overlay - always-on-top shape-clipped camera preview
//!
//! A borderless, transparent desktop overlay that shows a live camera
//! preview clipped to a selectable shape, with wheel zoom, drag-to-move,
//! a right-click settings panel, and hover-gated mouse passthrough so the
//! overlay never blocks interaction with the windows beneath it.

pub mod app;
pub mod bridge;
pub mod camera;
pub mod controller;
pub mod ui;

pub use app::App;
pub use controller::OverlayController;
