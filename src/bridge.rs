//! Host window bridge
//!
//! A narrow, fire-and-forget command channel from the presentation
//! controller to the windowing shell. The controller never observes return
//! values; a command that the shell cannot honor is logged and dropped.
//!
//! Two implementations exist: [`WinitBridge`] drives a real winit window,
//! and [`NullBridge`] is the degraded fallback for hosts without the
//! required window capabilities (everything becomes a no-op except exit,
//! which still closes the presentation surface). Selection happens once at
//! startup via [`detect_bridge`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use winit::dpi::LogicalSize;
use winit::window::{Window, WindowLevel};

/// Shared exit flag: bridges raise it, the event loop polls it.
#[derive(Clone, Default)]
pub struct ExitSignal(Arc<AtomicBool>);

impl ExitSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Imperative commands accepted by the windowing shell
pub trait HostBridge {
    /// Keep the host window above all others (or stop doing so)
    fn set_always_on_top(&mut self, on_top: bool);

    /// When `ignore` is true, pointer events fall through to whatever is
    /// beneath the overlay. `forward_move_events` asks the shell to keep
    /// delivering move events while unhittable so hover re-detection can
    /// re-enable capture.
    fn set_mouse_passthrough(&mut self, ignore: bool, forward_move_events: bool);

    /// Resize the host window to fit a preview of the given logical size
    /// plus a padding allowance (extra margin for the settings panel)
    fn resize_host(&mut self, width: f32, height: f32, padding: f32);

    /// Ask the shell to exit the application
    fn request_exit(&mut self);
}

/// Bridge backed by a real winit window
pub struct WinitBridge {
    window: Arc<Window>,
    exit: ExitSignal,
}

impl WinitBridge {
    pub fn new(window: Arc<Window>, exit: ExitSignal) -> Self {
        Self { window, exit }
    }
}

impl HostBridge for WinitBridge {
    fn set_always_on_top(&mut self, on_top: bool) {
        let level = if on_top { WindowLevel::AlwaysOnTop } else { WindowLevel::Normal };
        log::debug!("bridge: set_always_on_top({})", on_top);
        self.window.set_window_level(level);
    }

    fn set_mouse_passthrough(&mut self, ignore: bool, forward_move_events: bool) {
        // winit cannot forward window cursor events while unhittable;
        // hover re-capture runs off device-level mouse motion instead.
        let _ = forward_move_events;
        log::debug!("bridge: set_mouse_passthrough({})", ignore);
        if let Err(e) = self.window.set_cursor_hittest(!ignore) {
            log::warn!("Host refused cursor hittest change: {}", e);
        }
    }

    fn resize_host(&mut self, width: f32, height: f32, padding: f32) {
        let size = LogicalSize::new(width + padding, height + padding);
        log::debug!("bridge: resize_host({:.0}x{:.0} +{:.0})", width, height, padding);
        let _ = self.window.request_inner_size(size);
    }

    fn request_exit(&mut self) {
        log::info!("Exit requested via host bridge");
        self.exit.raise();
    }
}

/// Degraded bridge for hosts without overlay capabilities: every command is
/// a no-op except exit, which closes the presentation surface directly.
pub struct NullBridge {
    exit: ExitSignal,
}

impl NullBridge {
    pub fn new(exit: ExitSignal) -> Self {
        Self { exit }
    }
}

impl HostBridge for NullBridge {
    fn set_always_on_top(&mut self, _on_top: bool) {}

    fn set_mouse_passthrough(&mut self, _ignore: bool, _forward_move_events: bool) {}

    fn resize_host(&mut self, _width: f32, _height: f32, _padding: f32) {}

    fn request_exit(&mut self) {
        log::info!("Exit requested (no host shell, closing surface)");
        self.exit.raise();
    }
}

/// Pick a bridge for the window at hand.
///
/// Cursor hittest support is the capability the overlay cannot fake; if the
/// probe fails the whole bridge degrades to no-ops.
pub fn detect_bridge(window: Arc<Window>, exit: ExitSignal) -> Box<dyn HostBridge> {
    match window.set_cursor_hittest(true) {
        Ok(()) => Box::new(WinitBridge::new(window, exit)),
        Err(e) => {
            log::warn!("Host shell lacks cursor hittest ({}); bridge commands disabled", e);
            Box::new(NullBridge::new(exit))
        }
    }
}

/// Recording bridge for controller tests
#[cfg(test)]
pub mod recording {
    use super::HostBridge;

    /// One recorded bridge command
    #[derive(Debug, Clone, PartialEq)]
    pub enum Command {
        AlwaysOnTop(bool),
        Passthrough { ignore: bool, forward_move_events: bool },
        Resize { width: f32, height: f32, padding: f32 },
        Exit,
    }

    /// Bridge that records every command it receives
    #[derive(Default)]
    pub struct RecordingBridge {
        pub commands: Vec<Command>,
    }

    impl RecordingBridge {
        pub fn new() -> Self {
            Self::default()
        }

        /// Last passthrough command, if any
        pub fn last_passthrough(&self) -> Option<bool> {
            self.commands.iter().rev().find_map(|c| match c {
                Command::Passthrough { ignore, .. } => Some(*ignore),
                _ => None,
            })
        }

        /// Last resize command as (width, height, padding), if any
        pub fn last_resize(&self) -> Option<(f32, f32, f32)> {
            self.commands.iter().rev().find_map(|c| match c {
                Command::Resize { width, height, padding } => Some((*width, *height, *padding)),
                _ => None,
            })
        }

        pub fn resize_count(&self) -> usize {
            self.commands
                .iter()
                .filter(|c| matches!(c, Command::Resize { .. }))
                .count()
        }
    }

    impl HostBridge for RecordingBridge {
        fn set_always_on_top(&mut self, on_top: bool) {
            self.commands.push(Command::AlwaysOnTop(on_top));
        }

        fn set_mouse_passthrough(&mut self, ignore: bool, forward_move_events: bool) {
            self.commands.push(Command::Passthrough { ignore, forward_move_events });
        }

        fn resize_host(&mut self, width: f32, height: f32, padding: f32) {
            self.commands.push(Command::Resize { width, height, padding });
        }

        fn request_exit(&mut self) {
            self.commands.push(Command::Exit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_signal_round_trip() {
        let signal = ExitSignal::new();
        assert!(!signal.is_raised());
        signal.raise();
        assert!(signal.is_raised());
        // Clones observe the same flag
        let clone = signal.clone();
        assert!(clone.is_raised());
    }

    #[test]
    fn test_null_bridge_only_exit_has_effect() {
        let signal = ExitSignal::new();
        let mut bridge = NullBridge::new(signal.clone());
        bridge.set_always_on_top(true);
        bridge.set_mouse_passthrough(true, true);
        bridge.resize_host(300.0, 300.0, 40.0);
        assert!(!signal.is_raised());
        bridge.request_exit();
        assert!(signal.is_raised());
    }
}
