//! Focus highlighting engine: tracks a handful of screen regions supplied by
//! an assistive-technology host and outlines them on a click-through overlay.

pub mod controller;
pub mod error;
pub mod geometry;
pub mod headless;
pub mod host;
pub mod model;
pub mod overlay;
pub mod registry;
pub mod scheduler;
pub mod state;
pub mod style;
#[cfg(windows)]
pub mod win32;

pub use controller::Highlighter;
pub use error::{HighlightError, ResolveError};
pub use geometry::{MonitorRect, ScreenRect};
pub use host::HighlightHost;
pub use model::{Context, DashStyle, EnabledContexts, HighlightColor, HighlightStyle, StyleTable};
pub use state::HighlighterLifecycle;

use crate::settings::HighlightSettings;

/// The overlay backend for the current platform.
#[cfg(windows)]
pub type NativeBackend = win32::Win32Backend;
#[cfg(not(windows))]
pub type NativeBackend = headless::HeadlessBackend;

pub fn native_backend(settings: &HighlightSettings) -> NativeBackend {
    #[cfg(windows)]
    {
        win32::Win32Backend::new(settings.display_change_delay())
    }

    #[cfg(not(windows))]
    {
        headless::HeadlessBackend::default().with_display_change_delay(settings.display_change_delay())
    }
}
