#![allow(dead_code)]

use focus_highlighter::highlight::headless::HeadlessBackend;
use focus_highlighter::highlight::{
    Context, HighlightHost, Highlighter, ResolveError, ScreenRect,
};
use focus_highlighter::settings::HighlightSettings;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct FakeState {
    regions: Mutex<HashMap<Context, Result<ScreenRect, ResolveError>>>,
    focus_by_object: Mutex<HashMap<u32, ScreenRect>>,
    outside_browse_scope: AtomicBool,
    focus_delay: Mutex<Duration>,
    pub resolve_calls: AtomicUsize,
}

/// Host whose answers are set by the test.
#[derive(Clone, Default)]
pub struct FakeHost {
    pub state: Arc<FakeState>,
}

impl FakeHost {
    pub fn set(&self, context: Context, rect: ScreenRect) {
        self.state.regions.lock().unwrap().insert(context, Ok(rect));
    }

    pub fn fail(&self, context: Context, err: ResolveError) {
        self.state.regions.lock().unwrap().insert(context, Err(err));
    }

    pub fn set_object(&self, object: u32, rect: ScreenRect) {
        self.state.focus_by_object.lock().unwrap().insert(object, rect);
    }

    /// Makes every focus resolution stall for `delay`.
    pub fn set_focus_delay(&self, delay: Duration) {
        *self.state.focus_delay.lock().unwrap() = delay;
    }

    pub fn set_outside_browse_scope(&self, outside: bool) {
        self.state.outside_browse_scope.store(outside, Ordering::SeqCst);
    }
}

impl HighlightHost for FakeHost {
    type Object = u32;

    fn resolve_region(
        &self,
        context: Context,
        object: Option<&u32>,
    ) -> Result<ScreenRect, ResolveError> {
        self.state.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if context == Context::Focus {
            let delay = *self.state.focus_delay.lock().unwrap();
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
        }
        if let (Context::Focus, Some(object)) = (context, object) {
            if let Some(rect) = self.state.focus_by_object.lock().unwrap().get(object) {
                return Ok(*rect);
            }
        }
        self.state
            .regions
            .lock()
            .unwrap()
            .get(&context)
            .cloned()
            .unwrap_or(Err(ResolveError::Unsupported))
    }

    fn is_object_in_active_browse_scope(&self, _object: &u32) -> bool {
        !self.state.outside_browse_scope.load(Ordering::SeqCst)
    }
}

pub fn quick_settings() -> HighlightSettings {
    HighlightSettings {
        refresh_interval_ms: 20,
        ready_timeout_ms: 1000,
        display_change_delay_ms: 10,
        ..HighlightSettings::default()
    }
}

pub fn headless() -> HeadlessBackend {
    HeadlessBackend::default().with_display_change_delay(Duration::from_millis(10))
}

pub fn start_headless(
    host: &FakeHost,
    settings: &HighlightSettings,
) -> Highlighter<FakeHost, HeadlessBackend> {
    let highlighter = Highlighter::with_backend(host.clone(), headless(), settings);
    highlighter.start().unwrap();
    highlighter
}

/// Polls `condition` until it holds or two seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
