use focus_highlighter::highlight::{Context, HighlightHost, Highlighter, ResolveError, ScreenRect};
use focus_highlighter::logging;
use focus_highlighter::settings::HighlightSettings;
use std::time::{Duration, Instant};

const DEFAULT_SETTINGS_PATH: &str = "highlight_settings.json";
const DEFAULT_RUN_SECS: u64 = 10;
const BOX_SIZE: i32 = 120;
const EVENT_PERIOD: Duration = Duration::from_millis(50);

/// Pretends the mouse pointer is the focused object, with the review cursor
/// around it and a caret-like browse-mode region underneath.
struct PointerHost {
    #[cfg_attr(windows, allow(dead_code))]
    started: Instant,
}

impl PointerHost {
    #[cfg(windows)]
    fn pointer(&self) -> Result<(i32, i32), ResolveError> {
        use windows::Win32::Foundation::POINT;
        use windows::Win32::UI::WindowsAndMessaging::GetCursorPos;

        let mut point = POINT::default();
        unsafe { GetCursorPos(&mut point) }
            .map_err(|err| ResolveError::Transient(err.to_string()))?;
        Ok((point.x, point.y))
    }

    #[cfg(not(windows))]
    fn pointer(&self) -> Result<(i32, i32), ResolveError> {
        let t = self.started.elapsed().as_secs_f64();
        Ok(((600.0 + 300.0 * t.cos()) as i32, (500.0 + 200.0 * t.sin()) as i32))
    }
}

impl HighlightHost for PointerHost {
    type Object = ();

    fn resolve_region(&self, context: Context, _object: Option<&()>) -> Result<ScreenRect, ResolveError> {
        let (x, y) = self.pointer()?;
        let half = BOX_SIZE / 2;
        match context {
            Context::Focus => Ok(ScreenRect::new(x - half, y - half, BOX_SIZE, BOX_SIZE)),
            Context::Navigator => Ok(ScreenRect::new(x - BOX_SIZE, y - BOX_SIZE, BOX_SIZE * 2, BOX_SIZE * 2)),
            Context::BrowseMode => Ok(ScreenRect::new(x - half, y + half + 8, BOX_SIZE, 4)),
            Context::FocusNavigator => Err(ResolveError::Unsupported),
        }
    }

    fn is_object_in_active_browse_scope(&self, _object: &()) -> bool {
        true
    }
}

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let settings_path = args.next().unwrap_or_else(|| DEFAULT_SETTINGS_PATH.to_string());
    let run_for = args
        .next()
        .and_then(|secs| secs.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(DEFAULT_RUN_SECS));

    let settings = HighlightSettings::load(&settings_path)?;
    logging::init(settings.debug_logging, settings.log_file.clone());

    let host = PointerHost {
        started: Instant::now(),
    };
    let highlighter = Highlighter::new(host, &settings);
    highlighter.apply_toggles(settings.contexts)?;
    tracing::info!(?run_for, "highlight demo running");

    let deadline = Instant::now() + run_for;
    let mut ticks: u64 = 0;
    while Instant::now() < deadline {
        highlighter.handle_focus_change(());
        highlighter.handle_review_move();
        if ticks % 4 == 0 {
            highlighter.handle_browse_mode_move();
        }
        ticks += 1;
        std::thread::sleep(EVENT_PERIOD);
    }

    #[cfg(not(windows))]
    tracing::info!(
        frames = highlighter.backend().frames().len(),
        "headless frames presented"
    );

    highlighter.terminate()?;
    Ok(())
}
