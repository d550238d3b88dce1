mod support;

use focus_highlighter::highlight::geometry::MonitorRect;
use focus_highlighter::highlight::overlay::FramePlan;
use focus_highlighter::highlight::{Context, HighlighterLifecycle, ScreenRect};
use support::{quick_settings, start_headless, wait_until, FakeHost};

fn monitor(x: i32, y: i32, width: i32, height: i32) -> MonitorRect {
    MonitorRect {
        x,
        y,
        width,
        height,
    }
}

#[test]
fn window_covers_every_monitor_minus_bottom_row() {
    let highlighter = start_headless(&FakeHost::default(), &quick_settings());
    assert_eq!(
        highlighter.backend().window_positions(),
        vec![ScreenRect::new(0, 0, 1920, 1079)]
    );
}

#[test]
fn display_change_moves_the_window() {
    let host = FakeHost::default();
    let highlighter = start_headless(&host, &quick_settings());
    let backend = highlighter.backend();

    backend.set_monitors(vec![monitor(-1280, 0, 1280, 1024), monitor(0, 0, 1920, 1080)]);
    assert!(backend.notify_display_change());
    assert!(wait_until(|| {
        backend.window_positions().last() == Some(&ScreenRect::new(-1280, 0, 3200, 1079))
    }));

    // Rects on the new monitor are now inside the clip area.
    host.set(Context::Focus, ScreenRect::new(-1000, 100, 50, 50));
    highlighter.handle_focus_change(1);
    assert!(wait_until(|| {
        matches!(
            backend.last_drawn_frame(),
            Some(FramePlan::Draw(strokes)) if strokes[0].rect == ScreenRect::new(278, 98, 54, 54)
        )
    }));
}

#[test]
fn display_change_without_geometry_retries_later() {
    let highlighter = start_headless(&FakeHost::default(), &quick_settings());
    let backend = highlighter.backend();

    backend.set_monitors(Vec::new());
    assert!(backend.notify_display_change());
    std::thread::sleep(std::time::Duration::from_millis(50));
    assert_eq!(backend.window_positions().len(), 1);
    assert_eq!(highlighter.lifecycle(), HighlighterLifecycle::Running);

    backend.set_monitors(vec![monitor(0, 0, 2560, 1440)]);
    assert!(wait_until(|| {
        backend.window_positions().last() == Some(&ScreenRect::new(0, 0, 2560, 1439))
    }));
}
