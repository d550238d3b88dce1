use serde::{Deserialize, Serialize};

/// Rows removed from the bottom of the overlay so the shell does not treat the
/// desktop as covered by a full-screen window (which disables desktop
/// shortcut hotkeys).
pub const DESKTOP_HOTKEY_TRIM: i32 = 1;

/// Axis-aligned rectangle in screen pixels, stored as left/top/width/height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ScreenRect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl ScreenRect {
    pub const fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn from_ltrb(left: i32, top: i32, right: i32, bottom: i32) -> Option<Self> {
        if right < left || bottom < top {
            return None;
        }
        Some(Self::new(
            left,
            top,
            right.checked_sub(left)?,
            bottom.checked_sub(top)?,
        ))
    }

    pub fn right(&self) -> i32 {
        self.left.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.top.saturating_add(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Common area of both rectangles. Rectangles that only touch (or a
    /// zero-width caret inside `other`) still intersect.
    pub fn intersection(&self, other: &ScreenRect) -> Option<ScreenRect> {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Self::from_ltrb(left, top, right, bottom)
    }

    /// Converts physical pixels into logical ones for a display scale factor
    /// (1.0 at 96 DPI). Edges are rounded independently so adjacent
    /// rectangles stay adjacent.
    pub fn to_logical(&self, scale: f64) -> Option<ScreenRect> {
        if !scale.is_finite() || scale <= 0.0 {
            return None;
        }
        let convert = |value: i32| -> Option<i32> {
            let scaled = (value as f64 / scale).round();
            if scaled < i32::MIN as f64 || scaled > i32::MAX as f64 {
                None
            } else {
                Some(scaled as i32)
            }
        };
        Self::from_ltrb(
            convert(self.left)?,
            convert(self.top)?,
            convert(self.right())?,
            convert(self.bottom())?,
        )
    }

    /// Translates into a window's client space whose top-left is `origin`.
    pub fn to_client(&self, origin: (i32, i32)) -> Option<ScreenRect> {
        Some(Self::new(
            self.left.checked_sub(origin.0)?,
            self.top.checked_sub(origin.1)?,
            self.width,
            self.height,
        ))
    }

    /// Grows the rectangle by `margin` on every side, or shrinks it for a
    /// negative margin. A shrink past zero collapses that axis onto the
    /// rectangle's center line instead of inverting it.
    pub fn expand_or_shrink(&self, margin: i32) -> Option<ScreenRect> {
        let grow = margin.checked_mul(2)?;
        let (left, width) = collapse_axis(self.left, self.width, margin, grow)?;
        let (top, height) = collapse_axis(self.top, self.height, margin, grow)?;
        Some(Self::new(left, top, width, height))
    }
}

fn collapse_axis(start: i32, len: i32, margin: i32, grow: i32) -> Option<(i32, i32)> {
    let new_len = len.checked_add(grow)?;
    if new_len < 0 {
        return Some((start.checked_add(len / 2)?, 0));
    }
    Some((start.checked_sub(margin)?, new_len))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonitorRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl From<MonitorRect> for ScreenRect {
    fn from(rect: MonitorRect) -> Self {
        ScreenRect::new(rect.x, rect.y, rect.width, rect.height)
    }
}

/// Bounding box of all attached monitors, minus [`DESKTOP_HOTKEY_TRIM`].
///
/// Returns `None` when no usable monitor is reported, which happens briefly
/// while the display configuration is being changed.
pub fn screen_bounds(monitors: &[MonitorRect]) -> Option<ScreenRect> {
    let mut usable = monitors
        .iter()
        .copied()
        .filter(|monitor| monitor.width > 0 && monitor.height > 0);
    let first = ScreenRect::from(usable.next()?);
    let (mut left, mut top) = (first.left, first.top);
    let (mut right, mut bottom) = (first.right(), first.bottom());
    for monitor in usable.map(ScreenRect::from) {
        left = left.min(monitor.left);
        top = top.min(monitor.top);
        right = right.max(monitor.right());
        bottom = bottom.max(monitor.bottom());
    }
    let bounds = ScreenRect::from_ltrb(left, top, right, bottom)?;
    Some(ScreenRect {
        height: (bounds.height - DESKTOP_HOTKEY_TRIM).max(0),
        ..bounds
    })
}

/// Runs one rectangle through the paint-time coordinate pipeline: clip to the
/// overlay bounds, scale to logical pixels, move into client space, apply the
/// style margin. `None` means the rectangle cannot be drawn this frame.
pub fn prepare_stroke(
    rect: ScreenRect,
    bounds: ScreenRect,
    scale: f64,
    margin: i32,
) -> Option<ScreenRect> {
    let clipped = rect.intersection(&bounds)?;
    let logical = clipped.to_logical(scale)?;
    let origin = bounds.to_logical(scale)?;
    logical
        .to_client((origin.left, origin.top))?
        .expand_or_shrink(margin)
}

pub fn enumerate_monitors() -> Vec<MonitorRect> {
    #[cfg(windows)]
    {
        platform::enumerate_monitors()
    }

    #[cfg(not(windows))]
    {
        Vec::new()
    }
}

#[cfg(windows)]
mod platform {
    use super::MonitorRect;
    use std::mem;
    use windows::Win32::Foundation::{BOOL, LPARAM, RECT};
    use windows::Win32::Graphics::Gdi::{
        EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFOEXW,
    };

    pub(super) fn enumerate_monitors() -> Vec<MonitorRect> {
        unsafe extern "system" fn enum_proc(
            monitor: HMONITOR,
            _hdc: HDC,
            _rect: *mut RECT,
            data: LPARAM,
        ) -> BOOL {
            let monitors = unsafe { &mut *(data.0 as *mut Vec<MonitorRect>) };
            let mut info = MONITORINFOEXW::default();
            info.monitorInfo.cbSize = mem::size_of::<MONITORINFOEXW>() as u32;
            if unsafe { GetMonitorInfoW(monitor, &mut info.monitorInfo) }
                .as_bool()
            {
                let rc = info.monitorInfo.rcMonitor;
                monitors.push(MonitorRect {
                    x: rc.left,
                    y: rc.top,
                    width: rc.right - rc.left,
                    height: rc.bottom - rc.top,
                });
            }
            BOOL(1)
        }

        let mut monitors = Vec::new();
        unsafe {
            let _ = EnumDisplayMonitors(
                HDC::default(),
                None,
                Some(enum_proc),
                LPARAM(&mut monitors as *mut Vec<MonitorRect> as isize),
            );
        }
        monitors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_saturate_at_extreme_coordinates() {
        let monitors = [
            MonitorRect {
                x: i32::MAX - 10,
                y: i32::MAX - 10,
                width: 100,
                height: 100,
            },
            MonitorRect {
                x: 0,
                y: 0,
                width: 1920,
                height: 1080,
            },
        ];
        let bounds = screen_bounds(&monitors).unwrap();
        assert_eq!(bounds.left, 0);
        assert_eq!(bounds.top, 0);
        assert_eq!(bounds.right(), i32::MAX);
        assert_eq!(bounds.height, i32::MAX - DESKTOP_HOTKEY_TRIM);
    }

    #[test]
    fn bounds_cover_monitors_left_of_primary() {
        let monitors = [
            MonitorRect {
                x: -1920,
                y: 0,
                width: 1920,
                height: 1080,
            },
            MonitorRect {
                x: 0,
                y: -200,
                width: 2560,
                height: 1440,
            },
        ];
        assert_eq!(
            screen_bounds(&monitors),
            Some(ScreenRect::new(-1920, -200, 4480, 1439))
        );
    }

    #[test]
    fn bounds_need_at_least_one_usable_monitor() {
        assert_eq!(screen_bounds(&[]), None);
        let zero = MonitorRect {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        };
        assert_eq!(screen_bounds(&[zero]), None);
    }

    #[test]
    fn clipping_at_bottom_right_edge() {
        let bounds = ScreenRect::new(0, 0, 1920, 1079);
        let clipped = ScreenRect::new(1900, 1070, 100, 50)
            .intersection(&bounds)
            .expect("overlapping");
        assert_eq!(clipped, ScreenRect::new(1900, 1070, 20, 9));
    }

    #[test]
    fn disjoint_rectangles_do_not_intersect() {
        let bounds = ScreenRect::new(0, 0, 1920, 1079);
        assert_eq!(ScreenRect::new(2000, 10, 10, 10).intersection(&bounds), None);
    }

    #[test]
    fn zero_width_caret_survives_clipping() {
        let bounds = ScreenRect::new(0, 0, 100, 100);
        let caret = ScreenRect::new(10, 10, 0, 16);
        assert_eq!(caret.intersection(&bounds), Some(caret));
    }

    #[test]
    fn negative_margin_never_inverts() {
        let shrunk = ScreenRect::new(10, 10, 4, 20)
            .expand_or_shrink(-2)
            .expect("feasible");
        assert_eq!(shrunk, ScreenRect::new(12, 12, 0, 16));

        let collapsed = ScreenRect::new(10, 10, 4, 4)
            .expand_or_shrink(-3)
            .expect("feasible");
        assert_eq!(collapsed, ScreenRect::new(12, 12, 0, 0));
    }

    #[test]
    fn positive_margin_grows_every_side() {
        assert_eq!(
            ScreenRect::new(10, 10, 50, 20).expand_or_shrink(2),
            Some(ScreenRect::new(8, 8, 54, 24))
        );
    }

    #[test]
    fn overflowing_margin_is_infeasible() {
        assert_eq!(ScreenRect::new(0, 0, 10, 10).expand_or_shrink(i32::MAX), None);
    }

    #[test]
    fn logical_conversion_rejects_bad_scale() {
        let rect = ScreenRect::new(10, 10, 10, 10);
        assert_eq!(rect.to_logical(0.0), None);
        assert_eq!(rect.to_logical(f64::NAN), None);
        assert_eq!(rect.to_logical(2.0), Some(ScreenRect::new(5, 5, 5, 5)));
    }

    #[test]
    fn stroke_pipeline_moves_into_client_space() {
        let bounds = ScreenRect::new(-1920, 0, 3840, 1079);
        let stroke = prepare_stroke(ScreenRect::new(-1900, 100, 50, 20), bounds, 1.0, 2);
        assert_eq!(stroke, Some(ScreenRect::new(18, 98, 54, 24)));
    }
}
