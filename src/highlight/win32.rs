//! Layered, click-through Win32 window that strokes highlight outlines with
//! GDI pens.

use crate::highlight::geometry::{enumerate_monitors, MonitorRect, ScreenRect};
use crate::highlight::model::{DashStyle, TRANSPARENT_KEY_COLOR};
use crate::highlight::overlay::{
    FramePlan, OverlayBackend, OverlaySurface, RenderEvent, RenderWaker, Stroke,
};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{COLORREF, HMODULE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Gdi::{
    BeginPaint, CreateSolidBrush, DeleteObject, EndPaint, ExtCreatePen, GetDC, GetDeviceCaps,
    GetStockObject, InvalidateRect, Rectangle, ReleaseDC, SelectObject, UpdateWindow,
    ValidateRect, BS_SOLID, DESKTOPHORZRES, HDC, HORZRES, LOGBRUSH, NULL_BRUSH, PAINTSTRUCT,
    PEN_STYLE, PS_DASH, PS_DASHDOT, PS_DASHDOTDOT, PS_DOT, PS_ENDCAP_FLAT, PS_GEOMETRIC,
    PS_JOIN_MITER, PS_SOLID,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW,
    GetWindowLongPtrW, KillTimer, PostMessageW, PostQuitMessage, PostThreadMessageW,
    RegisterClassW, SetLayeredWindowAttributes, SetTimer, SetWindowLongPtrW, SetWindowPos,
    ShowWindow, TranslateMessage, CS_HREDRAW, CS_VREDRAW, GWLP_USERDATA, HWND_TOPMOST,
    LWA_ALPHA, LWA_COLORKEY, MSG, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE, SW_HIDE, SW_SHOWNA,
    WINDOW_EX_STYLE, WM_APP, WM_DESTROY, WM_DISPLAYCHANGE, WM_PAINT, WM_QUIT, WM_TIMER,
    WNDCLASSW, WS_DISABLED, WS_EX_LAYERED, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_EX_TOPMOST,
    WS_EX_TRANSPARENT, WS_POPUP,
};

const WINDOW_CLASS: PCWSTR = w!("FocusHighlighterOverlay");
const WINDOW_NAME: PCWSTR = w!("Focus Highlighter Window");
const DISPLAY_CHANGE_TIMER_ID: usize = 1;
const WM_APP_TICK: u32 = WM_APP + 1;
const WM_APP_DISPLAY_CHANGE: u32 = WM_APP + 2;
const OPAQUE: u8 = 0xff;

pub fn overlay_window_ex_style() -> WINDOW_EX_STYLE {
    // Topmost, color-keyed, never activated (not even by alt+tab), and
    // transparent to hit-testing so accessibility APIs see what is beneath.
    WS_EX_TOPMOST | WS_EX_LAYERED | WS_EX_NOACTIVATE | WS_EX_TRANSPARENT | WS_EX_TOOLWINDOW
}

fn transparent_key() -> COLORREF {
    COLORREF(TRANSPARENT_KEY_COLOR.to_colorref_bits())
}

fn pen_style(dash: DashStyle) -> PEN_STYLE {
    let dash = match dash {
        DashStyle::Solid => PS_SOLID,
        DashStyle::Dash => PS_DASH,
        DashStyle::Dot => PS_DOT,
        DashStyle::DashDot => PS_DASHDOT,
        DashStyle::DashDotDot => PS_DASHDOTDOT,
    };
    PEN_STYLE(PS_GEOMETRIC.0 | dash.0 | PS_ENDCAP_FLAT.0 | PS_JOIN_MITER.0)
}

unsafe extern "system" fn highlighter_wndproc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_DISPLAYCHANGE => {
            // Monitor geometry is not always queryable yet when this arrives.
            let delay_ms = unsafe { GetWindowLongPtrW(hwnd, GWLP_USERDATA) } as u32;
            let _ = unsafe { SetTimer(hwnd, DISPLAY_CHANGE_TIMER_ID, delay_ms, None) };
            LRESULT(0)
        }
        WM_DESTROY => {
            unsafe { PostQuitMessage(0) };
            LRESULT(0)
        }
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

fn register_class(hinstance: HMODULE) {
    static REGISTER_CLASS: Once = Once::new();
    REGISTER_CLASS.call_once(|| unsafe {
        let wc = WNDCLASSW {
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(highlighter_wndproc),
            hInstance: hinstance.into(),
            lpszClassName: WINDOW_CLASS,
            hbrBackground: CreateSolidBrush(transparent_key()),
            ..Default::default()
        };
        let _ = RegisterClassW(&wc);
    });
}

#[derive(Debug, Clone)]
pub struct Win32Waker {
    hwnd: isize,
    thread_id: u32,
    alive: Arc<AtomicBool>,
}

impl Win32Waker {
    fn hwnd(&self) -> HWND {
        HWND(self.hwnd as *mut _)
    }

    fn post(&self, message: u32) -> bool {
        self.is_alive()
            && unsafe { PostMessageW(self.hwnd(), message, WPARAM(0), LPARAM(0)) }.is_ok()
    }
}

impl RenderWaker for Win32Waker {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn invalidate(&self) -> bool {
        self.is_alive() && unsafe { InvalidateRect(self.hwnd(), None, true) }.as_bool()
    }

    fn request_tick(&self) -> bool {
        self.post(WM_APP_TICK)
    }

    fn notify_display_change(&self) -> bool {
        self.post(WM_APP_DISPLAY_CHANGE)
    }

    fn post_quit(&self) -> bool {
        self.is_alive()
            && unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) }
                .is_ok()
    }
}

pub struct Win32Backend {
    display_change_delay: Duration,
}

impl Default for Win32Backend {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl Win32Backend {
    pub fn new(display_change_delay: Duration) -> Self {
        Self {
            display_change_delay,
        }
    }
}

impl OverlayBackend for Win32Backend {
    type Surface = Win32Surface;

    fn monitors(&self) -> Vec<MonitorRect> {
        enumerate_monitors()
    }

    fn create_surface(&self, bounds: ScreenRect) -> Result<Win32Surface> {
        let hinstance = unsafe { GetModuleHandleW(PCWSTR::null()) }?;
        register_class(hinstance);

        let hwnd = unsafe {
            CreateWindowExW(
                overlay_window_ex_style(),
                WINDOW_CLASS,
                WINDOW_NAME,
                WS_POPUP | WS_DISABLED,
                bounds.left,
                bounds.top,
                bounds.width,
                bounds.height,
                None,
                None,
                hinstance,
                None,
            )
        }?;

        let display_change_delay_ms = self.display_change_delay.as_millis().min(u32::MAX as u128) as u32;
        // Dropping the surface destroys the window, so early returns below
        // leave nothing behind.
        let mut surface = Win32Surface {
            hwnd,
            thread_id: unsafe { GetCurrentThreadId() },
            alive: Arc::new(AtomicBool::new(true)),
            display_change_delay_ms,
            destroyed: false,
        };
        unsafe {
            let _ = SetWindowLongPtrW(hwnd, GWLP_USERDATA, display_change_delay_ms as isize);
            SetLayeredWindowAttributes(hwnd, transparent_key(), OPAQUE, LWA_ALPHA | LWA_COLORKEY)?;
        }
        surface.reposition(bounds)?;
        unsafe { UpdateWindow(hwnd) }.ok()?;
        Ok(surface)
    }
}

pub struct Win32Surface {
    hwnd: HWND,
    thread_id: u32,
    alive: Arc<AtomicBool>,
    display_change_delay_ms: u32,
    destroyed: bool,
}

impl Win32Surface {
    fn paint(&self, strokes: &[Stroke]) {
        let mut ps = PAINTSTRUCT::default();
        let hdc = unsafe { BeginPaint(self.hwnd, &mut ps) };
        if !hdc.0.is_null() {
            unsafe {
                let old_brush = SelectObject(hdc, GetStockObject(NULL_BRUSH));
                for stroke in strokes {
                    draw_outline(hdc, stroke);
                }
                SelectObject(hdc, old_brush);
            }
        }
        unsafe {
            let _ = EndPaint(self.hwnd, &ps);
        }
    }

    fn ensure_topmost(&self) {
        unsafe {
            let _ = SetWindowPos(
                self.hwnd,
                HWND_TOPMOST,
                0,
                0,
                0,
                0,
                SWP_NOACTIVATE | SWP_NOMOVE | SWP_NOSIZE,
            );
        }
    }
}

unsafe fn draw_outline(hdc: HDC, stroke: &Stroke) {
    let brush = LOGBRUSH {
        lbStyle: BS_SOLID,
        lbColor: COLORREF(stroke.color.to_colorref_bits()),
        lbHatch: 0,
    };
    let pen = unsafe { ExtCreatePen(pen_style(stroke.dash), stroke.width.max(1), &brush, None) };
    if pen.0.is_null() {
        tracing::debug!(context = ?stroke.context, "failed to create highlight pen");
        return;
    }
    let rect = stroke.rect;
    unsafe {
        let old_pen = SelectObject(hdc, pen);
        // GDI excludes the right and bottom edges.
        let _ = Rectangle(hdc, rect.left, rect.top, rect.right() + 1, rect.bottom() + 1);
        SelectObject(hdc, old_pen);
        let _ = DeleteObject(pen);
    }
}

impl OverlaySurface for Win32Surface {
    type Waker = Win32Waker;

    fn waker(&self) -> Win32Waker {
        Win32Waker {
            hwnd: self.hwnd.0 as isize,
            thread_id: self.thread_id,
            alive: Arc::clone(&self.alive),
        }
    }

    fn scale_factor(&self) -> f64 {
        unsafe {
            let hdc = GetDC(self.hwnd);
            if hdc.0.is_null() {
                return 1.0;
            }
            let physical = GetDeviceCaps(hdc, DESKTOPHORZRES);
            let logical = GetDeviceCaps(hdc, HORZRES);
            ReleaseDC(self.hwnd, hdc);
            if physical <= 0 || logical <= 0 {
                1.0
            } else {
                physical as f64 / logical as f64
            }
        }
    }

    fn next_event(&mut self) -> RenderEvent {
        let mut msg = MSG::default();
        loop {
            let result = unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) };
            if result.0 <= 0 {
                if result.0 < 0 {
                    tracing::warn!("GetMessageW failed on highlighter thread");
                }
                return RenderEvent::Quit;
            }
            if msg.hwnd == self.hwnd {
                match msg.message {
                    WM_PAINT => return RenderEvent::Paint,
                    WM_APP_TICK => return RenderEvent::Tick,
                    WM_APP_DISPLAY_CHANGE => {
                        self.defer_display_change();
                        continue;
                    }
                    WM_TIMER if msg.wParam.0 == DISPLAY_CHANGE_TIMER_ID => {
                        let _ = unsafe { KillTimer(self.hwnd, DISPLAY_CHANGE_TIMER_ID) };
                        return RenderEvent::DisplayChanged;
                    }
                    _ => {}
                }
            }
            unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }

    fn present(&mut self, plan: &FramePlan) {
        match plan {
            FramePlan::Skip => unsafe {
                let _ = ValidateRect(self.hwnd, None);
            },
            FramePlan::Clear => {
                self.paint(&[]);
                self.ensure_topmost();
            }
            FramePlan::Draw(strokes) => {
                self.paint(strokes);
                self.ensure_topmost();
            }
        }
    }

    fn reposition(&mut self, bounds: ScreenRect) -> Result<()> {
        // Hiding first makes the window manager re-apply topmost ordering
        // when the window is shown again.
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_HIDE);
            SetWindowPos(
                self.hwnd,
                HWND_TOPMOST,
                bounds.left,
                bounds.top,
                bounds.width,
                bounds.height,
                SWP_NOACTIVATE,
            )?;
            let _ = ShowWindow(self.hwnd, SW_SHOWNA);
        }
        Ok(())
    }

    fn defer_display_change(&mut self) {
        let _ = unsafe {
            SetTimer(
                self.hwnd,
                DISPLAY_CHANGE_TIMER_ID,
                self.display_change_delay_ms,
                None,
            )
        };
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.alive.store(false, Ordering::Release);
        unsafe {
            let _ = KillTimer(self.hwnd, DISPLAY_CHANGE_TIMER_ID);
            if let Err(err) = DestroyWindow(self.hwnd) {
                tracing::warn!("failed to destroy highlighter window: {err}");
            }
        }
    }
}

impl Drop for Win32Surface {
    fn drop(&mut self) {
        self.destroy();
    }
}
