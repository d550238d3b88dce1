//! Window-less surface used on platforms without a native overlay and by the
//! test suite. It runs the same render loop, records every presented frame
//! and keeps count of live windows.

use crate::highlight::geometry::{MonitorRect, ScreenRect};
use crate::highlight::overlay::{
    FramePlan, OverlayBackend, OverlaySurface, RenderEvent, RenderWaker,
};
use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

const DEFAULT_DISPLAY_CHANGE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeadlessMessage {
    Invalidate,
    Tick,
    DisplayChange,
    Quit,
}

#[derive(Debug, Clone)]
pub struct HeadlessWaker {
    tx: Sender<HeadlessMessage>,
    alive: Arc<AtomicBool>,
}

impl HeadlessWaker {
    fn post(&self, message: HeadlessMessage) -> bool {
        self.alive.load(Ordering::Acquire) && self.tx.send(message).is_ok()
    }
}

impl RenderWaker for HeadlessWaker {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn invalidate(&self) -> bool {
        self.post(HeadlessMessage::Invalidate)
    }

    fn request_tick(&self) -> bool {
        self.post(HeadlessMessage::Tick)
    }

    fn notify_display_change(&self) -> bool {
        self.post(HeadlessMessage::DisplayChange)
    }

    fn post_quit(&self) -> bool {
        self.post(HeadlessMessage::Quit)
    }
}

#[derive(Default)]
struct Recorder {
    frames: Mutex<Vec<FramePlan>>,
    positions: Mutex<Vec<ScreenRect>>,
    current: Mutex<Option<HeadlessWaker>>,
    live_windows: AtomicUsize,
    created_windows: AtomicUsize,
}

pub struct HeadlessBackend {
    monitors: Mutex<Vec<MonitorRect>>,
    scale: f64,
    create_delay: Duration,
    fail_creation: bool,
    display_change_delay: Duration,
    recorder: Arc<Recorder>,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(vec![MonitorRect {
            x: 0,
            y: 0,
            width: 1920,
            height: 1080,
        }])
    }
}

impl HeadlessBackend {
    pub fn new(monitors: Vec<MonitorRect>) -> Self {
        Self {
            monitors: Mutex::new(monitors),
            scale: 1.0,
            create_delay: Duration::ZERO,
            fail_creation: false,
            display_change_delay: DEFAULT_DISPLAY_CHANGE_DELAY,
            recorder: Arc::new(Recorder::default()),
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Makes window creation stall, simulating a render thread that is slow
    /// to come up.
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_creation = true;
        self
    }

    pub fn with_display_change_delay(mut self, delay: Duration) -> Self {
        self.display_change_delay = delay;
        self
    }

    pub fn set_monitors(&self, monitors: Vec<MonitorRect>) {
        *self.monitors.lock().unwrap_or_else(PoisonError::into_inner) = monitors;
    }

    /// Delivers a display-configuration notification to the live window.
    pub fn notify_display_change(&self) -> bool {
        self.recorder
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|waker| waker.notify_display_change())
    }

    /// Closes the live window from outside, the way a user session ending
    /// or a crashed shell would take it down.
    pub fn close_current_window(&self) -> bool {
        self.recorder
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|waker| waker.post_quit())
    }

    pub fn frames(&self) -> Vec<FramePlan> {
        self.recorder
            .frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_drawn_frame(&self) -> Option<FramePlan> {
        self.frames()
            .into_iter()
            .rev()
            .find(|plan| !matches!(plan, FramePlan::Skip))
    }

    /// Window placements, in order: creation first, then every reposition.
    pub fn window_positions(&self) -> Vec<ScreenRect> {
        self.recorder
            .positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn live_windows(&self) -> usize {
        self.recorder.live_windows.load(Ordering::SeqCst)
    }

    pub fn created_windows(&self) -> usize {
        self.recorder.created_windows.load(Ordering::SeqCst)
    }
}

impl OverlayBackend for HeadlessBackend {
    type Surface = HeadlessSurface;

    fn monitors(&self) -> Vec<MonitorRect> {
        self.monitors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn create_surface(&self, bounds: ScreenRect) -> Result<HeadlessSurface> {
        if !self.create_delay.is_zero() {
            std::thread::sleep(self.create_delay);
        }
        if self.fail_creation {
            bail!("headless window creation refused");
        }
        let (tx, rx) = channel();
        let waker = HeadlessWaker {
            tx,
            alive: Arc::new(AtomicBool::new(true)),
        };
        self.recorder.live_windows.fetch_add(1, Ordering::SeqCst);
        self.recorder.created_windows.fetch_add(1, Ordering::SeqCst);
        self.recorder
            .positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(bounds);
        *self
            .recorder
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(waker.clone());
        Ok(HeadlessSurface {
            rx,
            waker,
            scale: self.scale,
            display_change_delay: self.display_change_delay,
            display_deadline: None,
            recorder: Arc::clone(&self.recorder),
            destroyed: false,
        })
    }
}

pub struct HeadlessSurface {
    rx: Receiver<HeadlessMessage>,
    waker: HeadlessWaker,
    scale: f64,
    display_change_delay: Duration,
    display_deadline: Option<Instant>,
    recorder: Arc<Recorder>,
    destroyed: bool,
}

impl OverlaySurface for HeadlessSurface {
    type Waker = HeadlessWaker;

    fn waker(&self) -> HeadlessWaker {
        self.waker.clone()
    }

    fn scale_factor(&self) -> f64 {
        self.scale
    }

    fn next_event(&mut self) -> RenderEvent {
        loop {
            let message = match self.display_deadline {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    match self.rx.recv_timeout(wait) {
                        Ok(message) => message,
                        Err(RecvTimeoutError::Timeout) => {
                            self.display_deadline = None;
                            return RenderEvent::DisplayChanged;
                        }
                        Err(RecvTimeoutError::Disconnected) => return RenderEvent::Quit,
                    }
                }
                None => match self.rx.recv() {
                    Ok(message) => message,
                    Err(_) => return RenderEvent::Quit,
                },
            };
            match message {
                HeadlessMessage::Invalidate => return RenderEvent::Paint,
                HeadlessMessage::Tick => return RenderEvent::Tick,
                HeadlessMessage::DisplayChange => self.defer_display_change(),
                HeadlessMessage::Quit => return RenderEvent::Quit,
            }
        }
    }

    fn present(&mut self, plan: &FramePlan) {
        self.recorder
            .frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(plan.clone());
    }

    fn reposition(&mut self, bounds: ScreenRect) -> Result<()> {
        self.recorder
            .positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(bounds);
        Ok(())
    }

    fn defer_display_change(&mut self) {
        // Repeated notifications push the deadline out, like re-arming a timer.
        self.display_deadline = Some(Instant::now() + self.display_change_delay);
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.waker.alive.store(false, Ordering::Release);
        self.recorder.live_windows.fetch_sub(1, Ordering::SeqCst);
        let mut current = self
            .recorder
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if current
            .as_ref()
            .is_some_and(|waker| Arc::ptr_eq(&waker.alive, &self.waker.alive))
        {
            *current = None;
        }
    }
}
