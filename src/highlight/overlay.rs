use crate::highlight::geometry::{prepare_stroke, screen_bounds, MonitorRect, ScreenRect};
use crate::highlight::model::{Context, DashStyle, HighlightColor, StyleTable};
use crate::highlight::registry::RegionRegistry;
use crate::highlight::style::{draw_instructions, DrawInstruction};
use anyhow::{anyhow, Result};
use std::sync::{Arc, Weak};

/// Events the render loop reacts to, produced by a surface's message source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderEvent {
    Paint,
    Tick,
    DisplayChanged,
    Quit,
}

/// A single outline in the window's client coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stroke {
    pub context: Context,
    pub rect: ScreenRect,
    pub color: HighlightColor,
    pub width: u32,
    pub dash: DashStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePlan {
    /// Nothing to draw and nothing stale on screen; no drawing resources are
    /// acquired.
    Skip,
    /// Nothing to draw, but the previous frame left outlines behind.
    Clear,
    Draw(Vec<Stroke>),
}

/// Thread-safe handle used to poke the render thread. Every call is a no-op
/// returning `false` once the render thread has gone away.
pub trait RenderWaker: Clone + Send + Sync + 'static {
    fn is_alive(&self) -> bool;
    fn invalidate(&self) -> bool;
    fn request_tick(&self) -> bool;
    fn notify_display_change(&self) -> bool;
    fn post_quit(&self) -> bool;
}

/// Native window owned by the render thread.
pub trait OverlaySurface {
    type Waker: RenderWaker;

    fn waker(&self) -> Self::Waker;
    /// Physical-to-logical pixel ratio of the window's display.
    fn scale_factor(&self) -> f64;
    /// Blocks until the next event for the render loop.
    fn next_event(&mut self) -> RenderEvent;
    fn present(&mut self, plan: &FramePlan);
    fn reposition(&mut self, bounds: ScreenRect) -> Result<()>;
    /// Arms the short delay after which `DisplayChanged` is delivered.
    fn defer_display_change(&mut self);
    fn destroy(&mut self);
}

pub trait OverlayBackend: Send + Sync + 'static {
    type Surface: OverlaySurface;

    fn monitors(&self) -> Vec<MonitorRect>;
    /// Creates, positions and shows a surface covering `bounds`. Must be
    /// called on the thread that will run the surface's event loop.
    fn create_surface(&self, bounds: ScreenRect) -> Result<Self::Surface>;
}

pub type WakerOf<B> = <<B as OverlayBackend>::Surface as OverlaySurface>::Waker;

/// What the window paints from. The window only holds a weak reference, so
/// it never keeps a torn-down engine alive.
pub struct RenderSource {
    pub registry: RegionRegistry,
    pub styles: StyleTable,
}

impl RenderSource {
    pub fn new(registry: RegionRegistry, styles: StyleTable) -> Self {
        Self { registry, styles }
    }

    /// Draw instructions for the current registry contents, with the
    /// registry version they were taken at.
    pub fn draw_instructions(&self) -> (u64, Vec<DrawInstruction>) {
        let snapshot = self.registry.snapshot();
        let instructions =
            draw_instructions(&snapshot, self.registry.enabled_contexts(), &self.styles);
        (snapshot.version(), instructions)
    }
}

/// Maps draw instructions into client-space strokes. Instructions whose
/// rectangle cannot be transformed are dropped individually.
pub fn compose_frame(
    instructions: &[DrawInstruction],
    bounds: ScreenRect,
    scale: f64,
) -> Vec<Stroke> {
    instructions
        .iter()
        .filter_map(|instruction| {
            let Some(rect) =
                prepare_stroke(instruction.rect, bounds, scale, instruction.style.margin)
            else {
                tracing::debug!(
                    context = ?instruction.context,
                    rect = ?instruction.rect,
                    "skipping highlight outside drawable area"
                );
                return None;
            };
            Some(Stroke {
                context: instruction.context,
                rect,
                color: instruction.style.color,
                width: instruction.style.width,
                dash: instruction.style.dash,
            })
        })
        .collect()
}

pub fn plan_frame(strokes: Vec<Stroke>, previous_frame_drawn: bool) -> FramePlan {
    if !strokes.is_empty() {
        FramePlan::Draw(strokes)
    } else if previous_frame_drawn {
        FramePlan::Clear
    } else {
        FramePlan::Skip
    }
}

/// The full-desktop highlight window and its render loop.
pub struct OverlayWindow<B: OverlayBackend> {
    backend: Arc<B>,
    surface: B::Surface,
    source: Weak<RenderSource>,
    bounds: ScreenRect,
    previous_frame_drawn: bool,
    painted_version: Option<u64>,
    destroyed: bool,
}

impl<B: OverlayBackend> OverlayWindow<B> {
    pub fn create(backend: Arc<B>, source: Weak<RenderSource>) -> Result<Self> {
        tracing::debug!("creating highlighter window");
        let bounds = screen_bounds(&backend.monitors())
            .ok_or_else(|| anyhow!("no display reported usable geometry"))?;
        let surface = backend.create_surface(bounds)?;
        Ok(Self {
            backend,
            surface,
            source,
            bounds,
            previous_frame_drawn: false,
            painted_version: None,
            destroyed: false,
        })
    }

    pub fn waker(&self) -> WakerOf<B> {
        self.surface.waker()
    }

    pub fn bounds(&self) -> ScreenRect {
        self.bounds
    }

    pub fn invalidate(&self) {
        self.surface.waker().invalidate();
    }

    /// Repaints when the registry changed since the last frame.
    pub fn on_timer_tick(&self) {
        let stale = match self.source.upgrade() {
            Some(source) => self.painted_version != Some(source.registry.version()),
            // The paint path notices the engine is gone and stops the loop.
            None => true,
        };
        if stale {
            self.invalidate();
        }
    }

    /// Paints one frame. Returns `false` when the owning engine is gone and
    /// the render loop should stop.
    pub fn on_paint(&mut self) -> bool {
        let Some(source) = self.source.upgrade() else {
            tracing::warn!("highlighter engine went away; stopping render loop");
            self.surface.present(&FramePlan::Skip);
            return false;
        };
        let (version, instructions) = source.draw_instructions();
        drop(source);
        self.painted_version = Some(version);

        let strokes = compose_frame(&instructions, self.bounds, self.surface.scale_factor());
        let plan = plan_frame(strokes, self.previous_frame_drawn);
        self.previous_frame_drawn = matches!(plan, FramePlan::Draw(_));
        self.surface.present(&plan);
        true
    }

    pub fn on_display_change(&mut self) {
        tracing::debug!("updating highlighter window location for displays");
        let Some(bounds) = screen_bounds(&self.backend.monitors()) else {
            tracing::debug!("display geometry not available yet; retrying shortly");
            self.surface.defer_display_change();
            return;
        };
        match self.surface.reposition(bounds) {
            Ok(()) => {
                self.bounds = bounds;
                self.invalidate();
            }
            Err(err) => {
                tracing::warn!("failed to reposition highlighter window: {err:#}");
                self.surface.defer_display_change();
            }
        }
    }

    pub fn run(&mut self) {
        loop {
            match self.surface.next_event() {
                RenderEvent::Paint => {
                    if !self.on_paint() {
                        break;
                    }
                }
                RenderEvent::Tick => self.on_timer_tick(),
                RenderEvent::DisplayChanged => self.on_display_change(),
                RenderEvent::Quit => {
                    tracing::debug!("quit message received on highlighter thread");
                    break;
                }
            }
        }
    }

    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        tracing::info!("destroying highlighter window");
        self.surface.destroy();
    }
}

impl<B: OverlayBackend> Drop for OverlayWindow<B> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::headless::{HeadlessBackend, HeadlessWaker};
    use crate::highlight::model::EnabledContexts;
    use crate::highlight::registry::RegionSnapshot;
    use crate::settings::ContextToggles;
    use std::sync::{mpsc, RwLock};
    use std::thread::JoinHandle;
    use std::time::{Duration, Instant};

    fn instructions(rects: &[(Context, ScreenRect)]) -> Vec<DrawInstruction> {
        draw_instructions(
            &RegionSnapshot::from_rects(rects.iter().copied()),
            EnabledContexts::ALL,
            &StyleTable::default(),
        )
    }

    #[test]
    fn offscreen_instruction_does_not_block_the_rest() {
        let bounds = ScreenRect::new(0, 0, 1920, 1079);
        let frame = compose_frame(
            &instructions(&[
                (Context::Focus, ScreenRect::new(5000, 5000, 10, 10)),
                (Context::BrowseMode, ScreenRect::new(100, 100, 10, 10)),
            ]),
            bounds,
            1.0,
        );
        assert_eq!(frame.len(), 1);
        assert_eq!(frame[0].context, Context::BrowseMode);
        assert_eq!(frame[0].rect, ScreenRect::new(98, 98, 14, 14));
    }

    #[test]
    fn invalid_scale_skips_everything_without_panicking() {
        let frame = compose_frame(
            &instructions(&[(Context::Focus, ScreenRect::new(1, 1, 1, 1))]),
            ScreenRect::new(0, 0, 10, 10),
            0.0,
        );
        assert!(frame.is_empty());
    }

    #[test]
    fn stroke_carries_style() {
        let frame = compose_frame(
            &instructions(&[(Context::Focus, ScreenRect::new(10, 10, 50, 20))]),
            ScreenRect::new(0, 0, 1920, 1079),
            1.0,
        );
        let focus = StyleTable::default().focus;
        assert_eq!(frame[0].color, focus.color);
        assert_eq!(frame[0].dash, DashStyle::Dash);
        assert_eq!(frame[0].width, focus.width);
    }

    #[test]
    fn empty_frames_skip_unless_something_is_stale() {
        assert_eq!(plan_frame(Vec::new(), false), FramePlan::Skip);
        assert_eq!(plan_frame(Vec::new(), true), FramePlan::Clear);
        let stroke = Stroke {
            context: Context::Focus,
            rect: ScreenRect::new(0, 0, 1, 1),
            color: HighlightColor::rgb(1, 2, 3),
            width: 1,
            dash: DashStyle::Solid,
        };
        assert_eq!(
            plan_frame(vec![stroke], false),
            FramePlan::Draw(vec![stroke])
        );
    }

    fn render_source() -> Arc<RenderSource> {
        let toggles = Arc::new(RwLock::new(ContextToggles::default()));
        Arc::new(RenderSource::new(
            RegionRegistry::new(toggles),
            StyleTable::default(),
        ))
    }

    fn spawn_window(
        backend: &Arc<HeadlessBackend>,
        source: &Arc<RenderSource>,
    ) -> (HeadlessWaker, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel();
        let backend = Arc::clone(backend);
        let source = Arc::downgrade(source);
        let handle = std::thread::spawn(move || {
            let mut window = OverlayWindow::create(backend, source).unwrap();
            tx.send(window.waker()).unwrap();
            window.run();
        });
        (rx.recv().unwrap(), handle)
    }

    #[test]
    fn timer_tick_paints_through_the_render_loop() {
        let backend = Arc::new(HeadlessBackend::default());
        let source = render_source();
        source
            .registry
            .set(Context::Focus, Some(ScreenRect::new(10, 10, 50, 20)));
        let (waker, handle) = spawn_window(&backend, &source);

        assert!(waker.request_tick());
        let deadline = Instant::now() + Duration::from_secs(2);
        while backend.frames().is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        let Some(FramePlan::Draw(strokes)) = backend.last_drawn_frame() else {
            panic!("tick did not lead to a painted frame");
        };
        assert_eq!(strokes[0].context, Context::Focus);

        assert!(waker.post_quit());
        handle.join().unwrap();
        assert_eq!(backend.live_windows(), 0);
    }

    #[test]
    fn timer_tick_without_changes_paints_nothing() {
        let backend = Arc::new(HeadlessBackend::default());
        let source = render_source();
        let (waker, handle) = spawn_window(&backend, &source);

        assert!(waker.invalidate());
        assert!(waker.request_tick());
        assert!(waker.request_tick());
        assert!(waker.post_quit());
        handle.join().unwrap();
        assert_eq!(backend.frames(), vec![FramePlan::Skip]);
    }

    #[test]
    fn window_of_a_dropped_engine_stops_on_next_paint() {
        let backend = Arc::new(HeadlessBackend::default());
        let source = render_source();
        let (waker, handle) = spawn_window(&backend, &source);
        assert_eq!(backend.live_windows(), 1);

        drop(source);
        assert!(waker.invalidate());
        handle.join().unwrap();

        assert_eq!(backend.live_windows(), 0);
        assert_eq!(backend.frames(), vec![FramePlan::Skip]);
        assert!(!waker.is_alive());
        assert!(!waker.invalidate());
    }
}
