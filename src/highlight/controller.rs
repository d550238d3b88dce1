use crate::highlight::error::HighlightError;
use crate::highlight::geometry::ScreenRect;
use crate::highlight::host::HighlightHost;
use crate::highlight::model::{Context, EnabledContexts};
use crate::highlight::overlay::{
    OverlayBackend, OverlayWindow, RenderSource, RenderWaker, WakerOf,
};
use crate::highlight::registry::RegionRegistry;
use crate::highlight::scheduler::RefreshScheduler;
use crate::highlight::state::{can_transition, HighlighterLifecycle};
use crate::highlight::NativeBackend;
use crate::settings::{ContextToggles, HighlightSettings};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

const RENDER_THREAD_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

type ReadySignal<B> = Result<WakerOf<B>, String>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared with the refresh thread. Host callbacks only ever take the
/// short-lived locks in here.
struct Core<H: HighlightHost, B: OverlayBackend> {
    host: H,
    toggles: Arc<RwLock<ContextToggles>>,
    source: Arc<RenderSource>,
    last_focus: Mutex<Option<H::Object>>,
    waker: Mutex<Option<WakerOf<B>>>,
    /// Registry writes hold the read side; lifecycle changes take the write
    /// side, so no write lands after teardown has cleared the registry.
    lifecycle: RwLock<HighlighterLifecycle>,
}

impl<H: HighlightHost, B: OverlayBackend> Core<H, B> {
    fn lifecycle(&self) -> HighlighterLifecycle {
        *self.lifecycle.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, to: HighlighterLifecycle) -> Result<(), HighlightError> {
        let mut lifecycle = self.lifecycle.write().unwrap_or_else(PoisonError::into_inner);
        if !can_transition(*lifecycle, to) {
            return Err(HighlightError::InvalidTransition {
                from: *lifecycle,
                to,
            });
        }
        tracing::debug!(from = ?*lifecycle, ?to, "highlighter lifecycle");
        *lifecycle = to;
        Ok(())
    }

    /// Runs `apply` only while the engine is running, blocking lifecycle
    /// changes until it returns.
    fn commit<T>(&self, apply: impl FnOnce() -> T) -> Option<T> {
        let lifecycle = self.lifecycle.read().unwrap_or_else(PoisonError::into_inner);
        lifecycle.is_running().then(apply)
    }

    fn registry(&self) -> &RegionRegistry {
        &self.source.registry
    }

    fn reset_tracking(&self) {
        self.registry().clear();
        *lock(&self.last_focus) = None;
    }

    /// Asks the host for `context`'s rectangle. `None` means the context is
    /// disabled and must not be touched; resolution failures become an
    /// absent rectangle.
    fn resolve(&self, context: Context, object: Option<&H::Object>) -> Option<Option<ScreenRect>> {
        if !self.registry().enabled_contexts().contains(context) {
            return None;
        }
        match self.host.resolve_region(context, object) {
            Ok(rect) => Some(Some(rect)),
            Err(err) => {
                tracing::trace!(?context, "no highlight region: {err}");
                Some(None)
            }
        }
    }

    /// Resolves `context` through the host and stores the result. Returns
    /// whether the registry changed.
    fn store_rect(&self, context: Context, object: Option<&H::Object>) -> bool {
        let Some(rect) = self.resolve(context, object) else {
            return false;
        };
        self.commit(|| self.registry().set(context, rect)).unwrap_or(false)
    }

    fn invalidate(&self) {
        let waker = lock(&self.waker).clone();
        if let Some(waker) = waker {
            if !waker.invalidate() {
                tracing::debug!("highlighter window is gone; invalidate ignored");
            }
        }
    }

    fn update_context_rect(&self, context: Context, object: Option<&H::Object>) {
        if !self.lifecycle().is_running() {
            return;
        }
        if self.store_rect(context, object) {
            self.invalidate();
        }
    }

    fn handle_focus_change(&self, object: H::Object) {
        if !self.lifecycle().is_running() {
            return;
        }
        let focus = self.resolve(Context::Focus, Some(&object));
        let in_browse_scope = self.host.is_object_in_active_browse_scope(&object);
        let browse = if in_browse_scope {
            self.resolve(Context::BrowseMode, None)
        } else {
            None
        };
        let changed = self.commit(|| {
            *lock(&self.last_focus) = Some(object);
            let registry = self.registry();
            let mut changed = focus.is_some_and(|rect| registry.set(Context::Focus, rect));
            if !in_browse_scope {
                changed |= registry.clear_context(Context::BrowseMode);
            } else if let Some(rect) = browse {
                changed |= registry.set(Context::BrowseMode, rect);
            }
            changed
        });
        if changed == Some(true) {
            self.invalidate();
        }
    }

    fn repoll(&self) {
        if !self.lifecycle().is_running() {
            return;
        }
        let focus = lock(&self.last_focus).clone();
        self.store_rect(Context::Focus, focus.as_ref());
        self.store_rect(Context::Navigator, None);
        self.store_rect(Context::BrowseMode, None);
    }

    fn refresh(&self) {
        self.repoll();
        if self.lifecycle().is_running() {
            self.invalidate();
        }
    }

    /// Refresh-timer callback: re-polls, then hands the tick to the render
    /// thread, which repaints if the registry moved.
    fn on_refresh_tick(&self) {
        if !self.lifecycle().is_running() {
            return;
        }
        self.repoll();
        let waker = lock(&self.waker).clone();
        if let Some(waker) = waker {
            if !waker.request_tick() {
                tracing::debug!("highlighter window is gone; tick ignored");
            }
        }
    }
}

struct StartFailure {
    error: HighlightError,
    render_thread_exiting: bool,
}

#[derive(Default)]
struct Runtime {
    render_thread: Option<JoinHandle<()>>,
    scheduler: Option<RefreshScheduler>,
}

/// The highlighting engine: owns the render thread, the refresh scheduler
/// and the region registry, and turns host callbacks into registry writes.
pub struct Highlighter<H: HighlightHost, B: OverlayBackend = NativeBackend> {
    core: Arc<Core<H, B>>,
    backend: Arc<B>,
    refresh_interval: Duration,
    ready_timeout: Duration,
    runtime: Mutex<Runtime>,
}

impl<H: HighlightHost> Highlighter<H, NativeBackend> {
    pub fn new(host: H, settings: &HighlightSettings) -> Self {
        Self::with_backend(host, crate::highlight::native_backend(settings), settings)
    }
}

impl<H: HighlightHost, B: OverlayBackend> Highlighter<H, B> {
    pub fn with_backend(host: H, backend: B, settings: &HighlightSettings) -> Self {
        let toggles = Arc::new(RwLock::new(settings.contexts));
        let registry = RegionRegistry::new(Arc::clone(&toggles));
        Self {
            core: Arc::new(Core {
                host,
                toggles,
                source: Arc::new(RenderSource::new(registry, settings.styles.sanitized())),
                last_focus: Mutex::new(None),
                waker: Mutex::new(None),
                lifecycle: RwLock::new(HighlighterLifecycle::Uninitialized),
            }),
            backend: Arc::new(backend),
            refresh_interval: settings.refresh_interval(),
            ready_timeout: settings.ready_timeout(),
            runtime: Mutex::new(Runtime::default()),
        }
    }

    pub fn lifecycle(&self) -> HighlighterLifecycle {
        self.core.lifecycle()
    }

    pub fn registry(&self) -> &RegionRegistry {
        self.core.registry()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn enabled_contexts(&self) -> EnabledContexts {
        self.core.registry().enabled_contexts()
    }

    /// Spawns the render thread and waits for its window to come up.
    ///
    /// On error nothing is left running: the engine is `Terminated` and can
    /// be started again. Starting a running engine is a no-op.
    pub fn start(&self) -> Result<(), HighlightError> {
        let mut runtime = lock(&self.runtime);
        match self.core.lifecycle() {
            HighlighterLifecycle::Running => return Ok(()),
            state if !state.can_start() => {
                return Err(HighlightError::InvalidTransition {
                    from: state,
                    to: HighlighterLifecycle::Starting,
                })
            }
            _ => {}
        }
        self.core.transition(HighlighterLifecycle::Starting)?;
        self.core.reset_tracking();
        tracing::debug!("starting highlighter");

        match self.spawn_render_thread(&mut runtime) {
            Ok(()) => {
                self.core.transition(HighlighterLifecycle::Running)?;
                tracing::info!("highlighter started");
                self.core.refresh();
                Ok(())
            }
            Err(err) => {
                tracing::error!("highlighter failed to start: {err}");
                *lock(&self.core.waker) = None;
                self.core.reset_tracking();
                self.core.transition(HighlighterLifecycle::Terminated)?;
                Err(err)
            }
        }
    }

    fn spawn_render_thread(&self, runtime: &mut Runtime) -> Result<(), HighlightError> {
        let (ready_tx, ready_rx) = mpsc::channel::<ReadySignal<B>>();
        let abandoned = Arc::new(Mutex::new(false));
        let backend = Arc::clone(&self.backend);
        let source = Arc::downgrade(&self.core.source);
        let thread_abandoned = Arc::clone(&abandoned);
        let handle = std::thread::Builder::new()
            .name("focus-highlighter".into())
            .spawn(move || render_thread_main(backend, source, thread_abandoned, ready_tx))
            .map_err(HighlightError::ThreadSpawn)?;

        let waker = match self.await_ready(&ready_rx, &abandoned) {
            Ok(waker) => waker,
            Err(failure) => {
                if failure.render_thread_exiting {
                    join_render_thread(handle, "start-up");
                }
                // Otherwise the thread is still building its window; it sees
                // the abandoned flag and tears the window down by itself.
                return Err(failure.error);
            }
        };

        let weak_core = Arc::downgrade(&self.core);
        let scheduler = RefreshScheduler::start(self.refresh_interval, move || {
            if let Some(core) = weak_core.upgrade() {
                core.on_refresh_tick();
            }
        });
        let scheduler = match scheduler {
            Ok(scheduler) => scheduler,
            Err(err) => {
                waker.post_quit();
                join_render_thread(handle, "start-up");
                return Err(err);
            }
        };

        *lock(&self.core.waker) = Some(waker);
        runtime.render_thread = Some(handle);
        runtime.scheduler = Some(scheduler);
        Ok(())
    }

    fn await_ready(
        &self,
        ready_rx: &Receiver<ReadySignal<B>>,
        abandoned: &Mutex<bool>,
    ) -> Result<WakerOf<B>, StartFailure> {
        let exited = |error| StartFailure {
            error,
            render_thread_exiting: true,
        };
        match ready_rx.recv_timeout(self.ready_timeout) {
            Ok(Ok(waker)) => Ok(waker),
            Ok(Err(reason)) => Err(exited(HighlightError::WindowCreation(reason))),
            Err(RecvTimeoutError::Disconnected) => Err(exited(HighlightError::RenderThreadExited)),
            Err(RecvTimeoutError::Timeout) => {
                // The render thread only reports ready while holding this
                // lock, so after setting the flag either its signal is already
                // queued or it will see the flag and discard its window.
                let mut abandoned = lock(abandoned);
                *abandoned = true;
                let late = match ready_rx.try_recv() {
                    Ok(Ok(late)) => {
                        tracing::debug!("highlighter window came up after the deadline; closing it");
                        late.post_quit();
                        true
                    }
                    Ok(Err(_)) | Err(mpsc::TryRecvError::Disconnected) => true,
                    Err(mpsc::TryRecvError::Empty) => false,
                };
                Err(StartFailure {
                    error: HighlightError::ReadyTimeout(self.ready_timeout),
                    render_thread_exiting: late,
                })
            }
        }
    }

    /// Stops the refresh timer, quits the render thread and waits for it,
    /// then clears the registry. A second call is a no-op.
    pub fn terminate(&self) -> Result<(), HighlightError> {
        let mut runtime = lock(&self.runtime);
        if !self.core.lifecycle().is_running() {
            return Ok(());
        }
        self.core.transition(HighlighterLifecycle::Terminating)?;
        tracing::debug!("terminating highlighter");

        if let Some(mut scheduler) = runtime.scheduler.take() {
            scheduler.cancel();
        }

        let waker = lock(&self.core.waker).take();
        let mut result = Ok(());
        if let Some(handle) = runtime.render_thread.take() {
            let quit_posted = waker.as_ref().is_some_and(|w| w.post_quit());
            let exiting = waker.as_ref().map_or(true, |w| !w.is_alive());
            if quit_posted || exiting || handle.is_finished() {
                join_render_thread(handle, "terminate");
            } else {
                tracing::error!("could not signal highlighter thread to quit");
                result = Err(HighlightError::QuitSignal);
            }
        }

        self.core.reset_tracking();
        self.core.transition(HighlighterLifecycle::Terminated)?;
        tracing::info!("highlighter terminated");
        result
    }

    pub fn handle_focus_change(&self, object: H::Object) {
        self.core.handle_focus_change(object);
    }

    pub fn handle_review_move(&self) {
        self.core.update_context_rect(Context::Navigator, None);
    }

    pub fn handle_browse_mode_move(&self) {
        self.core.update_context_rect(Context::BrowseMode, None);
    }

    pub fn update_context_rect(&self, context: Context, object: Option<&H::Object>) {
        self.core.update_context_rect(context, object);
    }

    /// Re-resolves every tracked context and requests a repaint.
    pub fn refresh(&self) {
        self.core.refresh();
    }

    pub fn invalidate(&self) {
        if self.core.lifecycle().is_running() {
            self.core.invalidate();
        }
    }

    /// Stores new per-context toggles and starts or stops the whole engine
    /// depending on whether any context is still enabled.
    pub fn apply_toggles(&self, toggles: ContextToggles) -> Result<(), HighlightError> {
        let any_enabled = toggles.any_enabled();
        *self
            .core
            .toggles
            .write()
            .unwrap_or_else(PoisonError::into_inner) = toggles;
        if !any_enabled {
            return self.terminate();
        }
        if self.core.lifecycle().is_running() {
            self.core.refresh();
            Ok(())
        } else {
            self.start()
        }
    }
}

impl<H: HighlightHost, B: OverlayBackend> Drop for Highlighter<H, B> {
    fn drop(&mut self) {
        if let Err(err) = self.terminate() {
            tracing::warn!("highlighter shutdown on drop failed: {err}");
        }
    }
}

fn render_thread_main<B: OverlayBackend>(
    backend: Arc<B>,
    source: Weak<RenderSource>,
    abandoned: Arc<Mutex<bool>>,
    ready_tx: Sender<ReadySignal<B>>,
) {
    let mut window = match OverlayWindow::create(backend, source) {
        Ok(window) => window,
        Err(err) => {
            let _ = ready_tx.send(Err(format!("{err:#}")));
            return;
        }
    };
    {
        let abandoned = lock(&abandoned);
        if *abandoned {
            tracing::debug!("highlighter start-up was abandoned; discarding window");
            return;
        }
        if ready_tx.send(Ok(window.waker())).is_err() {
            return;
        }
    }
    window.run();
    window.destroy();
}

fn join_render_thread(handle: JoinHandle<()>, source: &str) {
    let (done_tx, done_rx) = mpsc::channel();
    let joiner = std::thread::spawn(move || {
        let _ = done_tx.send(handle.join());
    });
    match done_rx.recv_timeout(RENDER_THREAD_JOIN_TIMEOUT) {
        Ok(Ok(())) => {
            let _ = joiner.join();
        }
        Ok(Err(_)) => tracing::error!("highlighter thread panicked during {source}"),
        Err(RecvTimeoutError::Timeout) => {
            tracing::error!("highlighter thread join timed out during {source}")
        }
        Err(RecvTimeoutError::Disconnected) => {
            tracing::error!("highlighter thread join channel disconnected during {source}")
        }
    }
}
