use crate::highlight::geometry::ScreenRect;
use crate::highlight::model::{Context, EnabledContexts};
use crate::settings::ContextToggles;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Immutable copy of the tracked rectangles, taken for one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegionSnapshot {
    rects: [Option<ScreenRect>; 3],
    version: u64,
}

impl RegionSnapshot {
    pub fn from_rects(rects: impl IntoIterator<Item = (Context, ScreenRect)>) -> Self {
        let mut snapshot = Self::default();
        for (context, rect) in rects {
            if let Some(index) = context.tracked_index() {
                snapshot.rects[index] = Some(rect);
            }
        }
        snapshot
    }

    pub fn get(&self, context: Context) -> Option<ScreenRect> {
        context
            .tracked_index()
            .and_then(|index| self.rects[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Context, ScreenRect)> + '_ {
        Context::TRACKED
            .into_iter()
            .filter_map(|context| self.get(context).map(|rect| (context, rect)))
    }

    pub fn is_empty(&self) -> bool {
        self.rects.iter().all(Option::is_none)
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Shared mapping from context to its current rectangle.
///
/// Every access goes through one short-held mutex: writers hold it while
/// replacing a single entry, readers while copying the whole map. Nothing
/// else ever runs under the lock.
pub struct RegionRegistry {
    rects: Mutex<[Option<ScreenRect>; 3]>,
    version: AtomicU64,
    toggles: Arc<RwLock<ContextToggles>>,
}

impl RegionRegistry {
    pub fn new(toggles: Arc<RwLock<ContextToggles>>) -> Self {
        Self {
            rects: Mutex::new([None; 3]),
            version: AtomicU64::new(0),
            toggles,
        }
    }

    fn entries(&self) -> MutexGuard<'_, [Option<ScreenRect>; 3]> {
        // A panic elsewhere must not turn later writes into silent drops.
        self.rects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enabled_contexts(&self) -> EnabledContexts {
        self.toggles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .enabled_contexts()
    }

    /// Replaces the rectangle for `context`. Disabled and composite contexts
    /// are ignored. Returns whether the stored value changed.
    pub fn set(&self, context: Context, rect: Option<ScreenRect>) -> bool {
        let Some(index) = context.tracked_index() else {
            tracing::debug!(?context, "composite context cannot be written directly");
            return false;
        };
        if !self.enabled_contexts().contains(context) {
            return false;
        }
        let mut entries = self.entries();
        let changed = entries[index] != rect;
        entries[index] = rect;
        if changed {
            self.version.fetch_add(1, Ordering::Release);
        }
        changed
    }

    /// Removes the entry for `context` regardless of whether it is enabled.
    pub fn clear_context(&self, context: Context) -> bool {
        let Some(index) = context.tracked_index() else {
            return false;
        };
        let mut entries = self.entries();
        let removed = entries[index].take().is_some();
        if removed {
            self.version.fetch_add(1, Ordering::Release);
        }
        removed
    }

    pub fn get(&self, context: Context) -> Option<ScreenRect> {
        let index = context.tracked_index()?;
        self.entries()[index]
    }

    pub fn snapshot(&self) -> RegionSnapshot {
        let entries = self.entries();
        RegionSnapshot {
            rects: *entries,
            version: self.version.load(Ordering::Acquire),
        }
    }

    pub fn clear(&self) {
        let mut entries = self.entries();
        if entries.iter().any(Option::is_some) {
            *entries = [None; 3];
            self.version.fetch_add(1, Ordering::Release);
        }
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}
