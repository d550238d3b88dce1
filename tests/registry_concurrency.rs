use focus_highlighter::highlight::registry::RegionRegistry;
use focus_highlighter::highlight::{Context, ScreenRect};
use focus_highlighter::settings::ContextToggles;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

const WRITERS: i32 = 4;
const WRITES_PER_THREAD: i32 = 2_000;

/// Every rect written here has all four fields equal, so a torn write would
/// show up as mismatched fields.
fn uniform(value: i32) -> ScreenRect {
    ScreenRect::new(value, value, value, value)
}

#[test]
fn snapshots_never_observe_partial_writes() {
    let registry = Arc::new(RegionRegistry::new(Arc::new(RwLock::new(
        ContextToggles::default(),
    ))));
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut last_version = 0;
                let mut reads = 0u64;
                while !done.load(Ordering::SeqCst) {
                    let snapshot = registry.snapshot();
                    assert!(snapshot.version() >= last_version);
                    last_version = snapshot.version();
                    for (_, rect) in snapshot.iter() {
                        assert_eq!(rect, uniform(rect.left), "torn rect {rect:?}");
                    }
                    reads += 1;
                }
                reads
            })
        })
        .collect();

    let writers: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let context = Context::TRACKED[writer as usize % Context::TRACKED.len()];
                for i in 0..WRITES_PER_THREAD {
                    let value = writer * WRITES_PER_THREAD + i + 1;
                    registry.set(context, Some(uniform(value)));
                    if i % 100 == 0 {
                        registry.set(context, None);
                    }
                }
                registry.set(context, Some(uniform(writer * 1_000_000 + 1)));
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }

    // Last write wins and nothing is dropped under contention.
    let snapshot = registry.snapshot();
    for context in Context::TRACKED {
        let rect = snapshot.get(context).expect("final write present");
        assert_eq!(rect.left % 1_000_000, 1);
    }
}

#[test]
fn toggle_flip_mid_stream_only_affects_later_writes() {
    let toggles = Arc::new(RwLock::new(ContextToggles::default()));
    let registry = RegionRegistry::new(Arc::clone(&toggles));
    assert!(registry.set(Context::Focus, Some(uniform(1))));
    toggles.write().unwrap().highlight_focus = false;
    assert!(!registry.set(Context::Focus, Some(uniform(2))));
    assert_eq!(registry.get(Context::Focus), Some(uniform(1)));
}
