use crate::highlight::state::HighlighterLifecycle;
use std::time::Duration;
use thiserror::Error;

/// Fatal engine errors. Anything reported through this type leaves the
/// engine terminated with no render thread or window alive.
#[derive(Debug, Error)]
pub enum HighlightError {
    #[error("failed to create highlighter window: {0}")]
    WindowCreation(String),
    #[error("highlighter thread did not report ready within {0:?}")]
    ReadyTimeout(Duration),
    #[error("highlighter thread exited before reporting ready")]
    RenderThreadExited,
    #[error("failed to spawn highlighter thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
    #[error("failed to start refresh scheduler: {0}")]
    Scheduler(String),
    #[error("invalid highlighter lifecycle transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: HighlighterLifecycle,
        to: HighlighterLifecycle,
    },
    #[error("failed to post quit message to highlighter thread")]
    QuitSignal,
}

/// Reasons the host could not turn a context into a rectangle. The
/// controller treats every variant as "no rectangle".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("object is no longer available")]
    Gone,
    #[error("context is not supported for this object")]
    Unsupported,
    #[error("transient failure: {0}")]
    Transient(String),
}
