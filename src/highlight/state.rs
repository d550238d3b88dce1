#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlighterLifecycle {
    Uninitialized,
    Starting,
    Running,
    Terminating,
    Terminated,
}

impl HighlighterLifecycle {
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// True once the engine has stopped (or never started) and can be
    /// started from scratch.
    pub fn can_start(self) -> bool {
        matches!(self, Self::Uninitialized | Self::Terminated)
    }
}

pub fn can_transition(from: HighlighterLifecycle, to: HighlighterLifecycle) -> bool {
    matches!(
        (from, to),
        (HighlighterLifecycle::Uninitialized, HighlighterLifecycle::Starting)
            | (HighlighterLifecycle::Starting, HighlighterLifecycle::Running)
            | (HighlighterLifecycle::Starting, HighlighterLifecycle::Terminated)
            | (HighlighterLifecycle::Running, HighlighterLifecycle::Terminating)
            | (HighlighterLifecycle::Terminating, HighlighterLifecycle::Terminated)
            | (HighlighterLifecycle::Terminated, HighlighterLifecycle::Starting)
    ) || from == to
}
