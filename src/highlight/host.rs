use crate::highlight::error::ResolveError;
use crate::highlight::geometry::ScreenRect;
use crate::highlight::model::Context;

/// The assistive-technology host the highlighter serves.
///
/// Both methods are called from the host's own event threads and from the
/// refresh thread, never from the render thread, so they may block briefly.
pub trait HighlightHost: Send + Sync + 'static {
    /// Handle to one of the host's accessible objects.
    type Object: Clone + Send + Sync + 'static;

    /// Resolves `context` to a screen rectangle, optionally scoped to
    /// `object`. Failures are treated as "nothing to highlight".
    fn resolve_region(
        &self,
        context: Context,
        object: Option<&Self::Object>,
    ) -> Result<ScreenRect, ResolveError>;

    /// Whether `object` lies inside the document the browse-mode cursor is
    /// currently operating on.
    fn is_object_in_active_browse_scope(&self, object: &Self::Object) -> bool;
}
