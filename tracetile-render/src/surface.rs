//! Repaint notification.

/// The window-side surface tiles are drawn onto.
///
/// `invalidate` is called from worker threads whenever a new tile lands in
/// the cache. It must return promptly; it requests a repaint, it does not
/// perform one.
pub trait RenderSurface: Send + Sync {
    /// Requests a repaint.
    fn invalidate(&self);
}

/// A surface that ignores repaint requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSurface;

impl RenderSurface for NullSurface {
    fn invalidate(&self) {}
}
