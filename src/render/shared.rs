use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::render::cache::GlyphCache;

/// Shared CPU-side render resources.
///
/// Hosts register glyph outlines here ahead of time; the renderer reads them when executing
/// `FramePacket` commands. Clones share the same caches.
#[derive(Clone, Default)]
pub struct SharedCaches {
    pub glyphs: Arc<Mutex<GlyphCache>>,
}

impl SharedCaches {
    pub fn new() -> Self {
        Self { glyphs: Arc::new(Mutex::new(GlyphCache::new())) }
    }

    /// Lock the glyph cache, recovering from poisoning.
    pub fn lock_glyphs(&self) -> MutexGuard<'_, GlyphCache> {
        self.glyphs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
