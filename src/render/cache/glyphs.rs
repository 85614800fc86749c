use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::render::frame::{Curve, GlyphKey, RectF};

/// A registered glyph: its closed contours as quadratic segments, in em units.
#[derive(Clone, Debug)]
pub struct GlyphOutline {
    pub curves: Vec<Curve>,
    /// Bounds of all curves and the origin; `None` for an empty glyph (e.g. a space).
    pub bounds: Option<RectF>,
}

impl GlyphOutline {
    pub fn new(curves: Vec<Curve>) -> Self {
        let bounds = RectF::from_curves(&curves);
        Self { curves, bounds }
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }
}

/// Cache of registered glyph outlines.
///
/// Outlines are recorded once at registration time; drawing only looks them up.
pub struct GlyphCache {
    by_key: HashMap<GlyphKey, GlyphOutline>,
    missing_lookups: AtomicU32,
}

impl Default for GlyphCache {
    fn default() -> Self {
        Self::new()
    }
}

impl GlyphCache {
    pub fn new() -> Self {
        Self { by_key: HashMap::new(), missing_lookups: AtomicU32::new(0) }
    }

    pub fn clear(&mut self) {
        self.by_key.clear();
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Register (or replace) a glyph outline.
    pub fn insert(&mut self, key: GlyphKey, curves: Vec<Curve>) {
        self.by_key.insert(key, GlyphOutline::new(curves));
    }

    pub fn remove(&mut self, key: GlyphKey) -> Option<GlyphOutline> {
        self.by_key.remove(&key)
    }

    pub fn contains_key(&self, key: GlyphKey) -> bool {
        self.by_key.contains_key(&key)
    }

    pub fn get(&self, key: GlyphKey) -> Option<&GlyphOutline> {
        self.by_key.get(&key)
    }

    pub fn get_bounds(&self, key: GlyphKey) -> Option<RectF> {
        self.by_key.get(&key).and_then(|g| g.bounds)
    }

    /// Count a draw that referenced an unregistered key. Returns the new total.
    pub fn record_missing(&self) -> u32 {
        self.missing_lookups.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    pub fn missing_count(&self) -> u32 {
        self.missing_lookups.load(Ordering::Relaxed)
    }
}
