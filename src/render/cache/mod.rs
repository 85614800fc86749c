pub mod glyphs;

pub use glyphs::{GlyphCache, GlyphOutline};
