use crate::util::config::RenderConfig;

/// Key of a glyph outline registered in the glyph cache.
pub type GlyphKey = u32;

/// One quadratic segment `[p0, p1, p2]` relative to its contour's origin, in em units.
pub type Curve = [[f32; 2]; 3];

/// Axis-aligned bounds in em units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RectF {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

impl RectF {
    /// Bounds of every point of `curves` plus the contour origin, or `None` for no curves.
    ///
    /// The origin is included because every fan triangle has a vertex there.
    pub fn from_curves(curves: &[Curve]) -> Option<Self> {
        if curves.is_empty() {
            return None;
        }
        let mut r = RectF { min: [0.0, 0.0], max: [0.0, 0.0] };
        for p in curves.iter().flatten() {
            r.min = [r.min[0].min(p[0]), r.min[1].min(p[1])];
            r.max = [r.max[0].max(p[0]), r.max[1].max(p[1])];
        }
        Some(r)
    }

    pub fn translated(self, by: [f32; 2]) -> Self {
        Self {
            min: [self.min[0] + by[0], self.min[1] + by[1]],
            max: [self.max[0] + by[0], self.max[1] + by[1]],
        }
    }

    pub fn corners(self) -> [[f32; 2]; 4] {
        [
            self.min,
            [self.max[0], self.min[1]],
            self.max,
            [self.min[0], self.max[1]],
        ]
    }
}

#[derive(Clone, Debug)]
pub enum RenderCmd {
    /// Draw a glyph registered in `SharedCaches.glyphs`, its origin placed at `offset` (em).
    DrawGlyph { glyph_key: GlyphKey, offset: [f32; 2] },

    /// Draw one closed outline given inline, its origin placed at `offset` (em).
    DrawCurves { offset: [f32; 2], curves: Vec<Curve> },
}

/// Everything the renderer needs for one frame.
#[derive(Clone, Debug)]
pub struct FramePacket {
    /// Output width and height in pixels.
    pub output_size: [u32; 2],
    /// Pixels per em unit.
    pub px_per_em: f32,
    /// Translation applied to every command, in em units.
    pub translation: [f32; 2],
    pub gamma: f32,
    pub subpixel_aa: bool,
    pub cmds: Vec<RenderCmd>,
}

impl FramePacket {
    pub fn new(output_size: [u32; 2], px_per_em: f32) -> Self {
        Self::with_config(output_size, px_per_em, &RenderConfig::default())
    }

    /// A packet whose gamma and subpixel flag come from `config`.
    pub fn with_config(output_size: [u32; 2], px_per_em: f32, config: &RenderConfig) -> Self {
        Self {
            output_size,
            px_per_em,
            translation: [0.0, 0.0],
            gamma: config.gamma,
            subpixel_aa: config.subpixel_aa,
            cmds: Vec::new(),
        }
    }

    /// Drop all commands and resize, keeping the command allocation.
    pub fn reset(&mut self, output_size: [u32; 2]) {
        self.output_size = output_size;
        self.cmds.clear();
    }

    pub fn draw_glyph(&mut self, glyph_key: GlyphKey, offset: [f32; 2]) {
        self.cmds.push(RenderCmd::DrawGlyph { glyph_key, offset });
    }

    pub fn draw_curves(&mut self, offset: [f32; 2], curves: Vec<Curve>) {
        self.cmds.push(RenderCmd::DrawCurves { offset, curves });
    }

    /// Base clip-space scale (`2 * px_per_em / size` per axis).
    pub fn clip_scale(&self) -> [f32; 2] {
        [
            2.0 * self.px_per_em / self.output_size[0] as f32,
            2.0 * self.px_per_em / self.output_size[1] as f32,
        ]
    }
}
