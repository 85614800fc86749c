//! Triangle scan conversion in fixed point.
//!
//! Vertices are snapped to 1/256 pixel. A fragment is produced for every pixel centre inside
//! the triangle; centres exactly on an edge are owned by top and left edges only, so two
//! triangles sharing an edge never both cover the same centre. This is what lets a triangle
//! fan add up to the exact winding number of the contour.

use crate::render::counters::Facing;

/// Sub-pixel precision of snapped vertex coordinates.
pub const SUBPIXEL_BITS: u32 = 8;
const SUBPIXEL_ONE: i64 = 1 << SUBPIXEL_BITS;
const HALF_PIXEL: i64 = SUBPIXEL_ONE / 2;

/// Snapped coordinates are clamped to +/- this many fixed-point units (2^21 pixels), which keeps
/// every edge-function product inside `i64`.
const GUARD_BAND: i64 = 1 << 29;

/// Which screen winding counts as front-facing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrontFace {
    /// Clockwise on screen is front-facing.
    #[default]
    Cw,
    /// Counter-clockwise on screen is front-facing.
    Ccw,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FixedPoint {
    x: i64,
    y: i64,
}

fn snap(v: f32) -> Option<i64> {
    if !v.is_finite() {
        return None;
    }
    let fixed = (v as f64 * SUBPIXEL_ONE as f64).round();
    Some((fixed as i64).clamp(-GUARD_BAND, GUARD_BAND))
}

/// Edge function of `a -> b` evaluated at `p`.
#[inline(always)]
fn edge(a: FixedPoint, b: FixedPoint, p: FixedPoint) -> i64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

#[inline(always)]
fn floor_div(v: i64, d: i64) -> i64 {
    v.div_euclid(d)
}

/// A fragment produced by [`Triangle::rasterize`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fragment {
    pub x: u32,
    pub y: u32,
    /// Barycentric weights of the three input vertices at the pixel centre.
    pub bary: [f64; 3],
}

/// A triangle set up for rasterization in framebuffer space (x right, y down, pixels).
#[derive(Clone, Copy, Debug)]
pub struct Triangle {
    v: [FixedPoint; 3],
    /// Twice the signed area; positive when the triangle is clockwise on screen.
    area: i64,
}

impl Triangle {
    /// Snap the vertices and compute the signed area.
    ///
    /// Returns `None` for non-finite input and for triangles with zero area after snapping.
    pub fn setup(verts: [[f32; 2]; 3]) -> Option<Self> {
        let mut v = [FixedPoint { x: 0, y: 0 }; 3];
        for (out, p) in v.iter_mut().zip(verts.iter()) {
            *out = FixedPoint { x: snap(p[0])?, y: snap(p[1])? };
        }
        let area = edge(v[0], v[1], v[2]);
        if area == 0 {
            return None;
        }
        Some(Self { v, area })
    }

    pub fn facing(&self, front_face: FrontFace) -> Facing {
        // Framebuffer y points down, so a positive area is clockwise on screen.
        let clockwise = self.area > 0;
        match (front_face, clockwise) {
            (FrontFace::Cw, true) | (FrontFace::Ccw, false) => Facing::Front,
            _ => Facing::Back,
        }
    }

    /// Pixel bounds `(x0, y0, x1, y1)` (inclusive) clipped to the surface, or `None` if the
    /// triangle misses it entirely.
    fn pixel_bounds(&self, width: u32, height: u32) -> Option<(i64, i64, i64, i64)> {
        if width == 0 || height == 0 {
            return None;
        }
        let minx = self.v.iter().map(|p| p.x).min()?;
        let maxx = self.v.iter().map(|p| p.x).max()?;
        let miny = self.v.iter().map(|p| p.y).min()?;
        let maxy = self.v.iter().map(|p| p.y).max()?;

        // Pixel `i` has its centre at `i * ONE + HALF`.
        let x0 = floor_div(minx - HALF_PIXEL, SUBPIXEL_ONE).max(0);
        let y0 = floor_div(miny - HALF_PIXEL, SUBPIXEL_ONE).max(0);
        let x1 = floor_div(maxx - HALF_PIXEL, SUBPIXEL_ONE).min(width as i64 - 1);
        let y1 = floor_div(maxy - HALF_PIXEL, SUBPIXEL_ONE).min(height as i64 - 1);
        if x1 < x0 || y1 < y0 {
            return None;
        }
        Some((x0, y0, x1, y1))
    }

    /// Top-left rule for the edge opposite vertex `i`, in clockwise-on-screen orientation.
    fn owns_edge(&self, i: usize) -> bool {
        let a = self.v[(i + 1) % 3];
        let b = self.v[(i + 2) % 3];
        let sign = self.area.signum();
        let dx = (b.x - a.x) * sign;
        let dy = (b.y - a.y) * sign;
        // Top edge: horizontal, running right. Left edge: running up.
        (dy == 0 && dx > 0) || dy < 0
    }

    /// Call `f` for every covered pixel centre inside a `width` x `height` surface.
    pub fn rasterize(&self, width: u32, height: u32, mut f: impl FnMut(Fragment)) {
        let Some((x0, y0, x1, y1)) = self.pixel_bounds(width, height) else {
            return;
        };
        let sign = self.area.signum();
        let owns = [self.owns_edge(0), self.owns_edge(1), self.owns_edge(2)];
        let area = (self.area * sign) as f64;

        for py in y0..=y1 {
            let cy = py * SUBPIXEL_ONE + HALF_PIXEL;
            for px in x0..=x1 {
                let p = FixedPoint { x: px * SUBPIXEL_ONE + HALF_PIXEL, y: cy };
                let mut w = [0i64; 3];
                let mut inside = true;
                for i in 0..3 {
                    let wi = edge(self.v[(i + 1) % 3], self.v[(i + 2) % 3], p) * sign;
                    if wi < 0 || (wi == 0 && !owns[i]) {
                        inside = false;
                        break;
                    }
                    w[i] = wi;
                }
                if !inside {
                    continue;
                }
                f(Fragment {
                    x: px as u32,
                    y: py as u32,
                    bary: [w[0] as f64 / area, w[1] as f64 / area, w[2] as f64 / area],
                });
            }
        }
    }
}
