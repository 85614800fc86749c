//! Accumulation stage.
//!
//! Every [`CurveInstance`] contributes two primitives: the fan triangle `{origin, p0, p2}` and
//! the curve-correction primitive `{p0, p1, p2}`. Each covered fragment adds `+16` (front) or
//! `+1` (back) to the masked channels of its texel. Correction fragments outside the curve are
//! discarded.

use std::ops::AddAssign;

use crate::render::counters::Facing;
use crate::render::curve::{curve_discards, curve_params};
use crate::render::device::CounterTarget;
use crate::render::instance::{AccumulationConfig, CurveInstance};
use crate::render::raster::{Fragment, Triangle};

/// Which primitive of an instance to rasterize.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveKind {
    /// `{origin, p0, p2}`.
    Flat,
    /// `{p0, p1, p2}` with the quadratic discard test.
    Curve,
}

/// Counters gathered while accumulating.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccumulateStats {
    /// Primitives submitted.
    pub primitives: u64,
    /// Primitives dropped before rasterizing: straight corrections, zero area or non-finite.
    pub degenerate: u64,
    /// Fragments written to the counter target.
    pub fragments: u64,
    /// Correction fragments rejected by the curve test.
    pub discarded: u64,
    /// Writes that hit an already saturated counter.
    pub overflows: u64,
}

impl AddAssign for AccumulateStats {
    fn add_assign(&mut self, rhs: Self) {
        self.primitives += rhs.primitives;
        self.degenerate += rhs.degenerate;
        self.fragments += rhs.fragments;
        self.discarded += rhs.discarded;
        self.overflows += rhs.overflows;
    }
}

/// Map clip space to framebuffer pixels (x right, y down).
#[inline(always)]
pub fn clip_to_framebuffer(clip: [f32; 2], width: u32, height: u32) -> [f32; 2] {
    [
        (clip[0] + 1.0) * 0.5 * width as f32,
        (1.0 - clip[1]) * 0.5 * height as f32,
    ]
}

/// Rasterize one primitive of `instance` into `target`.
pub fn draw_primitive<T: CounterTarget>(
    target: &mut T,
    instance: &CurveInstance,
    kind: PrimitiveKind,
    config: &AccumulationConfig,
    stats: &mut AccumulateStats,
) {
    stats.primitives += 1;
    if config.components.is_empty() {
        return;
    }
    if kind == PrimitiveKind::Curve && instance.is_straight() {
        stats.degenerate += 1;
        return;
    }
    let local = match kind {
        PrimitiveKind::Flat => instance.flat_triangle(),
        PrimitiveKind::Curve => instance.curve_triangle(),
    };
    let (width, height) = (target.width(), target.height());
    let fb = local.map(|p| clip_to_framebuffer(config.to_clip(p), width, height));
    let Some(tri) = Triangle::setup(fb) else {
        stats.degenerate += 1;
        return;
    };
    let facing: Facing = tri.facing(config.front_face);
    let mask = config.components;

    tri.rasterize(width, height, |frag: Fragment| {
        if kind == PrimitiveKind::Curve {
            let (t, s) = curve_params(frag.bary);
            if curve_discards(t, s) {
                stats.discarded += 1;
                return;
            }
        }
        stats.fragments += 1;
        if target.add_fragment(frag.x, frag.y, mask, facing) {
            stats.overflows += 1;
        }
    });
}

/// Rasterize one primitive kind for every instance, in order.
pub fn accumulate_kind<T: CounterTarget>(
    target: &mut T,
    instances: &[CurveInstance],
    kind: PrimitiveKind,
    config: &AccumulationConfig,
) -> AccumulateStats {
    let mut stats = AccumulateStats::default();
    for instance in instances {
        draw_primitive(target, instance, kind, config, &mut stats);
    }
    stats
}

/// Full accumulation pass for one config: all fan triangles, then all correction primitives.
pub fn accumulate<T: CounterTarget>(
    target: &mut T,
    instances: &[CurveInstance],
    config: &AccumulationConfig,
) -> AccumulateStats {
    let mut stats = accumulate_kind(target, instances, PrimitiveKind::Flat, config);
    stats += accumulate_kind(target, instances, PrimitiveKind::Curve, config);
    stats
}

/// Instances handed to one rayon task.
#[cfg(feature = "parallel")]
const PARALLEL_CHUNK: usize = 64;

/// Same as [`accumulate_kind`], with instances spread over the rayon pool.
///
/// All workers write through the shared atomic view, so the result is identical to the
/// serial pass. The call returns only after every worker is done.
#[cfg(feature = "parallel")]
pub fn accumulate_kind_parallel(
    target: crate::render::device::SharedCounters<'_>,
    instances: &[CurveInstance],
    kind: PrimitiveKind,
    config: &AccumulationConfig,
) -> AccumulateStats {
    use rayon::prelude::*;

    instances
        .par_chunks(PARALLEL_CHUNK)
        .map(|chunk| {
            let mut target = target;
            accumulate_kind(&mut target, chunk, kind, config)
        })
        .reduce(AccumulateStats::default, |mut a, b| {
            a += b;
            a
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::counters::{Channel, ChannelMask, Texel};
    use crate::render::device::CounterBuffer;
    use crate::render::raster::FrontFace;

    /// Identity-ish config: local units are pixels, origin at the top-left, y down.
    fn pixel_config(width: u32, height: u32, mask: ChannelMask) -> AccumulationConfig {
        AccumulationConfig {
            components: mask,
            scale: [2.0 / width as f32, -2.0 / height as f32],
            translation: [-(width as f32) / 2.0, -(height as f32) / 2.0],
            front_face: FrontFace::Cw,
        }
    }

    /// Clockwise square with straight quads for edges, fanned from its top-left corner.
    fn square(x0: f32, y0: f32, x1: f32, y1: f32) -> Vec<CurveInstance> {
        let (w, h) = (x1 - x0, y1 - y0);
        let pts = [[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]];
        (0..4)
            .map(|i| {
                let a = pts[i];
                let b = pts[(i + 1) % 4];
                let mid = [(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0];
                CurveInstance::new([x0, y0], [a, mid, b])
            })
            .collect()
    }

    #[test]
    fn fan_from_far_origin_cancels_outside() {
        // Same square, but every fan triangle starts at (0, 0): pixels outside the square get
        // matching front and back hits.
        let mut buf = CounterBuffer::new(8, 8);
        let cfg = pixel_config(8, 8, ChannelMask::single(Channel::B));
        let pts = [[2.0, 2.0], [6.0, 2.0], [6.0, 6.0], [2.0, 6.0]];
        let instances: Vec<_> = (0..4)
            .map(|i| {
                let a: [f32; 2] = pts[i];
                let b: [f32; 2] = pts[(i + 1) % 4];
                CurveInstance::new([0.0, 0.0], [a, [(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0], b])
            })
            .collect();
        accumulate(&mut buf, &instances, &cfg);
        let mut cancelled = 0;
        for y in 0..8 {
            for x in 0..8 {
                let t = buf.texel(x, y).unwrap();
                let inside = (2..6).contains(&x) && (2..6).contains(&y);
                assert_eq!(t.winding_total(Channel::B), Ok(inside as u8), "({x},{y})");
                if !inside && t.channel(Channel::B) != 0 {
                    cancelled += 1;
                }
            }
        }
        assert!(cancelled > 0);
    }

    #[test]
    fn framebuffer_mapping() {
        assert_eq!(clip_to_framebuffer([-1.0, 1.0], 8, 4), [0.0, 0.0]);
        assert_eq!(clip_to_framebuffer([1.0, -1.0], 8, 4), [8.0, 4.0]);
        let cfg = pixel_config(8, 4, ChannelMask::ALL);
        assert_eq!(clip_to_framebuffer(cfg.to_clip([3.0, 1.0]), 8, 4), [3.0, 1.0]);
    }

    #[test]
    fn square_has_winding_one_inside_zero_outside() {
        let mut buf = CounterBuffer::new(8, 8);
        let cfg = pixel_config(8, 8, ChannelMask::single(Channel::G));
        let stats = accumulate(&mut buf, &square(2.0, 2.0, 6.0, 6.0), &cfg);
        assert_eq!(stats.overflows, 0);
        for y in 0..8 {
            for x in 0..8 {
                let t = buf.texel(x, y).unwrap();
                let inside = (2..6).contains(&x) && (2..6).contains(&y);
                assert_eq!(t.winding_total(Channel::G), Ok(inside as u8), "({x},{y})");
                assert_eq!(t.channel(Channel::R), 0);
                assert_eq!(t.channel(Channel::B), 0);
                assert_eq!(t.channel(Channel::A), 0);
            }
        }
    }

    #[test]
    fn straight_and_degenerate_segments_add_nothing() {
        let mut buf = CounterBuffer::new(4, 4);
        let cfg = pixel_config(4, 4, ChannelMask::ALL);
        let instances = [
            CurveInstance::new([0.0, 0.0], [[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]]),
            CurveInstance::new([0.0, 0.0], [[2.0, 1.0], [3.0, 3.0], [2.0, 1.0]]),
        ];
        assert!(instances.iter().all(CurveInstance::is_straight));
        let stats = accumulate_kind(&mut buf, &instances, PrimitiveKind::Curve, &cfg);
        assert_eq!(stats.degenerate, 2);
        assert_eq!(stats.fragments, 0);
        assert!(buf.to_texels().iter().all(|t| *t == Texel::ZERO));
    }

    #[test]
    fn empty_mask_writes_nothing() {
        let mut buf = CounterBuffer::new(8, 8);
        let cfg = pixel_config(8, 8, ChannelMask::NONE);
        accumulate(&mut buf, &square(0.0, 0.0, 8.0, 8.0), &cfg);
        assert!(buf.to_texels().iter().all(|t| *t == Texel::ZERO));
    }

    #[test]
    fn curve_correction_keeps_only_the_sliver() {
        // Quad from (0,8) to (8,8) with control (4,0); the curve's apex is at (4,4).
        let mut buf = CounterBuffer::new(8, 8);
        let cfg = pixel_config(8, 8, ChannelMask::single(Channel::R));
        let inst = CurveInstance::new([0.0, 0.0], [[0.0, 8.0], [4.0, 0.0], [8.0, 8.0]]);
        let stats = accumulate_kind(&mut buf, &[inst], PrimitiveKind::Curve, &cfg);
        assert!(stats.discarded > 0);
        assert!(stats.fragments > 0);
        // (4, 5) lies between chord and curve, (4, 2) between curve and control point.
        assert_ne!(buf.texel(4, 5).unwrap().channel(Channel::R), 0);
        assert_eq!(buf.texel(4, 2).unwrap().channel(Channel::R), 0);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_matches_serial() {
        // Tile the surface with 2x2 squares so no counter gets near saturation.
        let mut instances = Vec::new();
        for i in 0..64 {
            let x = (i % 8) as f32 * 2.0;
            let y = (i / 8) as f32 * 2.0;
            instances.extend(square(x, y, x + 2.0, y + 2.0));
        }
        let cfg = pixel_config(16, 16, ChannelMask::RGB);

        let mut serial = CounterBuffer::new(16, 16);
        let s = accumulate_kind(&mut serial, &instances, PrimitiveKind::Flat, &cfg);

        let shared = CounterBuffer::new(16, 16);
        let p = accumulate_kind_parallel(shared.shared(), &instances, PrimitiveKind::Flat, &cfg);

        assert_eq!(s, p);
        assert_eq!(s.overflows, 0);
        assert_eq!(serial.to_texels(), shared.to_texels());
        assert!(serial.to_texels().iter().all(|t| t.winding_total(Channel::R) == Ok(1)));
    }
}
