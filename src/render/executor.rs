use core::sync::atomic::{AtomicU32, Ordering};

use crate::render::accumulate::{self, clip_to_framebuffer, AccumulateStats, PrimitiveKind};
use crate::render::counters::{Channel, ChannelMask};
use crate::render::device::CounterBuffer;
use crate::render::frame::{Curve, FramePacket, RectF, RenderCmd};
use crate::render::instance::{AccumulationConfig, AccumulationUniform, CurveInstance};
use crate::render::raster::FrontFace;
use crate::render::resolve::{AlphaSource, ResolveStats};
use crate::render::samples::SamplePattern;
use crate::render::SharedCaches;
use crate::util::config::{AccumulationMode, RenderConfig};

static MISSING_GLYPH_WARN_COUNT: AtomicU32 = AtomicU32::new(0);
static OVERFLOW_WARN_COUNT: AtomicU32 = AtomicU32::new(0);
static UNDERFLOW_WARN_COUNT: AtomicU32 = AtomicU32::new(0);
static PACKET_WARN_COUNT: AtomicU32 = AtomicU32::new(0);
const WARN_LIMIT: u32 = 8;

/// Pixels of slack when culling commands, covering sample offsets and edge rounding.
const CULL_MARGIN_PX: f32 = 2.0;

/// Log a warning at most [`WARN_LIMIT`] times per counter.
pub(crate) fn warn_limited(counter: &AtomicU32, msg: impl FnOnce() -> String) {
    if counter.fetch_add(1, Ordering::Relaxed) < WARN_LIMIT {
        log::warn!("{}", msg());
    }
}

/// Per-frame counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub commands: u32,
    /// Commands skipped because they lie entirely off the surface.
    pub culled: u32,
    pub missing_glyphs: u32,
    pub instances: u32,
    /// Accumulation passes run (one per sample).
    pub samples: u32,
    pub accumulate: AccumulateStats,
    pub resolve: ResolveStats,
}

/// Turns a `FramePacket` into instances and runs the accumulation passes.
pub struct CommandExecutor {
    instances: Vec<CurveInstance>,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// True if `bounds` (em, already offset) can touch the `width` x `height` surface.
fn bounds_visible(bounds: RectF, packet: &FramePacket, width: u32, height: u32) -> bool {
    let cfg = AccumulationConfig {
        components: ChannelMask::NONE,
        scale: packet.clip_scale(),
        translation: packet.translation,
        front_face: FrontFace::Cw,
    };
    let mut min = [f32::INFINITY; 2];
    let mut max = [f32::NEG_INFINITY; 2];
    for corner in bounds.corners() {
        let p = clip_to_framebuffer(cfg.to_clip(corner), width, height);
        min = [min[0].min(p[0]), min[1].min(p[1])];
        max = [max[0].max(p[0]), max[1].max(p[1])];
    }
    if !(min[0].is_finite() && min[1].is_finite() && max[0].is_finite() && max[1].is_finite()) {
        // Let setup reject it.
        return true;
    }
    !(max[0] < -CULL_MARGIN_PX
        || max[1] < -CULL_MARGIN_PX
        || min[0] > width as f32 + CULL_MARGIN_PX
        || min[1] > height as f32 + CULL_MARGIN_PX)
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self { instances: Vec::new() }
    }

    /// Instances gathered by the last [`CommandExecutor::gather`].
    pub fn instances(&self) -> &[CurveInstance] {
        &self.instances
    }

    fn push_curves(&mut self, offset: [f32; 2], curves: &[Curve]) {
        self.instances.extend(curves.iter().map(|c| CurveInstance::new(offset, *c)));
    }

    /// Build this frame's instance list from the packet's commands.
    pub fn gather(&mut self, packet: &FramePacket, caches: &SharedCaches, stats: &mut FrameStats) {
        self.instances.clear();
        let [width, height] = packet.output_size;
        let glyphs = caches.lock_glyphs();

        for cmd in &packet.cmds {
            stats.commands += 1;
            match cmd {
                RenderCmd::DrawGlyph { glyph_key, offset } => {
                    let Some(glyph) = glyphs.get(*glyph_key) else {
                        stats.missing_glyphs += 1;
                        let total = glyphs.record_missing();
                        warn_limited(&MISSING_GLYPH_WARN_COUNT, || {
                            format!("missing glyph key={glyph_key} (total {total})")
                        });
                        continue;
                    };
                    let Some(bounds) = glyph.bounds else {
                        continue;
                    };
                    if !bounds_visible(bounds.translated(*offset), packet, width, height) {
                        stats.culled += 1;
                        continue;
                    }
                    self.push_curves(*offset, &glyph.curves);
                }
                RenderCmd::DrawCurves { offset, curves } => {
                    let Some(bounds) = RectF::from_curves(curves) else {
                        continue;
                    };
                    if !bounds_visible(bounds.translated(*offset), packet, width, height) {
                        stats.culled += 1;
                        continue;
                    }
                    self.push_curves(*offset, curves);
                }
            }
        }
        stats.instances = self.instances.len() as u32;
    }

    /// Run every sample's accumulation into `target`: fan triangles for all samples first,
    /// then curve corrections for all samples.
    ///
    /// `target` must already be zeroed and sized to the packet's output. The reserved channel
    /// is only written when the resolve stage reads it as alpha.
    pub fn accumulate(
        &self,
        target: &mut CounterBuffer,
        packet: &FramePacket,
        pattern: &SamplePattern,
        config: &RenderConfig,
    ) -> AccumulateStats {
        let base_scale = packet.clip_scale();
        let passes: Vec<AccumulationConfig> = pattern
            .samples()
            .iter()
            .map(|sample| {
                let components = match config.alpha_source {
                    AlphaSource::Coverage => sample.components.without(Channel::A),
                    AlphaSource::Reserved => sample.components,
                };
                let uniform = AccumulationUniform {
                    components: components.to_components(),
                    scale: base_scale,
                    translation: [
                        packet.translation[0] + sample.offset[0] / packet.px_per_em,
                        packet.translation[1] + sample.offset[1] / packet.px_per_em,
                    ],
                };
                AccumulationConfig::from_uniform(&uniform, config.front_face)
            })
            .collect();

        let mut stats = AccumulateStats::default();
        for kind in [PrimitiveKind::Flat, PrimitiveKind::Curve] {
            for pass in &passes {
                stats += self.run_pass(target, kind, pass, config.accumulation);
            }
        }
        log::debug!(
            "accumulate: instances={} passes={} mode={:?} primitives={} degenerate={} fragments={} discarded={}",
            self.instances.len(),
            passes.len(),
            config.accumulation,
            stats.primitives,
            stats.degenerate,
            stats.fragments,
            stats.discarded
        );
        stats
    }

    fn run_pass(
        &self,
        target: &mut CounterBuffer,
        kind: PrimitiveKind,
        pass: &AccumulationConfig,
        mode: AccumulationMode,
    ) -> AccumulateStats {
        match mode {
            AccumulationMode::Serial => accumulate::accumulate_kind(target, &self.instances, kind, pass),
            #[cfg(feature = "parallel")]
            AccumulationMode::Atomic => {
                accumulate::accumulate_kind_parallel(target.shared(), &self.instances, kind, pass)
            }
            #[cfg(not(feature = "parallel"))]
            AccumulationMode::Atomic => {
                let mut shared = target.shared();
                accumulate::accumulate_kind(&mut shared, &self.instances, kind, pass)
            }
        }
    }
}

/// Rate-limited warnings for one finished frame.
pub(crate) fn report_frame(frame: u64, stats: &FrameStats) {
    if stats.accumulate.overflows > 0 {
        warn_limited(&OVERFLOW_WARN_COUNT, || {
            format!(
                "frame {frame}: {} counter overflows; overlap depth exceeds 15",
                stats.accumulate.overflows
            )
        });
    }
    log::debug!(
        "frame {frame}: commands={} culled={} missing_glyphs={} instances={} samples={} overflows={} underflow_px={}",
        stats.commands,
        stats.culled,
        stats.missing_glyphs,
        stats.instances,
        stats.samples,
        stats.accumulate.overflows,
        stats.resolve.underflow_pixels
    );
    if stats.resolve.underflow_pixels > 0 {
        warn_limited(&UNDERFLOW_WARN_COUNT, || {
            format!(
                "frame {frame}: {} pixels with counter underflow; contour winding is inconsistent",
                stats.resolve.underflow_pixels
            )
        });
    }
}

pub(crate) fn warn_bad_packet(msg: impl FnOnce() -> String) {
    warn_limited(&PACKET_WARN_COUNT, msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Clockwise (y-up) square from `min` to `max` in em units.
    fn square(min: [f32; 2], max: [f32; 2]) -> Vec<Curve> {
        let pts = [min, [min[0], max[1]], max, [max[0], min[1]]];
        (0..4)
            .map(|i| {
                let a = pts[i];
                let b = pts[(i + 1) % 4];
                [a, [(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0], b]
            })
            .collect()
    }

    fn unit_square() -> Vec<Curve> {
        square([0.0, 0.0], [1.0, 1.0])
    }

    #[test]
    fn gather_resolves_glyphs_and_culls() {
        let caches = SharedCaches::new();
        caches.lock_glyphs().insert(1, unit_square());
        caches.lock_glyphs().insert(2, Vec::new());

        let mut packet = FramePacket::new([16, 16], 4.0);
        packet.translation = [-2.0, -2.0];
        packet.draw_glyph(1, [0.0, 0.0]);
        packet.draw_glyph(2, [0.0, 0.0]);
        packet.draw_glyph(9, [0.0, 0.0]);
        packet.draw_glyph(1, [100.0, 0.0]);
        packet.draw_curves([1.0, 1.0], unit_square());

        let mut exec = CommandExecutor::new();
        let mut stats = FrameStats::default();
        exec.gather(&packet, &caches, &mut stats);

        assert_eq!(stats.commands, 5);
        assert_eq!(stats.missing_glyphs, 1);
        assert_eq!(stats.culled, 1);
        assert_eq!(stats.instances, 8);
        assert_eq!(exec.instances()[4].offset, [1.0, 1.0]);
        assert_eq!(caches.lock_glyphs().missing_count(), 1);
    }

    #[test]
    fn accumulation_runs_every_sample() {
        let caches = SharedCaches::new();
        let mut packet = FramePacket::new([8, 8], 8.0);
        packet.translation = [-0.5, -0.5];
        packet.draw_curves([0.0, 0.0], square([-1.0, -1.0], [2.0, 2.0]));

        let mut exec = CommandExecutor::new();
        let mut stats = FrameStats::default();
        exec.gather(&packet, &caches, &mut stats);

        let pattern = SamplePattern::lcd();
        let config = RenderConfig::default();
        let mut buf = CounterBuffer::new(8, 8);
        let acc = exec.accumulate(&mut buf, &packet, &pattern, &config);

        // 4 segments x 2 primitive kinds x 6 samples.
        assert_eq!(acc.primitives, 48);
        assert_eq!(acc.overflows, 0);
        // The square overhangs the surface, so every sample lands in every pixel.
        for t in buf.to_texels() {
            assert_eq!(t.winding_total(Channel::R), Ok(2));
            assert_eq!(t.winding_total(Channel::G), Ok(2));
            assert_eq!(t.winding_total(Channel::B), Ok(2));
            assert_eq!(t.winding_total(Channel::A), Ok(0));
        }

        let mut atomic = CounterBuffer::new(8, 8);
        let config = RenderConfig { accumulation: AccumulationMode::Atomic, ..config };
        exec.accumulate(&mut atomic, &packet, &pattern, &config);
        assert_eq!(buf.to_texels(), atomic.to_texels());
    }

    #[test]
    fn reserved_alpha_counts_every_sample() {
        let caches = SharedCaches::new();
        let mut packet = FramePacket::new([8, 8], 8.0);
        packet.translation = [-0.5, -0.5];
        packet.draw_curves([0.0, 0.0], square([-1.0, -1.0], [2.0, 2.0]));

        let mut exec = CommandExecutor::new();
        exec.gather(&packet, &caches, &mut FrameStats::default());

        let config = RenderConfig { alpha_source: AlphaSource::Reserved, ..RenderConfig::default() };
        let mut buf = CounterBuffer::new(8, 8);
        let acc = exec.accumulate(&mut buf, &packet, &SamplePattern::lcd(), &config);

        assert_eq!(acc.overflows, 0);
        for t in buf.to_texels() {
            assert_eq!(t.winding_total(Channel::R), Ok(2));
            assert_eq!(t.winding_total(Channel::A), Ok(6));
        }
    }
}
