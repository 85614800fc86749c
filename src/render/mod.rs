pub mod accumulate;
pub mod cache;
pub mod counters;
pub mod curve;
pub mod device;
pub mod executor;
mod frame;
pub mod instance;
pub mod outline;
pub mod raster;
pub mod resolve;
pub mod samples;
mod shared;
pub mod surface;

pub use frame::{Curve, FramePacket, GlyphKey, RectF, RenderCmd};
pub use shared::SharedCaches;

use crate::render::device::CounterBuffer;
use crate::render::executor::{CommandExecutor, FrameStats};
use crate::render::instance::ResolveUniform;
use crate::render::resolve::ResolveConfig;
use crate::render::samples::SamplePattern;
use crate::render::surface::ImageSurface;
use crate::util::config::{self, RenderConfig};

/// Result of one [`Renderer::render`] call.
#[derive(Clone, Debug)]
pub struct RenderOutput {
    pub image: ImageSurface,
    pub stats: FrameStats,
}

/// High-level renderer facade.
///
/// Owns the executor and a pair of counter buffers used on alternate frames, so a frame's
/// resolve never reads a buffer the next frame is accumulating into.
pub struct Renderer {
    exec: CommandExecutor,
    caches: SharedCaches,
    config: RenderConfig,
    pattern: SamplePattern,
    counters: [CounterBuffer; 2],
    frame: u64,
}

impl Renderer {
    /// Renderer using the process-wide config.
    pub fn new(caches: SharedCaches) -> Self {
        Self::with_config(caches, *config::render_config())
    }

    pub fn with_config(caches: SharedCaches, config: RenderConfig) -> Self {
        Self {
            exec: CommandExecutor::new(),
            caches,
            config,
            pattern: SamplePattern::default(),
            counters: [CounterBuffer::new(0, 0), CounterBuffer::new(0, 0)],
            frame: 0,
        }
    }

    pub fn with_pattern(mut self, pattern: SamplePattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn pattern(&self) -> &SamplePattern {
        &self.pattern
    }

    pub fn caches(&self) -> &SharedCaches {
        &self.caches
    }

    /// Frames rendered so far.
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Counter buffer written by the most recent frame.
    pub fn last_counters(&self) -> Option<&CounterBuffer> {
        let last = self.frame.checked_sub(1)?;
        Some(&self.counters[(last % 2) as usize])
    }

    fn resolve_config(&self, packet: &FramePacket) -> ResolveConfig {
        let uniform = ResolveUniform {
            sample_count: self.pattern.sample_count(packet.subpixel_aa),
            subpixel_aa: packet.subpixel_aa as u32,
            gamma: packet.gamma,
        };
        match uniform.to_config(self.config.alpha_source) {
            Ok(cfg) => cfg,
            Err(e) => {
                executor::warn_bad_packet(|| format!("{e}; using configured gamma"));
                ResolveConfig {
                    sample_count: uniform.sample_count.max(1),
                    subpixel_aa: packet.subpixel_aa,
                    gamma: self.config.gamma,
                    alpha_source: self.config.alpha_source,
                }
            }
        }
    }

    pub fn render(&mut self, packet: &FramePacket) -> RenderOutput {
        let [width, height] = packet.output_size;
        let mut stats = FrameStats::default();

        if width == 0 || height == 0 {
            return RenderOutput { image: ImageSurface::transparent(width, height), stats };
        }
        if !(packet.px_per_em.is_finite() && packet.px_per_em > 0.0) {
            let ppe = packet.px_per_em;
            executor::warn_bad_packet(|| format!("px_per_em must be positive, got {ppe}"));
            return RenderOutput { image: ImageSurface::transparent(width, height), stats };
        }

        let resolve_config = self.resolve_config(packet);
        let counters = &mut self.counters[(self.frame % 2) as usize];
        counters.reset(width, height);

        self.exec.gather(packet, &self.caches, &mut stats);
        if self.exec.instances().is_empty() {
            self.finish_frame(&stats);
            return RenderOutput { image: ImageSurface::transparent(width, height), stats };
        }

        stats.samples = self.pattern.len() as u32;
        stats.accumulate = self.exec.accumulate(counters, packet, &self.pattern, &self.config);

        let (image, resolve_stats) = resolve::resolve(counters, &resolve_config);
        stats.resolve = resolve_stats;

        self.finish_frame(&stats);
        RenderOutput { image, stats }
    }

    fn finish_frame(&mut self, stats: &FrameStats) {
        executor::report_frame(self.frame, stats);
        self.frame += 1;
        let every = self.config.summary_frames as u64;
        if every != 0 && self.frame % every == 0 {
            log::info!(
                "draw_summary frames={} instances={} culled={} missing_glyphs={} fragments={} discarded={} underflow_px={}",
                self.frame,
                stats.instances,
                stats.culled,
                stats.missing_glyphs,
                stats.accumulate.fragments,
                stats.accumulate.discarded,
                stats.resolve.underflow_pixels
            );
        }
    }
}
