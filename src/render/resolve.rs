//! Resolve stage: decode the counter buffer into the final image.
//!
//! Per pixel, each contributing channel is decoded to a winding total. A channel whose back
//! count exceeds its front count turns the whole pixel into [`DIAGNOSTIC_RED`].

use crate::render::counters::{Channel, Texel, Underflow};
use crate::render::device::CounterBuffer;
use crate::render::surface::{to_unorm8, ImageSurface};

/// Emitted for any pixel with an underflowed counter.
pub const DIAGNOSTIC_RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

/// Where output alpha comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlphaSource {
    /// Normalized coverage of the pixel itself, without gamma.
    #[default]
    Coverage,
    /// Winding total of the reserved channel (A), without gamma. Divided by `sample_count`,
    /// or by `3 * sample_count` with subpixel filtering, so a pattern that writes A on every
    /// sample reads 1 where it is fully covered.
    Reserved,
}

/// Typed resolve parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolveConfig {
    /// Normalization divisor for winding totals.
    pub sample_count: u32,
    pub subpixel_aa: bool,
    pub gamma: f32,
    pub alpha_source: AlphaSource,
}

impl ResolveConfig {
    pub fn new(sample_count: u32, subpixel_aa: bool, gamma: f32) -> Self {
        Self { sample_count, subpixel_aa, gamma, alpha_source: AlphaSource::Coverage }
    }

    pub fn with_alpha_source(mut self, alpha_source: AlphaSource) -> Self {
        self.alpha_source = alpha_source;
        self
    }
}

/// Result of resolving one pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ResolvedPixel {
    /// Normal output; RGB gamma-corrected, alpha linear.
    Color([f32; 4]),
    /// Some contributing channel underflowed.
    Underflow,
}

impl ResolvedPixel {
    pub fn rgba(self) -> [f32; 4] {
        match self {
            ResolvedPixel::Color(c) => c,
            ResolvedPixel::Underflow => DIAGNOSTIC_RED,
        }
    }

    pub fn is_underflow(self) -> bool {
        matches!(self, ResolvedPixel::Underflow)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub pixels: u64,
    pub underflow_pixels: u64,
}

#[inline(always)]
fn total(texel: Texel, channel: Channel) -> Result<f32, Underflow> {
    texel.winding_total(channel).map(f32::from)
}

#[inline(always)]
fn normalize(v: f32, divisor: f32) -> f32 {
    (v / divisor).clamp(0.0, 1.0)
}

/// `v^gamma` for `v` in `[0, 1]`; zero coverage stays zero for any exponent.
#[inline(always)]
fn apply_gamma(v: f32, gamma: f32) -> f32 {
    if v <= 0.0 {
        0.0
    } else {
        v.powf(gamma).clamp(0.0, 1.0)
    }
}

fn resolve_color(
    buffer: &CounterBuffer,
    x: i64,
    y: i64,
    config: &ResolveConfig,
) -> Result<[f32; 4], Underflow> {
    let mid = buffer.texel_or_zero(x, y);
    let (r, g, b) = (total(mid, Channel::R)?, total(mid, Channel::G)?, total(mid, Channel::B)?);
    let c = config.sample_count.max(1) as f32;

    let (rgb, coverage, divisor) = if config.subpixel_aa {
        let left_b = total(buffer.texel_or_zero(x - 1, y), Channel::B)?;
        let right_r = total(buffer.texel_or_zero(x + 1, y), Channel::R)?;
        let c3 = c * 3.0;
        let out = [
            normalize(left_b + r + g, c3),
            normalize(r + g + b, c3),
            normalize(g + b + right_r, c3),
        ];
        (out, out[1], c3)
    } else {
        let cov = normalize(r + g + b, c);
        ([cov; 3], cov, c)
    };

    let alpha = match config.alpha_source {
        AlphaSource::Coverage => coverage,
        AlphaSource::Reserved => normalize(total(mid, Channel::A)?, divisor),
    };
    let gamma = config.gamma;
    Ok([
        apply_gamma(rgb[0], gamma),
        apply_gamma(rgb[1], gamma),
        apply_gamma(rgb[2], gamma),
        alpha,
    ])
}

/// Resolve the pixel at `(x, y)`. Neighbours outside the buffer contribute zero.
pub fn resolve_pixel(buffer: &CounterBuffer, x: u32, y: u32, config: &ResolveConfig) -> ResolvedPixel {
    match resolve_color(buffer, x as i64, y as i64, config) {
        Ok(c) => ResolvedPixel::Color(c),
        Err(_) => ResolvedPixel::Underflow,
    }
}

/// Resolve one output row into `row` (RGBA8). Returns the number of underflow pixels.
fn resolve_row(buffer: &CounterBuffer, y: u32, row: &mut [u8], config: &ResolveConfig) -> u64 {
    let mut underflows = 0;
    for (x, out) in row.chunks_exact_mut(4).enumerate() {
        let px = resolve_pixel(buffer, x as u32, y, config);
        if px.is_underflow() {
            underflows += 1;
        }
        let rgba = px.rgba();
        for (o, v) in out.iter_mut().zip(rgba) {
            *o = to_unorm8(v);
        }
    }
    underflows
}

/// Resolve the whole buffer into an RGBA8 image.
///
/// Must only be called once every accumulation write of the frame is done.
pub fn resolve(buffer: &CounterBuffer, config: &ResolveConfig) -> (ImageSurface, ResolveStats) {
    let (width, height) = (buffer.width(), buffer.height());
    let mut image = ImageSurface::transparent(width, height);
    if image.is_empty() {
        return (image, ResolveStats::default());
    }
    let stride = width as usize * 4;

    #[cfg(feature = "parallel")]
    let underflow_pixels: u64 = {
        use rayon::prelude::*;
        image
            .rgba
            .par_chunks_mut(stride)
            .enumerate()
            .map(|(y, row)| resolve_row(buffer, y as u32, row, config))
            .sum()
    };

    #[cfg(not(feature = "parallel"))]
    let underflow_pixels: u64 = image
        .rgba
        .chunks_mut(stride)
        .enumerate()
        .map(|(y, row)| resolve_row(buffer, y as u32, row, config))
        .sum();

    let stats = ResolveStats { pixels: width as u64 * height as u64, underflow_pixels };
    (image, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: [f32; 4], b: [f32; 4]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-6)
    }

    fn row(texels: &[Texel]) -> CounterBuffer {
        CounterBuffer::from_texels(texels.len() as u32, 1, texels).unwrap()
    }

    fn winding(r: u8, g: u8, b: u8, a: u8) -> Texel {
        Texel::from_counts([(r, 0), (g, 0), (b, 0), (a, 0)])
    }

    #[test]
    fn untouched_pixel_is_transparent() {
        let buf = CounterBuffer::new(3, 3);
        for subpixel_aa in [false, true] {
            let cfg = ResolveConfig::new(6, subpixel_aa, 2.2);
            assert_eq!(resolve_pixel(&buf, 1, 1, &cfg), ResolvedPixel::Color([0.0; 4]));
        }
    }

    #[test]
    fn untouched_pixel_stays_zero_for_any_gamma() {
        let buf = CounterBuffer::new(1, 1);
        for gamma in [0.0f32, -1.0, 0.5] {
            let cfg = ResolveConfig::new(6, false, gamma);
            assert_eq!(resolve_pixel(&buf, 0, 0, &cfg).rgba(), [0.0; 4], "gamma {gamma}");
        }
        // Full coverage stays at 1 even for a zero exponent.
        let full = row(&[winding(2, 2, 2, 0)]);
        let got = resolve_pixel(&full, 0, 0, &ResolveConfig::new(6, false, 0.0)).rgba();
        assert!(close(got, [1.0; 4]));
    }

    #[test]
    fn underflow_turns_pixel_red() {
        let bad = Texel::from_counts([(0, 0), (0, 1), (0, 0), (0, 0)]);
        let buf = row(&[bad]);
        for subpixel_aa in [false, true] {
            let cfg = ResolveConfig::new(6, subpixel_aa, 1.0);
            let px = resolve_pixel(&buf, 0, 0, &cfg);
            assert!(px.is_underflow());
            assert_eq!(px.rgba(), DIAGNOSTIC_RED);
        }
    }

    #[test]
    fn underflow_in_neighbour_only_matters_for_subpixel() {
        // Left pixel's blue channel underflows; the middle reads it only in subpixel mode.
        let left = Texel::from_counts([(0, 0), (0, 0), (2, 3), (0, 0)]);
        let buf = row(&[left, winding(1, 1, 1, 0)]);
        assert!(!resolve_pixel(&buf, 1, 0, &ResolveConfig::new(3, false, 1.0)).is_underflow());
        assert!(resolve_pixel(&buf, 1, 0, &ResolveConfig::new(3, true, 1.0)).is_underflow());
    }

    #[test]
    fn reserved_channel_is_checked_only_when_it_feeds_alpha() {
        let t = Texel::from_counts([(1, 0), (0, 0), (0, 0), (0, 1)]);
        let buf = row(&[t]);
        let cfg = ResolveConfig::new(1, false, 1.0);
        assert!(!resolve_pixel(&buf, 0, 0, &cfg).is_underflow());
        let cfg = cfg.with_alpha_source(AlphaSource::Reserved);
        assert!(resolve_pixel(&buf, 0, 0, &cfg).is_underflow());
    }

    #[test]
    fn gamma_law_without_subpixel() {
        // S = 3 + 2 + 1 = 6, C = 16.
        let buf = row(&[winding(3, 2, 1, 0)]);
        let s_over_c = 6.0f32 / 16.0;
        for gamma in [1.0f32, 2.2] {
            let cfg = ResolveConfig::new(16, false, gamma);
            let v = s_over_c.powf(gamma);
            let got = resolve_pixel(&buf, 0, 0, &cfg).rgba();
            assert!(close(got, [v, v, v, s_over_c]), "gamma {gamma}: {got:?}");
        }
    }

    #[test]
    fn coverage_is_clamped_before_gamma() {
        let buf = row(&[winding(5, 5, 5, 0)]);
        let got = resolve_pixel(&buf, 0, 0, &ResolveConfig::new(4, false, 2.2)).rgba();
        assert!(close(got, [1.0; 4]));
    }

    #[test]
    fn subpixel_filter_weights() {
        let buf = row(&[winding(0, 0, 4, 0), winding(2, 3, 5, 0), winding(1, 0, 0, 0)]);
        let cfg = ResolveConfig::new(16, true, 1.0);
        let got = resolve_pixel(&buf, 1, 0, &cfg).rgba();
        let expected = [9.0 / 48.0, 10.0 / 48.0, 9.0 / 48.0, 10.0 / 48.0];
        assert!(close(got, expected), "{got:?}");

        let cfg = ResolveConfig::new(16, true, 2.2);
        let got = resolve_pixel(&buf, 1, 0, &cfg).rgba();
        let g = |v: f32| v.powf(2.2);
        assert!(close(got, [g(9.0 / 48.0), g(10.0 / 48.0), g(9.0 / 48.0), 10.0 / 48.0]));
    }

    #[test]
    fn subpixel_edges_read_zero_outside() {
        let buf = row(&[winding(3, 3, 3, 0)]);
        let got = resolve_pixel(&buf, 0, 0, &ResolveConfig::new(3, true, 1.0)).rgba();
        assert!(close(got, [6.0 / 9.0, 1.0, 6.0 / 9.0, 1.0]));
    }

    #[test]
    fn reserved_alpha_is_linear() {
        let buf = row(&[winding(2, 2, 2, 3)]);
        let cfg = ResolveConfig::new(6, false, 2.2).with_alpha_source(AlphaSource::Reserved);
        let got = resolve_pixel(&buf, 0, 0, &cfg).rgba();
        assert!((got[3] - 0.5).abs() < 1e-6);
        assert!((got[0] - 1.0).abs() < 1e-6);

        // Subpixel mode divides the reserved total by three times the per-channel count.
        let buf = row(&[winding(2, 2, 2, 6)]);
        let cfg = ResolveConfig::new(2, true, 1.0).with_alpha_source(AlphaSource::Reserved);
        let got = resolve_pixel(&buf, 0, 0, &cfg).rgba();
        assert!((got[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn image_resolve_counts_underflows() {
        let bad = Texel::from_counts([(0, 1), (0, 0), (0, 0), (0, 0)]);
        let buf = CounterBuffer::from_texels(
            2,
            2,
            &[winding(1, 1, 1, 0), Texel::ZERO, bad, winding(0, 0, 0, 0)],
        )
        .unwrap();
        let (img, stats) = resolve(&buf, &ResolveConfig::new(3, false, 1.0));
        assert_eq!(stats, ResolveStats { pixels: 4, underflow_pixels: 1 });
        assert_eq!(img.pixel(0, 0), Some([255, 255, 255, 255]));
        assert_eq!(img.pixel(1, 0), Some([0, 0, 0, 0]));
        assert_eq!(img.pixel(0, 1), Some([255, 0, 0, 255]));
    }

    #[test]
    fn empty_buffer_resolves_to_empty_image() {
        let (img, stats) = resolve(&CounterBuffer::new(0, 4), &ResolveConfig::new(1, false, 1.0));
        assert!(img.is_empty());
        assert_eq!(stats.pixels, 0);
    }
}
