use crate::render::counters::{Channel, ChannelMask};

/// One accumulation pass: a sub-pixel offset and the channels it writes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    /// Offset in pixels, applied to the whole frame for this pass.
    pub offset: [f32; 2],
    pub components: ChannelMask,
}

impl Sample {
    pub const fn new(offset: [f32; 2], components: ChannelMask) -> Self {
        Self { offset, components }
    }
}

const SIXTH: f32 = 1.0 / 6.0;

/// Six samples, two per LCD stripe, laid out left to right as B, G, R.
///
/// Horizontal positions step by 1/6 pixel; vertical positions are a permutation of the same
/// sixths so no two samples share a row. Every sample also writes the reserved channel.
const LCD_SAMPLES: [([f32; 2], Channel); 6] = [
    ([0.0 * SIXTH, 4.0 * SIXTH], Channel::B),
    ([1.0 * SIXTH, 1.0 * SIXTH], Channel::B),
    ([2.0 * SIXTH, 5.0 * SIXTH], Channel::G),
    ([3.0 * SIXTH, 2.0 * SIXTH], Channel::G),
    ([4.0 * SIXTH, 3.0 * SIXTH], Channel::R),
    ([5.0 * SIXTH, 0.0 * SIXTH], Channel::R),
];

/// Set of accumulation passes run per frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplePattern {
    samples: Vec<Sample>,
}

impl Default for SamplePattern {
    fn default() -> Self {
        Self::lcd()
    }
}

impl SamplePattern {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// The 6-sample LCD pattern.
    pub fn lcd() -> Self {
        Self::new(
            LCD_SAMPLES
                .iter()
                .map(|(offset, ch)| {
                    Sample::new(*offset, ChannelMask::single(*ch).with(Channel::A))
                })
                .collect(),
        )
    }

    /// One sample at the pixel origin writing red and the reserved channel (aliased output).
    pub fn single() -> Self {
        let mask = ChannelMask::single(Channel::R).with(Channel::A);
        Self::new(vec![Sample::new([0.0, 0.0], mask)])
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Largest number of samples writing any one coverage channel.
    pub fn samples_per_channel(&self) -> usize {
        Channel::COVERAGE
            .iter()
            .map(|ch| self.samples.iter().filter(|s| s.components.contains(*ch)).count())
            .max()
            .unwrap_or(0)
    }

    /// Coverage divisor for the resolve stage.
    ///
    /// Without subpixel filtering every sample adds to the summed coverage, so the divisor is
    /// the sample count. The subpixel filter already averages three channels, so it divides by
    /// the per-channel count.
    pub fn sample_count(&self, subpixel_aa: bool) -> u32 {
        let n = if subpixel_aa { self.samples_per_channel() } else { self.len() };
        n.max(1) as u32
    }
}
