//! Packed winding counters.
//!
//! A counter texel is four 8-bit channels. Each channel holds two 4-bit counters:
//! `front` in bits 4..=7 and `back` in bits 0..=3. A front-facing fragment adds 16 to
//! the channel byte, a back-facing fragment adds 1. Additions saturate at 255 per
//! channel, which is what an additive blend into an 8-bit unorm target does.
//!
//! Design rule: every arithmetic step here is explicit (`wrapping_sub`, `saturating_add`)
//! so underflow is detected instead of silently absorbed.

/// Largest value a single 4-bit counter can hold.
pub const NIBBLE_MAX: u8 = 0x0F;

const FRONT_SHIFT: u32 = 4;
const LOW_NIBBLE: u8 = 0x0F;

/// One channel of a counter texel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    R,
    G,
    B,
    /// Reserved channel; not part of the coverage sum.
    A,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::R, Channel::G, Channel::B, Channel::A];
    pub const COVERAGE: [Channel; 3] = [Channel::R, Channel::G, Channel::B];

    #[inline(always)]
    pub fn index(self) -> usize {
        match self {
            Channel::R => 0,
            Channel::G => 1,
            Channel::B => 2,
            Channel::A => 3,
        }
    }
}

/// Set of channels a draw writes to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChannelMask(u8);

impl ChannelMask {
    pub const NONE: Self = Self(0);
    pub const RGB: Self = Self(0b0111);
    pub const ALL: Self = Self(0b1111);

    pub fn single(channel: Channel) -> Self {
        Self(1 << channel.index())
    }

    /// Build a mask from per-channel selector components (RGBA, each 1 or 0).
    ///
    /// Any strictly positive component selects its channel.
    pub fn from_components(components: [f32; 4]) -> Self {
        let mut bits = 0u8;
        for (i, c) in components.iter().enumerate() {
            if *c > 0.0 {
                bits |= 1 << i;
            }
        }
        Self(bits)
    }

    pub fn to_components(self) -> [f32; 4] {
        Channel::ALL.map(|ch| if self.contains(ch) { 1.0 } else { 0.0 })
    }

    pub fn with(self, channel: Channel) -> Self {
        Self(self.0 | Self::single(channel).0)
    }

    pub fn without(self, channel: Channel) -> Self {
        Self(self.0 & !Self::single(channel).0)
    }

    #[inline(always)]
    pub fn contains(self, channel: Channel) -> bool {
        self.0 & (1 << channel.index()) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

/// Orientation of a rasterized primitive after transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Facing {
    Front,
    Back,
}

impl Facing {
    /// Amount added to a channel byte by one fragment.
    #[inline(always)]
    pub fn increment(self) -> u8 {
        match self {
            Facing::Front => 1 << FRONT_SHIFT,
            Facing::Back => 1,
        }
    }
}

/// Decoded pair of counters for one channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Counts {
    pub front: u8,
    pub back: u8,
}

impl Counts {
    #[inline(always)]
    pub fn unpack(byte: u8) -> Self {
        Self { front: byte >> FRONT_SHIFT, back: byte & LOW_NIBBLE }
    }

    /// Pack the counters into a channel byte. Out-of-range counters are clamped.
    pub fn pack(self) -> u8 {
        (self.front.min(NIBBLE_MAX) << FRONT_SHIFT) | self.back.min(NIBBLE_MAX)
    }
}

/// A channel whose back count exceeds its front count.
///
/// This only happens when the contour winding fed to the accumulation stage is inconsistent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Underflow {
    pub front: u8,
    pub back: u8,
}

/// Winding total of a packed channel byte: `front - back` as a 4-bit subtraction.
///
/// The subtraction is done on `u8` with an explicit wrap; a borrow sets bits above the low
/// nibble, which is how underflow is detected.
#[inline(always)]
pub fn winding_total(byte: u8) -> Result<u8, Underflow> {
    let counts = Counts::unpack(byte);
    let diff = counts.front.wrapping_sub(counts.back);
    if diff & !LOW_NIBBLE != 0 {
        return Err(Underflow { front: counts.front, back: counts.back });
    }
    Ok(diff)
}

/// Add one fragment to a channel byte.
///
/// Returns the new byte and whether the addressed counter was already at [`NIBBLE_MAX`].
/// A saturated front counter clamps the whole byte at 255; a saturated back counter carries
/// into the front counter. Both are capacity violations the caller must avoid.
#[inline(always)]
pub fn add_to_channel(byte: u8, facing: Facing) -> (u8, bool) {
    let counts = Counts::unpack(byte);
    let overflowed = match facing {
        Facing::Front => counts.front == NIBBLE_MAX,
        Facing::Back => counts.back == NIBBLE_MAX,
    };
    (byte.saturating_add(facing.increment()), overflowed)
}

/// One texel of the counter buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Texel(pub [u8; 4]);

impl Texel {
    pub const ZERO: Self = Self([0; 4]);

    #[inline(always)]
    pub fn from_bits(bits: u32) -> Self {
        Self(bits.to_le_bytes())
    }

    #[inline(always)]
    pub fn to_bits(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    #[inline(always)]
    pub fn channel(self, channel: Channel) -> u8 {
        self.0[channel.index()]
    }

    pub fn counts(self, channel: Channel) -> Counts {
        Counts::unpack(self.channel(channel))
    }

    pub fn winding_total(self, channel: Channel) -> Result<u8, Underflow> {
        winding_total(self.channel(channel))
    }

    /// Build a texel from per-channel `(front, back)` counts.
    pub fn from_counts(counts: [(u8, u8); 4]) -> Self {
        Self(counts.map(|(front, back)| Counts { front, back }.pack()))
    }

    /// Add one fragment to every channel in `mask`. Returns true if any counter overflowed.
    #[inline(always)]
    pub fn add(&mut self, mask: ChannelMask, facing: Facing) -> bool {
        let mut overflowed = false;
        for channel in Channel::ALL {
            if mask.contains(channel) {
                let i = channel.index();
                let (next, over) = add_to_channel(self.0[i], facing);
                self.0[i] = next;
                overflowed |= over;
            }
        }
        overflowed
    }

    /// Same as [`Texel::add`] but returns the updated value.
    #[inline(always)]
    pub fn added(mut self, mask: ChannelMask, facing: Facing) -> (Self, bool) {
        let over = self.add(mask, facing);
        (self, over)
    }
}
