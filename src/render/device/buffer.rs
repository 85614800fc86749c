use std::sync::atomic::{AtomicU32, Ordering};

use crate::render::counters::{ChannelMask, Facing, Texel};
use crate::render::device::CounterTarget;

/// The accumulation buffer: a grid of packed counter texels.
///
/// Texels are stored as `AtomicU32` so the same allocation serves both a serial writer
/// (`&mut CounterBuffer`, plain loads and stores) and many concurrent writers
/// ([`SharedCounters`], compare-and-swap adds).
pub struct CounterBuffer {
    width: u32,
    height: u32,
    texels: Vec<AtomicU32>,
}

impl CounterBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self { width, height, texels: (0..len).map(|_| AtomicU32::new(0)).collect() }
    }

    /// Build a buffer from existing texels (row-major). Returns `None` on a size mismatch.
    pub fn from_texels(width: u32, height: u32, texels: &[Texel]) -> Option<Self> {
        if texels.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            texels: texels.iter().map(|t| AtomicU32::new(t.to_bits())).collect(),
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Zero every texel. Must run before each frame's accumulation.
    pub fn clear(&mut self) {
        for t in self.texels.iter_mut() {
            *t.get_mut() = 0;
        }
    }

    /// Resize to `width` x `height` (reallocating only when the size changed) and zero.
    pub fn reset(&mut self, width: u32, height: u32) {
        if width != self.width || height != self.height {
            *self = Self::new(width, height);
        } else {
            self.clear();
        }
    }

    #[inline(always)]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Texel at `(x, y)`, or `None` outside the buffer.
    pub fn texel(&self, x: u32, y: u32) -> Option<Texel> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(Texel::from_bits(self.texels[self.index(x, y)].load(Ordering::Relaxed)))
    }

    /// Texel at signed `(x, y)`; anything outside the buffer reads as zero.
    #[inline(always)]
    pub fn texel_or_zero(&self, x: i64, y: i64) -> Texel {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return Texel::ZERO;
        }
        Texel::from_bits(self.texels[self.index(x as u32, y as u32)].load(Ordering::Relaxed))
    }

    /// Copy of all texels, row-major.
    pub fn to_texels(&self) -> Vec<Texel> {
        self.texels.iter().map(|t| Texel::from_bits(t.load(Ordering::Relaxed))).collect()
    }

    /// View for concurrent writers.
    pub fn shared(&self) -> SharedCounters<'_> {
        SharedCounters { buffer: self }
    }
}

impl CounterTarget for CounterBuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn add_fragment(&mut self, x: u32, y: u32, mask: ChannelMask, facing: Facing) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let i = self.index(x, y);
        let slot = self.texels[i].get_mut();
        let (next, over) = Texel::from_bits(*slot).added(mask, facing);
        *slot = next.to_bits();
        over
    }
}

/// Shared, lock-free writer over a [`CounterBuffer`].
///
/// It is `Copy`, so every worker can hold its own. Each add is a compare-and-swap loop that
/// applies the same saturating per-channel add as the serial path.
#[derive(Clone, Copy)]
pub struct SharedCounters<'a> {
    buffer: &'a CounterBuffer,
}

impl CounterTarget for SharedCounters<'_> {
    fn width(&self) -> u32 {
        self.buffer.width
    }

    fn height(&self) -> u32 {
        self.buffer.height
    }

    fn add_fragment(&mut self, x: u32, y: u32, mask: ChannelMask, facing: Facing) -> bool {
        if x >= self.buffer.width || y >= self.buffer.height {
            return false;
        }
        let slot = &self.buffer.texels[self.buffer.index(x, y)];
        let mut over = false;
        // The closure never returns `None`, so the update always succeeds.
        let _ = slot.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
            let (next, o) = Texel::from_bits(bits).added(mask, facing);
            over = o;
            Some(next.to_bits())
        });
        over
    }
}
