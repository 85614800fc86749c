pub mod buffer;

use crate::render::counters::{ChannelMask, Facing};

pub use buffer::{CounterBuffer, SharedCounters};

/// Destination of accumulation-stage fragments.
///
/// Design rule: implementations must combine fragments with an associative, commutative add
/// so the final texels do not depend on the order fragments arrive in.
pub trait CounterTarget {
    /// Surface width in pixels.
    fn width(&self) -> u32;

    /// Surface height in pixels.
    fn height(&self) -> u32;

    /// Add one fragment to every channel of `mask` at `(x, y)`.
    ///
    /// Returns true if one of the addressed counters was already saturated.
    fn add_fragment(&mut self, x: u32, y: u32, mask: ChannelMask, facing: Facing) -> bool;
}
