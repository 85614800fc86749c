//! fanfill
//!
//! Fills contours made of lines and quadratic curves by accumulating a signed triangle fan plus
//! curve corrections into packed 4-bit winding counters, then resolving those counters into an
//! anti-aliased RGBA image.
//!
//! Design rule: keep this file thin.

pub mod render;
pub mod util;

pub use render::counters::{Channel, ChannelMask, Texel};
pub use render::device::{CounterBuffer, CounterTarget, SharedCounters};
pub use render::executor::FrameStats;
pub use render::instance::{AccumulationConfig, CurveInstance, ResolveUniform};
pub use render::outline::OutlineBuilder;
pub use render::resolve::{AlphaSource, ResolveConfig};
pub use render::samples::SamplePattern;
pub use render::surface::ImageSurface;
pub use render::{Curve, FramePacket, GlyphKey, RenderCmd, RenderOutput, Renderer, SharedCaches};
pub use util::config::{AccumulationMode, RenderConfig};
