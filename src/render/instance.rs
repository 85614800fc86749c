use std::fmt;
use std::mem::size_of;

use crate::render::counters::ChannelMask;
use crate::render::raster::FrontFace;
use crate::render::resolve::{AlphaSource, ResolveConfig};

/// Size of `T` padded to a whole number of `vec_len`-wide f32 vectors.
const fn wire_align<T>(vec_len: usize) -> u64 {
    size_of::<T>().next_multiple_of(size_of::<f32>() * vec_len) as u64
}

/// Plain-old-data records exchanged with whatever produces or uploads them.
pub trait WireStruct: bytemuck::Pod {
    /// Size of one record, padded to its vector alignment.
    const WIRE_SIZE: u64;
    /// Distance between consecutive records in an array.
    const WIRE_STRIDE: u64;
}

/// One quadratic segment of a closed contour.
///
/// The contour's implicit origin is `offset` itself, so each instance yields the fan triangle
/// `{offset, offset + p0, offset + p2}` and the correction primitive
/// `{offset + p0, offset + p1, offset + p2}`.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CurveInstance {
    /// Offset of the contour's local origin.
    pub offset: [f32; 2],
    /// Start point, relative to `offset`.
    pub p0: [f32; 2],
    /// Control point, relative to `offset`.
    pub p1: [f32; 2],
    /// End point, relative to `offset`.
    pub p2: [f32; 2],
}

impl WireStruct for CurveInstance {
    const WIRE_SIZE: u64 = wire_align::<Self>(2);
    const WIRE_STRIDE: u64 = Self::WIRE_SIZE;
}

impl CurveInstance {
    pub fn new(offset: [f32; 2], [p0, p1, p2]: [[f32; 2]; 3]) -> Self {
        Self { offset, p0, p1, p2 }
    }

    /// Fan triangle `{origin, p0, p2}` in local space.
    pub fn flat_triangle(&self) -> [[f32; 2]; 3] {
        [self.offset, add(self.offset, self.p0), add(self.offset, self.p2)]
    }

    /// Correction primitive `{p0, p1, p2}` in local space.
    pub fn curve_triangle(&self) -> [[f32; 2]; 3] {
        [add(self.offset, self.p0), add(self.offset, self.p1), add(self.offset, self.p2)]
    }

    /// True when the correction primitive has no area (straight segment or collapsed ends).
    pub fn is_straight(&self) -> bool {
        let ax = self.p1[0] - self.p0[0];
        let ay = self.p1[1] - self.p0[1];
        let bx = self.p2[0] - self.p0[0];
        let by = self.p2[1] - self.p0[1];
        ax * by - ay * bx == 0.0
    }
}

#[inline(always)]
fn add(a: [f32; 2], b: [f32; 2]) -> [f32; 2] {
    [a[0] + b[0], a[1] + b[1]]
}

/// Per-draw accumulation parameters.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AccumulationUniform {
    /// Channels to write to (RGBA, each 1 or 0).
    pub components: [f32; 4],
    /// Scale from local units to clip space, applied after `translation`.
    pub scale: [f32; 2],
    /// Translation applied before `scale`, in local units.
    pub translation: [f32; 2],
}

impl WireStruct for AccumulationUniform {
    const WIRE_SIZE: u64 = wire_align::<Self>(4);
    const WIRE_STRIDE: u64 = Self::WIRE_SIZE;
}

/// Resolve-pass parameters.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ResolveUniform {
    /// Normalization divisor for decoded winding totals.
    pub sample_count: u32,
    /// Subpixel anti-aliasing (0 = off, 1 = on).
    pub subpixel_aa: u32,
    /// Exponent applied to normalized coverage.
    pub gamma: f32,
}

impl WireStruct for ResolveUniform {
    const WIRE_SIZE: u64 = wire_align::<Self>(2);
    const WIRE_STRIDE: u64 = Self::WIRE_SIZE;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformError {
    ZeroSampleCount,
    InvalidGamma(f32),
    InvalidSubpixelFlag(u32),
}

impl fmt::Display for UniformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniformError::ZeroSampleCount => write!(f, "sample_count must be at least 1"),
            UniformError::InvalidGamma(g) => write!(f, "gamma must be finite and positive, got {g}"),
            UniformError::InvalidSubpixelFlag(v) => write!(f, "subpixel_aa must be 0 or 1, got {v}"),
        }
    }
}

impl std::error::Error for UniformError {}

impl ResolveUniform {
    pub fn from_config(config: &ResolveConfig) -> Self {
        Self {
            sample_count: config.sample_count,
            subpixel_aa: config.subpixel_aa as u32,
            gamma: config.gamma,
        }
    }

    /// Validate the record into a typed config.
    pub fn to_config(&self, alpha_source: AlphaSource) -> Result<ResolveConfig, UniformError> {
        if self.sample_count == 0 {
            return Err(UniformError::ZeroSampleCount);
        }
        if !self.gamma.is_finite() || self.gamma <= 0.0 {
            return Err(UniformError::InvalidGamma(self.gamma));
        }
        let subpixel_aa = match self.subpixel_aa {
            0 => false,
            1 => true,
            v => return Err(UniformError::InvalidSubpixelFlag(v)),
        };
        Ok(ResolveConfig {
            sample_count: self.sample_count,
            subpixel_aa,
            gamma: self.gamma,
            alpha_source,
        })
    }
}

/// Typed accumulation parameters, constant for one accumulation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccumulationConfig {
    pub components: ChannelMask,
    pub scale: [f32; 2],
    pub translation: [f32; 2],
    pub front_face: FrontFace,
}

impl AccumulationConfig {
    pub fn from_uniform(uniform: &AccumulationUniform, front_face: FrontFace) -> Self {
        Self {
            components: ChannelMask::from_components(uniform.components),
            scale: uniform.scale,
            translation: uniform.translation,
            front_face,
        }
    }

    pub fn to_uniform(&self) -> AccumulationUniform {
        AccumulationUniform {
            components: self.components.to_components(),
            scale: self.scale,
            translation: self.translation,
        }
    }

    /// `clip = (local + translation) * scale`.
    #[inline(always)]
    pub fn to_clip(&self, local: [f32; 2]) -> [f32; 2] {
        [
            (local[0] + self.translation[0]) * self.scale[0],
            (local[1] + self.translation[1]) * self.scale[1],
        ]
    }
}
