/// CPU-side output image in RGBA8.
///
/// - `rgba` is row-major, 4 bytes per pixel (R,G,B,A).
/// - Alpha is straight, not pre-multiplied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageSurface {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl ImageSurface {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self { width, height, rgba }
    }

    /// Fully transparent image of the given size.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self { width, height, rgba: vec![0; width as usize * height as usize * 4] }
    }

    pub fn is_valid(&self) -> bool {
        let px = self.width as usize * self.height as usize;
        self.rgba.len() == px * 4
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Pixel at `(x, y)`, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.rgba.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Quantize a `[0, 1]` value to 8-bit unorm.
#[inline(always)]
pub fn to_unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
