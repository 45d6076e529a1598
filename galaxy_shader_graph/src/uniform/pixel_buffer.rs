/// Raw RGBA8 pixel buffer.
///
/// Rows are stored bottom-up (row 0 is the bottom of the image), matching
/// the framebuffer read-back convention of the graphics device.

use crate::error::{Error, Result};

/// Tightly packed RGBA8 pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap existing RGBA8 data
    ///
    /// # Errors
    ///
    /// Returns an error if the size is zero or `data` is not `width * height * 4` bytes.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidResource(format!(
                "Pixel buffer size must be non-zero, got {}x{}", width, height
            )));
        }
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(Error::InvalidResource(format!(
                "Pixel buffer {}x{} expects {} bytes, got {}",
                width, height, expected, data.len()
            )));
        }
        Ok(Self { width, height, data })
    }

    /// Buffer filled with a single color
    ///
    /// A zero dimension is bumped to 1.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self::from_fn(width, height, |_, _| rgba)
    }

    /// Buffer built from a per-pixel function `(x, y) -> rgba`
    ///
    /// A zero dimension is bumped to 1.
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 4]) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let texels: Vec<[u8; 4]> = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Self {
            width,
            height,
            data: bytemuck::cast_slice(&texels).to_vec(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 bytes, bottom row first
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// One `[r, g, b, a]` entry per pixel, bottom row first
    pub fn texels(&self) -> &[[u8; 4]] {
        bytemuck::cast_slice(&self.data)
    }

    /// Pixel at `(x, y)`, or `None` when out of bounds
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.texels().get(y as usize * self.width as usize + x as usize).copied()
    }

    /// Consume the buffer, returning its bytes
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
#[path = "pixel_buffer_tests.rs"]
mod tests;
