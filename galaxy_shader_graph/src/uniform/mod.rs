//! Uniform value model
//!
//! Tagged representation of pass inputs: scalars, vectors, arrays and
//! texture references, plus the raw pixel buffers and sampling options
//! that travel with them.

mod pixel_buffer;
mod texture_options;
mod uniform_value;

pub use pixel_buffer::PixelBuffer;
pub use texture_options::{Interpolation, WrapMode, TextureOptions, TextureOptionsDesc};
pub use uniform_value::{UniformValue, TextureRef};
