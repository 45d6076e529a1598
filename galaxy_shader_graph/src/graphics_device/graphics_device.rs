/// GraphicsDevice trait - the device context a Surface draws through
///
/// One device context per Surface. Every GPU object is an arena handle
/// owned by the device; losing the context invalidates all of them at once.

use std::sync::{Arc, Mutex};
use glam::{Vec2, Vec3, Vec4};
use slotmap::new_key_type;
use crate::error::Result;
use crate::shader::ProgramDesc;
use crate::uniform::{PixelBuffer, TextureOptions};

new_key_type! {
    /// Handle to a device texture
    pub struct TextureHandle;
    /// Handle to a device framebuffer (one color attachment)
    pub struct FramebufferHandle;
    /// Handle to a linked program
    pub struct ProgramHandle;
}

/// How a pass output combines with the framebuffer contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Replace destination
    #[default]
    None,
    /// `src * src.a + dst * (1 - src.a)`
    Alpha,
    /// `src + dst`
    Add,
    /// `src * dst`
    Multiply,
}

impl BlendMode {
    /// Parse `"none"`, `"alpha"`, `"add"` or `"multiply"`
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(BlendMode::None),
            "alpha" => Some(BlendMode::Alpha),
            "add" => Some(BlendMode::Add),
            "multiply" => Some(BlendMode::Multiply),
            _ => None,
        }
    }
}

/// Pixel rectangle, origin at the bottom-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Whether the rectangle is non-empty and lies inside a `width` x `height` image
    pub fn fits_in(&self, width: u32, height: u32) -> bool {
        let within = |start: u32, len: u32, max: u32| {
            len > 0 && start.checked_add(len).map_or(false, |end| end <= max)
        };
        within(self.x, self.width, width) && within(self.y, self.height, height)
    }
}

/// Texture plus sampling options bound to a sampler uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerBinding {
    pub texture: TextureHandle,
    pub options: TextureOptions,
}

/// A uniform value ready for the device
#[derive(Debug, Clone, PartialEq)]
pub enum BoundUniform {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    /// `None` samples as transparent black
    Sampler(Option<SamplerBinding>),
    Array(Vec<BoundUniform>),
}

/// One full-target draw
#[derive(Debug, Clone)]
pub struct DrawCall<'a> {
    pub program: ProgramHandle,
    pub target: FramebufferHandle,
    /// Clear color applied before drawing, `None` keeps the current contents
    pub clear: Option<Vec4>,
    pub blend: BlendMode,
    pub uniforms: &'a [(String, BoundUniform)],
}

/// Device statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Draw calls executed since the device was created
    pub draw_calls: u64,
    pub programs: usize,
    pub framebuffers: usize,
    pub textures: usize,
}

/// Device context used by a Surface
///
/// Every method on a lost device fails with `Error::ContextLost`, except
/// destruction, `is_lost` and `stats`.
pub trait GraphicsDevice: Send {
    /// Link a program
    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramHandle>;

    /// Release a program
    fn destroy_program(&mut self, program: ProgramHandle);

    /// Create an RGBA8 framebuffer cleared to transparent black
    fn create_framebuffer(&mut self, width: u32, height: u32) -> Result<FramebufferHandle>;

    /// Color texture of a framebuffer, sampleable by other draws
    fn framebuffer_texture(&self, framebuffer: FramebufferHandle) -> Result<TextureHandle>;

    /// Release a framebuffer and its color texture
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle);

    /// Upload a pixel buffer
    fn create_texture(&mut self, pixels: &PixelBuffer) -> Result<TextureHandle>;

    /// Release a texture
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Run a program over every pixel of the target
    fn draw(&mut self, call: &DrawCall<'_>) -> Result<()>;

    /// Read back a region of a framebuffer
    fn read_pixels(&self, framebuffer: FramebufferHandle, rect: Rect) -> Result<PixelBuffer>;

    /// Whether the context was lost
    fn is_lost(&self) -> bool;

    /// Device statistics
    fn stats(&self) -> DeviceStats;
}

/// Creates a fresh device context, at Surface creation and on restore
pub type DeviceFactory = Arc<dyn Fn() -> Result<Arc<Mutex<dyn GraphicsDevice>>> + Send + Sync>;
