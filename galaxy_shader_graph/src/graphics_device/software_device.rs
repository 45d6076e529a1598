/// Software graphics device - CPU rasterizer (no GPU required)
///
/// Programs are Rust fragment kernels run once per pixel of the target.
/// Framebuffers are RGBA8 with row 0 at the bottom, and the kernel sees
/// `uv = ((x + 0.5) / w, (y + 0.5) / h)` like a full-screen quad would.
/// Used by tests and headless hosts; also carries debug hooks to simulate
/// context loss and faulting draws.

use std::sync::{Arc, Mutex};
use glam::{UVec2, Vec2, Vec3, Vec4};
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;
use crate::error::{Error, Result};
use crate::shader::{ProgramDesc, ProgramSource};
use crate::uniform::{Interpolation, PixelBuffer, TextureOptions, WrapMode};
use super::graphics_device::{
    BlendMode, BoundUniform, DeviceStats, DrawCall, FramebufferHandle, GraphicsDevice,
    ProgramHandle, Rect, SamplerBinding, TextureHandle,
};

/// Fragment kernel, `None` discards the fragment
pub type FragmentShader = Arc<dyn Fn(&Fragment<'_>) -> Option<Vec4> + Send + Sync>;

// ============================================================================
// Device objects
// ============================================================================

struct SoftwareTexture {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl SoftwareTexture {
    fn texel(&self, x: u32, y: u32) -> Vec4 {
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        Vec4::new(
            self.data[offset] as f32,
            self.data[offset + 1] as f32,
            self.data[offset + 2] as f32,
            self.data[offset + 3] as f32,
        ) / 255.0
    }

    fn sample(&self, options: &TextureOptions, uv: Vec2) -> Vec4 {
        let (width, height) = (self.width, self.height);
        match options.interpolation {
            Interpolation::Nearest => {
                let x = wrap_index((uv.x * width as f32).floor() as i64, width, options.wrap[0]);
                let y = wrap_index((uv.y * height as f32).floor() as i64, height, options.wrap[1]);
                self.texel(x, y)
            }
            Interpolation::Linear => {
                let fx = uv.x * width as f32 - 0.5;
                let fy = uv.y * height as f32 - 0.5;
                let x0 = fx.floor();
                let y0 = fy.floor();
                let tx = fx - x0;
                let ty = fy - y0;
                let xs = [
                    wrap_index(x0 as i64, width, options.wrap[0]),
                    wrap_index(x0 as i64 + 1, width, options.wrap[0]),
                ];
                let ys = [
                    wrap_index(y0 as i64, height, options.wrap[1]),
                    wrap_index(y0 as i64 + 1, height, options.wrap[1]),
                ];
                let bottom = self.texel(xs[0], ys[0]).lerp(self.texel(xs[1], ys[0]), tx);
                let top = self.texel(xs[0], ys[1]).lerp(self.texel(xs[1], ys[1]), tx);
                bottom.lerp(top, ty)
            }
        }
    }
}

fn wrap_index(index: i64, size: u32, mode: WrapMode) -> u32 {
    let size = size.max(1) as i64;
    let wrapped = match mode {
        WrapMode::ClampToEdge => index.clamp(0, size - 1),
        WrapMode::Repeat => index.rem_euclid(size),
        WrapMode::MirroredRepeat => {
            let period = index.rem_euclid(2 * size);
            if period < size { period } else { 2 * size - 1 - period }
        }
    };
    wrapped as u32
}

fn to_unorm8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn blend(mode: BlendMode, src: Vec4, dst: Vec4) -> Vec4 {
    let src = src.clamp(Vec4::ZERO, Vec4::ONE);
    match mode {
        BlendMode::None => src,
        BlendMode::Alpha => {
            let rgb = src.truncate() * src.w + dst.truncate() * (1.0 - src.w);
            rgb.extend(src.w + dst.w * (1.0 - src.w))
        }
        BlendMode::Add => src + dst,
        BlendMode::Multiply => src * dst,
    }
}

struct SoftwareProgram {
    name: String,
    kernel: FragmentShader,
}

// ============================================================================
// Fragment
// ============================================================================

/// Inputs of one kernel invocation
pub struct Fragment<'a> {
    /// Normalized coordinate of the pixel center, origin bottom-left
    pub uv: Vec2,
    /// Integer pixel coordinate
    pub coord: UVec2,
    /// Target size in pixels
    pub resolution: UVec2,
    uniforms: &'a [(String, BoundUniform)],
    textures: &'a SlotMap<TextureHandle, SoftwareTexture>,
}

impl<'a> Fragment<'a> {
    /// Raw bound uniform
    pub fn uniform(&self, name: &str) -> Option<&'a BoundUniform> {
        self.uniforms.iter().find(|(n, _)| n == name).map(|(_, value)| value)
    }

    pub fn float(&self, name: &str) -> f32 {
        self.uniform(name).map(scalar).unwrap_or(0.0)
    }

    pub fn int(&self, name: &str) -> i32 {
        self.float(name) as i32
    }

    pub fn bool(&self, name: &str) -> bool {
        self.float(name) != 0.0
    }

    pub fn vec2(&self, name: &str) -> Vec2 {
        match self.uniform(name) {
            Some(BoundUniform::Vec2(v)) => *v,
            _ => Vec2::ZERO,
        }
    }

    pub fn vec3(&self, name: &str) -> Vec3 {
        match self.uniform(name) {
            Some(BoundUniform::Vec3(v)) => *v,
            _ => Vec3::ZERO,
        }
    }

    pub fn vec4(&self, name: &str) -> Vec4 {
        match self.uniform(name) {
            Some(BoundUniform::Vec4(v)) => *v,
            _ => Vec4::ZERO,
        }
    }

    /// Element of a float array
    pub fn float_at(&self, name: &str, index: usize) -> f32 {
        match self.uniform(name) {
            Some(BoundUniform::Array(values)) => values.get(index).map(scalar).unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Sample a sampler uniform, transparent black when unbound
    pub fn texture(&self, name: &str, uv: Vec2) -> Vec4 {
        match self.uniform(name) {
            Some(BoundUniform::Sampler(binding)) => self.sample(binding.as_ref(), uv),
            _ => Vec4::ZERO,
        }
    }

    /// Sample one element of a sampler array
    pub fn texture_at(&self, name: &str, index: usize, uv: Vec2) -> Vec4 {
        match self.uniform(name) {
            Some(BoundUniform::Array(values)) => match values.get(index) {
                Some(BoundUniform::Sampler(binding)) => self.sample(binding.as_ref(), uv),
                _ => Vec4::ZERO,
            },
            _ => Vec4::ZERO,
        }
    }

    fn sample(&self, binding: Option<&SamplerBinding>, uv: Vec2) -> Vec4 {
        binding
            .and_then(|binding| {
                self.textures
                    .get(binding.texture)
                    .map(|texture| texture.sample(&binding.options, uv))
            })
            .unwrap_or(Vec4::ZERO)
    }
}

fn scalar(value: &BoundUniform) -> f32 {
    match value {
        BoundUniform::Float(v) => *v,
        BoundUniform::Int(v) => *v as f32,
        BoundUniform::Bool(v) => if *v { 1.0 } else { 0.0 },
        _ => 0.0,
    }
}

// ============================================================================
// Device
// ============================================================================

/// CPU implementation of `GraphicsDevice`
#[derive(Default)]
pub struct SoftwareDevice {
    textures: SlotMap<TextureHandle, SoftwareTexture>,
    framebuffers: SlotMap<FramebufferHandle, TextureHandle>,
    programs: SlotMap<ProgramHandle, SoftwareProgram>,
    lost: bool,
    draw_calls: u64,
    draws_per_program: FxHashMap<String, u64>,
    faulty_programs: FxHashSet<String>,
}

impl SoftwareDevice {
    /// Create a new device with no objects
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a device already wrapped for sharing with a Surface
    pub fn shared() -> Arc<Mutex<SoftwareDevice>> {
        Arc::new(Mutex::new(Self::new()))
    }

    // ===== DEBUG HOOKS =====

    /// Simulate a context loss: every object is gone and every call fails
    pub fn lose_context(&mut self) {
        self.lost = true;
        self.textures.clear();
        self.framebuffers.clear();
        self.programs.clear();
    }

    /// Make every draw of the named program fail with `Error::DrawFailed`
    pub fn inject_draw_fault(&mut self, program_name: &str) {
        self.faulty_programs.insert(program_name.to_string());
    }

    /// Remove all injected faults
    pub fn clear_draw_faults(&mut self) {
        self.faulty_programs.clear();
    }

    /// Successful draws of the named program
    pub fn draw_count(&self, program_name: &str) -> u64 {
        self.draws_per_program.get(program_name).copied().unwrap_or(0)
    }

    fn check_lost(&self) -> Result<()> {
        if self.lost {
            return Err(Error::ContextLost);
        }
        Ok(())
    }

    fn texture_of(&self, framebuffer: FramebufferHandle) -> Result<TextureHandle> {
        self.framebuffers.get(framebuffer).copied().ok_or_else(|| {
            Error::InvalidResource(format!("unknown framebuffer {:?}", framebuffer))
        })
    }

    fn check_samplers(&self, uniforms: &[(String, BoundUniform)]) -> Result<()> {
        fn check(device: &SoftwareDevice, name: &str, value: &BoundUniform) -> Result<()> {
            match value {
                BoundUniform::Sampler(Some(binding)) if !device.textures.contains_key(binding.texture) => {
                    Err(Error::InvalidResource(format!(
                        "sampler '{}' references an unknown texture", name
                    )))
                }
                BoundUniform::Array(values) => {
                    values.iter().try_for_each(|value| check(device, name, value))
                }
                _ => Ok(()),
            }
        }
        uniforms.iter().try_for_each(|(name, value)| check(self, name, value))
    }
}

impl GraphicsDevice for SoftwareDevice {
    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramHandle> {
        self.check_lost()?;
        match &desc.source {
            ProgramSource::Kernel(kernel) => Ok(self.programs.insert(SoftwareProgram {
                name: desc.name.clone(),
                kernel: Arc::clone(kernel),
            })),
            ProgramSource::Text(_) => Err(Error::InvalidResource(format!(
                "program '{}' has no software kernel", desc.name
            ))),
        }
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        self.programs.remove(program);
    }

    fn create_framebuffer(&mut self, width: u32, height: u32) -> Result<FramebufferHandle> {
        self.check_lost()?;
        if width == 0 || height == 0 {
            return Err(Error::InvalidResource(format!(
                "framebuffer size must be non-zero, got {}x{}", width, height
            )));
        }
        let texture = self.textures.insert(SoftwareTexture {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        });
        Ok(self.framebuffers.insert(texture))
    }

    fn framebuffer_texture(&self, framebuffer: FramebufferHandle) -> Result<TextureHandle> {
        self.check_lost()?;
        self.texture_of(framebuffer)
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if let Some(texture) = self.framebuffers.remove(framebuffer) {
            self.textures.remove(texture);
        }
    }

    fn create_texture(&mut self, pixels: &PixelBuffer) -> Result<TextureHandle> {
        self.check_lost()?;
        Ok(self.textures.insert(SoftwareTexture {
            width: pixels.width(),
            height: pixels.height(),
            data: pixels.data().to_vec(),
        }))
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(texture);
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<()> {
        self.check_lost()?;
        let (name, kernel) = match self.programs.get(call.program) {
            Some(program) => (program.name.clone(), Arc::clone(&program.kernel)),
            None => {
                return Err(Error::InvalidResource(format!(
                    "unknown program {:?}", call.program
                )))
            }
        };
        if self.faulty_programs.contains(&name) {
            return Err(Error::DrawFailed(format!("injected fault in program '{}'", name)));
        }
        let target = self.texture_of(call.target)?;
        self.check_samplers(call.uniforms)?;

        let (width, height, mut output) = match self.textures.get(target) {
            Some(texture) => {
                let output = match call.clear {
                    Some(color) => {
                        let rgba = [
                            to_unorm8(color.x),
                            to_unorm8(color.y),
                            to_unorm8(color.z),
                            to_unorm8(color.w),
                        ];
                        rgba.repeat(texture.width as usize * texture.height as usize)
                    }
                    None => texture.data.clone(),
                };
                (texture.width, texture.height, output)
            }
            None => {
                return Err(Error::InvalidResource(
                    "framebuffer color texture is missing".to_string()
                ))
            }
        };

        let resolution = UVec2::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let fragment = Fragment {
                    uv: Vec2::new(
                        (x as f32 + 0.5) / width as f32,
                        (y as f32 + 0.5) / height as f32,
                    ),
                    coord: UVec2::new(x, y),
                    resolution,
                    uniforms: call.uniforms,
                    textures: &self.textures,
                };
                if let Some(color) = (*kernel)(&fragment) {
                    let offset = (y as usize * width as usize + x as usize) * 4;
                    let dst = Vec4::new(
                        output[offset] as f32,
                        output[offset + 1] as f32,
                        output[offset + 2] as f32,
                        output[offset + 3] as f32,
                    ) / 255.0;
                    let result = blend(call.blend, color, dst);
                    output[offset] = to_unorm8(result.x);
                    output[offset + 1] = to_unorm8(result.y);
                    output[offset + 2] = to_unorm8(result.z);
                    output[offset + 3] = to_unorm8(result.w);
                }
            }
        }

        if let Some(texture) = self.textures.get_mut(target) {
            texture.data = output;
        }
        self.draw_calls += 1;
        *self.draws_per_program.entry(name).or_insert(0) += 1;
        Ok(())
    }

    fn read_pixels(&self, framebuffer: FramebufferHandle, rect: Rect) -> Result<PixelBuffer> {
        self.check_lost()?;
        let texture = self.texture_of(framebuffer)?;
        let texture = self.textures.get(texture).ok_or_else(|| {
            Error::InvalidResource("framebuffer color texture is missing".to_string())
        })?;
        if !rect.fits_in(texture.width, texture.height) {
            return Err(Error::InvalidResource(format!(
                "read region {:?} outside of {}x{} framebuffer",
                rect, texture.width, texture.height
            )));
        }
        let mut data = Vec::with_capacity(rect.width as usize * rect.height as usize * 4);
        for y in rect.y..rect.y + rect.height {
            let start = (y as usize * texture.width as usize + rect.x as usize) * 4;
            data.extend_from_slice(&texture.data[start..start + rect.width as usize * 4]);
        }
        PixelBuffer::new(rect.width, rect.height, data)
    }

    fn is_lost(&self) -> bool {
        self.lost
    }

    fn stats(&self) -> DeviceStats {
        DeviceStats {
            draw_calls: self.draw_calls,
            programs: self.programs.len(),
            framebuffers: self.framebuffers.len(),
            textures: self.textures.len(),
        }
    }
}

#[cfg(test)]
#[path = "software_device_tests.rs"]
mod tests;
