/// Resource manager of a Surface.
///
/// Sole owner of the GPU objects of a Surface: pass render targets
/// (single framebuffers or backbuffer pairs), linked programs and uploaded
/// textures. Passes, the scheduler and the resolver only hold ids; handles
/// are valid for the current device generation only.

use std::sync::{Arc, Mutex, MutexGuard};
use rustc_hash::{FxHashMap, FxHashSet};
use crate::engine_bail;
use crate::error::{Error, Result};
use crate::graph::NodeId;
use crate::graphics_device::{
    BoundUniform, DrawCall, FramebufferHandle, GraphicsDevice, ProgramHandle,
    Rect, SamplerBinding, TextureHandle,
};
use crate::resolver::{PassBindings, ResolvedTexture, ResolvedUniform};
use crate::shader::{ProgramDesc, ProgramId};
use crate::texture_loader::{TextureCache, TextureDescriptor};
use crate::uniform::PixelBuffer;
use super::backbuffer::{BackbufferPair, FramebufferSlot, PassTarget, TargetBuffers};

/// Number of live objects per family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub targets: usize,
    pub framebuffers: usize,
    pub programs: usize,
    pub textures: usize,
}

/// Uploaded pixel buffer, kept alive so its address stays a valid key
struct PixelTexture {
    _pixels: Arc<PixelBuffer>,
    texture: TextureHandle,
}

/// GPU objects of one Surface
pub struct ResourceManager {
    device: Arc<Mutex<dyn GraphicsDevice>>,
    targets: FxHashMap<NodeId, PassTarget>,
    programs: FxHashMap<ProgramId, ProgramHandle>,
    pixel_textures: FxHashMap<usize, PixelTexture>,
    loaded_textures: FxHashMap<TextureDescriptor, TextureHandle>,
    generation: u64,
}

impl ResourceManager {
    /// Create a manager drawing through `device`
    pub fn new(device: Arc<Mutex<dyn GraphicsDevice>>) -> Self {
        Self {
            device,
            targets: FxHashMap::default(),
            programs: FxHashMap::default(),
            pixel_textures: FxHashMap::default(),
            loaded_textures: FxHashMap::default(),
            generation: 0,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, dyn GraphicsDevice + 'static>> {
        match self.device.lock() {
            Ok(device) => Ok(device),
            Err(_) => engine_bail!("shadergraph::ResourceManager", "Graphics device lock poisoned"),
        }
    }

    /// Current device context
    pub fn device(&self) -> Arc<Mutex<dyn GraphicsDevice>> {
        Arc::clone(&self.device)
    }

    /// Device generation, incremented each time handles are invalidated
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the device context is lost
    pub fn is_lost(&self) -> bool {
        self.lock().map(|device| device.is_lost()).unwrap_or(true)
    }

    // ===== PASS TARGETS =====

    /// Make sure a pass has framebuffers of the given size
    ///
    /// A size change reallocates (the pass then has no output until drawn).
    /// Asking for a pair on a single target keeps the current buffer as the
    /// front so the last output survives; dropping the pair keeps the front.
    pub fn ensure_target(&mut self, pass: NodeId, width: u32, height: u32, needs_pair: bool) -> Result<()> {
        let existing = self.targets.get(&pass).copied();
        let target = match existing {
            Some(target) if target.width == width && target.height == height => {
                match (target.buffers, needs_pair) {
                    (TargetBuffers::Single(front), true) => {
                        let back = self.create_slot(width, height)?;
                        PassTarget {
                            buffers: TargetBuffers::Pair(BackbufferPair::new(front, back)),
                            ..target
                        }
                    }
                    (TargetBuffers::Pair(pair), false) => {
                        self.destroy_slot(pair.back());
                        PassTarget {
                            buffers: TargetBuffers::Single(pair.front()),
                            ..target
                        }
                    }
                    _ => return Ok(()),
                }
            }
            _ => {
                if let Some(old) = existing {
                    crate::engine_debug!("shadergraph::ResourceManager",
                        "Resizing {} from {}x{} to {}x{}", pass, old.width, old.height, width, height);
                    self.destroy_target(&old);
                }
                let front = self.create_slot(width, height)?;
                let buffers = if needs_pair {
                    match self.create_slot(width, height) {
                        Ok(back) => TargetBuffers::Pair(BackbufferPair::new(front, back)),
                        Err(error) => {
                            self.destroy_slot(front);
                            self.targets.remove(&pass);
                            return Err(error);
                        }
                    }
                } else {
                    TargetBuffers::Single(front)
                };
                PassTarget::new(width, height, buffers)
            }
        };
        self.targets.insert(pass, target);
        Ok(())
    }

    fn create_slot(&mut self, width: u32, height: u32) -> Result<FramebufferSlot> {
        let mut device = self.lock()?;
        let framebuffer = device.create_framebuffer(width, height)?;
        match device.framebuffer_texture(framebuffer) {
            Ok(texture) => Ok(FramebufferSlot { framebuffer, texture }),
            Err(error) => {
                device.destroy_framebuffer(framebuffer);
                Err(error)
            }
        }
    }

    fn destroy_slot(&mut self, slot: FramebufferSlot) {
        if let Ok(mut device) = self.lock() {
            device.destroy_framebuffer(slot.framebuffer);
        }
    }

    fn destroy_target(&mut self, target: &PassTarget) {
        for slot in target.slots() {
            self.destroy_slot(slot);
        }
    }

    pub fn target(&self, pass: NodeId) -> Option<&PassTarget> {
        self.targets.get(&pass)
    }

    /// Framebuffer the next draw of `pass` writes
    pub fn draw_target(&self, pass: NodeId) -> Result<FramebufferHandle> {
        match self.targets.get(&pass) {
            Some(target) => Ok(target.draw_slot().framebuffer),
            None => Err(Error::InvalidResource(format!("{} has no render target", pass))),
        }
    }

    /// Last completed output of a pass
    pub fn output_texture(&self, pass: NodeId) -> Option<TextureHandle> {
        self.targets.get(&pass)?.output().map(|slot| slot.texture)
    }

    /// Previous output of a pass, readable while it draws
    pub fn previous_output(&self, pass: NodeId) -> Option<TextureHandle> {
        self.targets.get(&pass)?.previous_output()
    }

    /// Record a successful draw, swapping a backbuffer pair
    pub fn complete_draw(&mut self, pass: NodeId) {
        if let Some(target) = self.targets.get_mut(&pass) {
            target.complete_draw();
        }
    }

    /// Release the framebuffers of a removed pass
    pub fn release_pass(&mut self, pass: NodeId) {
        if let Some(target) = self.targets.remove(&pass) {
            self.destroy_target(&target);
        }
    }

    /// Read back the last output of a pass
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidResource` if the pass has not drawn yet.
    pub fn capture(&self, pass: NodeId, rect: Option<Rect>) -> Result<PixelBuffer> {
        let target = match self.targets.get(&pass) {
            Some(target) => target,
            None => return Err(Error::InvalidResource(format!("{} has no render target", pass))),
        };
        let slot = match target.output() {
            Some(slot) => slot,
            None => return Err(Error::InvalidResource(format!("{} has not drawn yet", pass))),
        };
        let rect = rect.unwrap_or_else(|| Rect::new(0, 0, target.width, target.height));
        self.lock()?.read_pixels(slot.framebuffer, rect)
    }

    // ===== PROGRAMS AND TEXTURES =====

    /// Linked program for an id, linking on first use
    pub fn ensure_program(&mut self, id: ProgramId, desc: &ProgramDesc) -> Result<ProgramHandle> {
        if let Some(handle) = self.programs.get(&id) {
            return Ok(*handle);
        }
        let handle = self.lock()?.create_program(desc)?;
        crate::engine_trace!("shadergraph::ResourceManager", "Linked '{}' as {}", desc.name, id);
        self.programs.insert(id, handle);
        Ok(handle)
    }

    /// Texture of a raw pixel buffer, uploaded once per distinct buffer
    pub fn texture_for_pixels(&mut self, pixels: &Arc<PixelBuffer>) -> Result<TextureHandle> {
        let key = Arc::as_ptr(pixels) as usize;
        if let Some(entry) = self.pixel_textures.get(&key) {
            return Ok(entry.texture);
        }
        let texture = self.lock()?.create_texture(pixels)?;
        self.pixel_textures.insert(key, PixelTexture {
            _pixels: Arc::clone(pixels),
            texture,
        });
        Ok(texture)
    }

    /// Texture of a loaded descriptor, uploaded once per descriptor
    pub fn texture_for_descriptor(&mut self, descriptor: &TextureDescriptor, pixels: &PixelBuffer) -> Result<TextureHandle> {
        if let Some(texture) = self.loaded_textures.get(descriptor) {
            return Ok(*texture);
        }
        let texture = self.lock()?.create_texture(pixels)?;
        self.loaded_textures.insert(descriptor.clone(), texture);
        Ok(texture)
    }

    /// Turn resolved uniforms into device uniforms
    ///
    /// Textures with no content yet (pending load, pass not drawn) bind as
    /// null samplers.
    pub fn bind_uniforms(
        &mut self,
        pass: NodeId,
        bindings: &PassBindings,
        cache: &TextureCache,
    ) -> Result<Vec<(String, BoundUniform)>> {
        let mut bound = Vec::with_capacity(bindings.uniforms.len());
        for (name, uniform) in &bindings.uniforms {
            bound.push((name.clone(), self.bind_uniform(pass, uniform, cache)?));
        }
        Ok(bound)
    }

    fn bind_uniform(&mut self, pass: NodeId, uniform: &ResolvedUniform, cache: &TextureCache) -> Result<BoundUniform> {
        Ok(match uniform {
            ResolvedUniform::Value(value) => scalar_uniform(value),
            ResolvedUniform::Texture(texture, options) => {
                let texture = match texture {
                    ResolvedTexture::Null => None,
                    ResolvedTexture::Pixels(pixels) => Some(self.texture_for_pixels(pixels)?),
                    ResolvedTexture::Loaded(descriptor) => match cache.pixels(descriptor) {
                        Some(pixels) => Some(self.texture_for_descriptor(descriptor, &pixels)?),
                        None => None,
                    },
                    ResolvedTexture::PassOutput(producer) => self.output_texture(*producer),
                    ResolvedTexture::PreviousOutput => self.previous_output(pass),
                };
                BoundUniform::Sampler(texture.map(|texture| SamplerBinding {
                    texture,
                    options: *options,
                }))
            }
            ResolvedUniform::Array(values) => BoundUniform::Array(
                values
                    .iter()
                    .map(|value| self.bind_uniform(pass, value, cache))
                    .collect::<Result<Vec<_>>>()?,
            ),
        })
    }

    /// Run one draw call on the device
    pub fn draw(&mut self, call: &DrawCall<'_>) -> Result<()> {
        self.lock()?.draw(call)
    }

    /// Destroy textures and programs nothing uses anymore
    pub fn collect_garbage(
        &mut self,
        live_pixels: &[Arc<PixelBuffer>],
        live_descriptors: &FxHashSet<TextureDescriptor>,
        live_programs: &FxHashSet<ProgramId>,
    ) {
        let live_keys: FxHashSet<usize> = live_pixels
            .iter()
            .map(|pixels| Arc::as_ptr(pixels) as usize)
            .collect();

        let mut dead_textures = Vec::new();
        self.pixel_textures.retain(|key, entry| {
            let keep = live_keys.contains(key);
            if !keep {
                dead_textures.push(entry.texture);
            }
            keep
        });
        self.loaded_textures.retain(|descriptor, texture| {
            let keep = live_descriptors.contains(descriptor);
            if !keep {
                dead_textures.push(*texture);
            }
            keep
        });
        let mut dead_programs = Vec::new();
        self.programs.retain(|id, handle| {
            let keep = live_programs.contains(id);
            if !keep {
                dead_programs.push(*handle);
            }
            keep
        });

        if let Ok(mut device) = self.lock() {
            for texture in dead_textures {
                device.destroy_texture(texture);
            }
            for program in dead_programs {
                device.destroy_program(program);
            }
        }
    }

    // ===== CONTEXT LIFECYCLE =====

    /// Forget every handle without destroying anything
    ///
    /// Used when the device already dropped its objects (context loss).
    pub fn invalidate_all(&mut self) {
        self.targets.clear();
        self.programs.clear();
        self.pixel_textures.clear();
        self.loaded_textures.clear();
        self.generation += 1;
        crate::engine_debug!("shadergraph::ResourceManager",
            "Invalidated all GPU objects (generation {})", self.generation);
    }

    /// Switch to a fresh device context, objects are recreated lazily
    pub fn replace_device(&mut self, device: Arc<Mutex<dyn GraphicsDevice>>) {
        self.invalidate_all();
        self.device = device;
    }

    /// Destroy every object
    pub fn release_all(&mut self) {
        let targets: Vec<PassTarget> = self.targets.drain().map(|(_, target)| target).collect();
        let programs: Vec<ProgramHandle> = self.programs.drain().map(|(_, handle)| handle).collect();
        let mut textures: Vec<TextureHandle> = self.pixel_textures.drain().map(|(_, entry)| entry.texture).collect();
        textures.extend(self.loaded_textures.drain().map(|(_, texture)| texture));

        if let Ok(mut device) = self.lock() {
            for target in targets {
                for slot in target.slots() {
                    device.destroy_framebuffer(slot.framebuffer);
                }
            }
            for program in programs {
                device.destroy_program(program);
            }
            for texture in textures {
                device.destroy_texture(texture);
            }
        }
    }

    pub fn counts(&self) -> ResourceCounts {
        ResourceCounts {
            targets: self.targets.len(),
            framebuffers: self.targets.values().map(|target| target.slots().len()).sum(),
            programs: self.programs.len(),
            textures: self.pixel_textures.len() + self.loaded_textures.len(),
        }
    }
}

fn scalar_uniform(value: &crate::uniform::UniformValue) -> BoundUniform {
    use crate::uniform::UniformValue;
    match value {
        UniformValue::Float(v) => BoundUniform::Float(*v),
        UniformValue::Int(v) => BoundUniform::Int(*v),
        UniformValue::Bool(v) => BoundUniform::Bool(*v),
        UniformValue::Vec2(v) => BoundUniform::Vec2(*v),
        UniformValue::Vec3(v) => BoundUniform::Vec3(*v),
        UniformValue::Vec4(v) => BoundUniform::Vec4(*v),
        UniformValue::Texture(_) => BoundUniform::Sampler(None),
        UniformValue::Array(values) => BoundUniform::Array(values.iter().map(scalar_uniform).collect()),
    }
}

#[cfg(test)]
#[path = "resource_manager_tests.rs"]
mod tests;
