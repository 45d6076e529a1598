/// Resolved graph: what every pass binds and in which order passes draw.
///
/// A resolved graph is rebuilt on every commit. Texture references in it are
/// terminal (no aliases left) and never dangle: they name a declared pass,
/// a pixel buffer, a loader descriptor, the pass's own previous output, or null.

use std::sync::Arc;
use glam::Vec4;
use rustc_hash::{FxHashMap, FxHashSet};
use crate::graph::NodeId;
use crate::graphics_device::BlendMode;
use crate::shader::ProgramId;
use crate::texture_loader::TextureDescriptor;
use crate::uniform::{PixelBuffer, TextureOptions, UniformValue};

/// Terminal texture source of a sampler
#[derive(Debug, Clone)]
pub enum ResolvedTexture {
    Null,
    Pixels(Arc<PixelBuffer>),
    Loaded(TextureDescriptor),
    PassOutput(NodeId),
    /// Front buffer of the consuming pass
    PreviousOutput,
}

impl PartialEq for ResolvedTexture {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ResolvedTexture::Null, ResolvedTexture::Null) => true,
            (ResolvedTexture::Pixels(a), ResolvedTexture::Pixels(b)) => Arc::ptr_eq(a, b),
            (ResolvedTexture::Loaded(a), ResolvedTexture::Loaded(b)) => a == b,
            (ResolvedTexture::PassOutput(a), ResolvedTexture::PassOutput(b)) => a == b,
            (ResolvedTexture::PreviousOutput, ResolvedTexture::PreviousOutput) => true,
            _ => false,
        }
    }
}

/// A uniform ready to be bound, once textures are turned into device handles
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedUniform {
    /// Scalar or vector value
    Value(UniformValue),
    Texture(ResolvedTexture, TextureOptions),
    Array(Vec<ResolvedUniform>),
}

impl ResolvedUniform {
    fn visit_textures<'a>(&'a self, f: &mut impl FnMut(&'a ResolvedTexture)) {
        match self {
            ResolvedUniform::Texture(texture, _) => f(texture),
            ResolvedUniform::Array(values) => values.iter().for_each(|value| value.visit_textures(f)),
            ResolvedUniform::Value(_) => {}
        }
    }

    pub(crate) fn replace_pass_output(&mut self, pass: NodeId) {
        match self {
            ResolvedUniform::Texture(texture, _) if *texture == ResolvedTexture::PassOutput(pass) => {
                *texture = ResolvedTexture::Null;
            }
            ResolvedUniform::Array(values) => {
                values.iter_mut().for_each(|value| value.replace_pass_output(pass));
            }
            _ => {}
        }
    }
}

/// Everything a pass needs to draw
#[derive(Debug, Clone, PartialEq)]
pub struct PassBindings {
    pub program: ProgramId,
    /// Sorted by uniform name
    pub uniforms: Vec<(String, ResolvedUniform)>,
    pub blend: BlendMode,
    pub clear: Option<Vec4>,
    /// Declared `backbuffering`
    pub backbuffering: bool,
    /// Some uniform samples the pass's own previous output
    pub reads_previous_output: bool,
}

impl PassBindings {
    /// Whether the pass needs a front/back framebuffer pair
    pub fn needs_pair(&self) -> bool {
        self.backbuffering || self.reads_previous_output
    }

    /// Uniform by name
    pub fn uniform(&self, name: &str) -> Option<&ResolvedUniform> {
        self.uniforms
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .ok()
            .map(|index| &self.uniforms[index].1)
    }

    /// Every texture bound, arrays flattened
    pub fn textures(&self) -> Vec<&ResolvedTexture> {
        let mut textures = Vec::new();
        for (_, uniform) in &self.uniforms {
            uniform.visit_textures(&mut |texture| textures.push(texture));
        }
        textures
    }
}

/// Result of resolving a declared tree
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    pub(crate) generation: u64,
    pub(crate) order: Vec<NodeId>,
    pub(crate) dependencies: FxHashMap<NodeId, Vec<NodeId>>,
    pub(crate) dependents: FxHashMap<NodeId, Vec<NodeId>>,
    pub(crate) bindings: FxHashMap<NodeId, PassBindings>,
    pub(crate) consumers: FxHashMap<TextureDescriptor, Vec<NodeId>>,
}

impl ResolvedGraph {
    /// Resolution counter, incremented on every resolve
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Passes in draw order: dependencies first, ties by declaration order
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn contains(&self, pass: NodeId) -> bool {
        self.bindings.contains_key(&pass)
    }

    pub fn pass_count(&self) -> usize {
        self.order.len()
    }

    /// Passes whose output this pass samples, previous-output excluded
    pub fn dependencies(&self, pass: NodeId) -> &[NodeId] {
        self.dependencies.get(&pass).map(|list| list.as_slice()).unwrap_or(&[])
    }

    /// Passes sampling this pass's output
    pub fn dependents(&self, pass: NodeId) -> &[NodeId] {
        self.dependents.get(&pass).map(|list| list.as_slice()).unwrap_or(&[])
    }

    pub fn bindings(&self, pass: NodeId) -> Option<&PassBindings> {
        self.bindings.get(&pass)
    }

    /// Passes sampling a loader descriptor
    pub fn consumers(&self, descriptor: &TextureDescriptor) -> &[NodeId] {
        self.consumers.get(descriptor).map(|list| list.as_slice()).unwrap_or(&[])
    }

    /// Every loader descriptor in use
    pub fn descriptors(&self) -> impl Iterator<Item = &TextureDescriptor> + '_ {
        self.consumers.keys()
    }

    /// Every pixel buffer in use, one entry per distinct buffer
    pub fn pixel_buffers(&self) -> Vec<Arc<PixelBuffer>> {
        let mut seen = FxHashSet::default();
        let mut buffers = Vec::new();
        for pass in &self.order {
            if let Some(bindings) = self.bindings.get(pass) {
                for texture in bindings.textures() {
                    if let ResolvedTexture::Pixels(pixels) = texture {
                        if seen.insert(Arc::as_ptr(pixels)) {
                            buffers.push(Arc::clone(pixels));
                        }
                    }
                }
            }
        }
        buffers
    }

    /// Passes depending on `pass`, directly or not, in draw order
    pub fn transitive_dependents(&self, pass: NodeId) -> Vec<NodeId> {
        let reached = self.reach(pass, |graph, node| graph.dependents(node));
        self.in_order(&reached)
    }

    /// Passes `pass` depends on, directly or not
    pub fn dependency_closure(&self, pass: NodeId) -> FxHashSet<NodeId> {
        self.reach(pass, |graph, node| graph.dependencies(node))
    }

    /// Keep the nodes of `set` in draw order
    pub fn in_order(&self, set: &FxHashSet<NodeId>) -> Vec<NodeId> {
        self.order.iter().copied().filter(|node| set.contains(node)).collect()
    }

    fn reach<'a>(&'a self, start: NodeId, next: impl Fn(&'a Self, NodeId) -> &'a [NodeId]) -> FxHashSet<NodeId> {
        let mut reached = FxHashSet::default();
        let mut stack = next(self, start).to_vec();
        while let Some(node) = stack.pop() {
            if node != start && reached.insert(node) {
                stack.extend_from_slice(next(self, node));
            }
        }
        reached
    }
}
