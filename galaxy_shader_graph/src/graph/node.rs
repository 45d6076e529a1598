/// Declared node descriptions.
///
/// A node is either a Pass (one shader draw into its own framebuffer) or an
/// Alias (a named reference cell forwarding to a pass or sub-tree).
/// Nodes are identified by a stable `NodeId` chosen by the front-end.

use std::fmt;
use bitflags::bitflags;
use glam::Vec4;
use rustc_hash::FxHashMap;
use crate::shader::ProgramId;
use crate::uniform::{UniformValue, TextureRef, TextureOptionsDesc};

/// Stable node identity chosen by the front-end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags! {
    /// Pass scheduling and buffering flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PassFlags: u32 {
        /// Draw immediately inside the call that dirtied the pass
        const SYNC = 1 << 0;
        /// Keep a front/back framebuffer pair so the pass can read its previous output
        const BACKBUFFERING = 1 << 1;
    }
}

/// Declarative description of a pass
#[derive(Debug, Clone, PartialEq)]
pub struct PassDesc {
    pub id: NodeId,
    /// Structural parent, `None` for a top-level node of the Surface
    pub parent: Option<NodeId>,
    /// Position among the parent's children
    pub index: usize,
    /// Human readable name used in logs and diagnostics
    pub name: String,
    pub program: ProgramId,
    /// Explicit width, defaults to the parent pass (or Surface) width
    pub width: Option<u32>,
    /// Explicit height, defaults to the parent pass (or Surface) height
    pub height: Option<u32>,
    pub uniforms: FxHashMap<String, UniformValue>,
    pub texture_options: FxHashMap<String, TextureOptionsDesc>,
    /// Raw blend mode name, parsed by the resolver
    pub blend: Option<String>,
    /// Clear color, `None` preserves the previous contents
    pub clear: Option<Vec4>,
    pub flags: PassFlags,
}

impl PassDesc {
    /// Top-level pass with no uniforms, cleared to transparent black
    pub fn new(id: NodeId, program: ProgramId) -> Self {
        Self {
            id,
            parent: None,
            index: 0,
            name: format!("pass{}", id),
            program,
            width: None,
            height: None,
            uniforms: FxHashMap::default(),
            texture_options: FxHashMap::default(),
            blend: None,
            clear: Some(Vec4::ZERO),
            flags: PassFlags::empty(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_parent(mut self, parent: NodeId, index: usize) -> Self {
        self.parent = Some(parent);
        self.index = index;
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_uniform(mut self, name: &str, value: impl Into<UniformValue>) -> Self {
        self.uniforms.insert(name.to_string(), value.into());
        self
    }

    pub fn with_texture_options(mut self, name: &str, options: TextureOptionsDesc) -> Self {
        self.texture_options.insert(name.to_string(), options);
        self
    }

    pub fn with_blend(mut self, blend: &str) -> Self {
        self.blend = Some(blend.to_string());
        self
    }

    pub fn with_clear(mut self, clear: Option<Vec4>) -> Self {
        self.clear = clear;
        self
    }

    pub fn with_flags(mut self, flags: PassFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_sync(&self) -> bool {
        self.flags.contains(PassFlags::SYNC)
    }

    pub fn is_backbuffering(&self) -> bool {
        self.flags.contains(PassFlags::BACKBUFFERING)
    }
}

/// Binds an alias to a uniform of its parent pass
#[derive(Debug, Clone, PartialEq)]
pub struct AliasBinding {
    pub uniform: String,
    /// Slot of an array uniform, `None` binds the whole uniform
    pub index: Option<usize>,
}

/// Declarative description of an alias
#[derive(Debug, Clone, PartialEq)]
pub struct AliasDesc {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub index: usize,
    pub name: String,
    /// Explicit target, `None` forwards to the first structural child
    pub target: Option<TextureRef>,
    /// Contribute the target to a uniform of the parent pass
    pub bind_to: Option<AliasBinding>,
}

impl AliasDesc {
    /// Top-level alias forwarding to its first child
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            parent: None,
            index: 0,
            name: format!("alias{}", id),
            target: None,
            bind_to: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_parent(mut self, parent: NodeId, index: usize) -> Self {
        self.parent = Some(parent);
        self.index = index;
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn with_target(mut self, target: TextureRef) -> Self {
        self.target = Some(target);
        self
    }

    pub fn bound_to(mut self, uniform: &str, index: Option<usize>) -> Self {
        self.bind_to = Some(AliasBinding {
            uniform: uniform.to_string(),
            index,
        });
        self
    }
}

/// A declared node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeDesc {
    Pass(PassDesc),
    Alias(AliasDesc),
}

impl NodeDesc {
    pub fn id(&self) -> NodeId {
        match self {
            NodeDesc::Pass(pass) => pass.id,
            NodeDesc::Alias(alias) => alias.id,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        match self {
            NodeDesc::Pass(pass) => pass.parent,
            NodeDesc::Alias(alias) => alias.parent,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            NodeDesc::Pass(pass) => pass.index,
            NodeDesc::Alias(alias) => alias.index,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            NodeDesc::Pass(pass) => &pass.name,
            NodeDesc::Alias(alias) => &alias.name,
        }
    }
}

impl From<PassDesc> for NodeDesc {
    fn from(pass: PassDesc) -> Self {
        NodeDesc::Pass(pass)
    }
}

impl From<AliasDesc> for NodeDesc {
    fn from(alias: AliasDesc) -> Self {
        NodeDesc::Alias(alias)
    }
}
