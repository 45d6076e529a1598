/// Shader catalog: compiled-program descriptions keyed by a stable id.
///
/// The core never compiles shader source. A program is an opaque `source`
/// plus the uniform declarations the resolver validates bindings against.

use std::fmt;
use std::sync::Arc;
use glam::{Vec2, Vec3, Vec4};
use rustc_hash::FxHashMap;
use crate::graphics_device::{Fragment, FragmentShader};
use crate::uniform::{UniformValue, TextureRef};

/// Stable program identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "program#{}", self.0)
    }
}

/// Declared type of a shader uniform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniformType {
    Float,
    Int,
    Bool,
    Vec2,
    Vec3,
    Vec4,
    Sampler2D,
    /// Fixed-length array, e.g. `sampler2D t[2]`
    Array(Box<UniformType>, usize),
}

impl UniformType {
    /// Whether `value` has the shape this type expects
    ///
    /// Scalars coerce between float, int and bool like GLSL setters do.
    pub fn accepts(&self, value: &UniformValue) -> bool {
        match (self, value) {
            (UniformType::Float, UniformValue::Float(_) | UniformValue::Int(_)) => true,
            (UniformType::Int, UniformValue::Int(_) | UniformValue::Float(_)) => true,
            (UniformType::Bool, UniformValue::Bool(_) | UniformValue::Int(_) | UniformValue::Float(_)) => true,
            (UniformType::Vec2, UniformValue::Vec2(_)) => true,
            (UniformType::Vec3, UniformValue::Vec3(_)) => true,
            (UniformType::Vec4, UniformValue::Vec4(_)) => true,
            (UniformType::Sampler2D, UniformValue::Texture(_)) => true,
            (UniformType::Array(element, len), UniformValue::Array(values)) => {
                values.len() == *len && values.iter().all(|value| element.accepts(value))
            }
            _ => false,
        }
    }

    /// Value bound when a uniform is missing or malformed
    pub fn default_value(&self) -> UniformValue {
        match self {
            UniformType::Float => UniformValue::Float(0.0),
            UniformType::Int => UniformValue::Int(0),
            UniformType::Bool => UniformValue::Bool(false),
            UniformType::Vec2 => UniformValue::Vec2(Vec2::ZERO),
            UniformType::Vec3 => UniformValue::Vec3(Vec3::ZERO),
            UniformType::Vec4 => UniformValue::Vec4(Vec4::ZERO),
            UniformType::Sampler2D => UniformValue::Texture(TextureRef::Null),
            UniformType::Array(element, len) => {
                UniformValue::Array((0..*len).map(|_| element.default_value()).collect())
            }
        }
    }

    /// Whether the type holds textures (directly or as array elements)
    pub fn is_sampler(&self) -> bool {
        match self {
            UniformType::Sampler2D => true,
            UniformType::Array(element, _) => element.is_sampler(),
            _ => false,
        }
    }
}

/// Declaration of one uniform of a program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: String,
    pub ty: UniformType,
}

impl UniformDecl {
    pub fn new(name: &str, ty: UniformType) -> Self {
        Self {
            name: name.to_string(),
            ty,
        }
    }
}

/// Opaque program source
#[derive(Clone)]
pub enum ProgramSource {
    /// CPU fragment kernel run by the software device
    Kernel(FragmentShader),
    /// Source text for a compiling backend
    Text(String),
}

impl fmt::Debug for ProgramSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramSource::Kernel(_) => write!(f, "Kernel(..)"),
            ProgramSource::Text(text) => write!(f, "Text({} bytes)", text.len()),
        }
    }
}

/// A compiled program description
#[derive(Debug, Clone)]
pub struct ProgramDesc {
    pub name: String,
    pub uniforms: Vec<UniformDecl>,
    pub source: ProgramSource,
}

impl ProgramDesc {
    /// Program backed by a software fragment kernel
    pub fn kernel<F>(name: &str, uniforms: Vec<UniformDecl>, kernel: F) -> Self
    where
        F: Fn(&Fragment<'_>) -> Option<Vec4> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            uniforms,
            source: ProgramSource::Kernel(Arc::new(kernel)),
        }
    }

    /// Declaration of a uniform by name
    pub fn uniform(&self, name: &str) -> Option<&UniformDecl> {
        self.uniforms.iter().find(|decl| decl.name == name)
    }
}

/// Registry of programs available to surfaces
#[derive(Debug, Default)]
pub struct ShaderCatalog {
    programs: FxHashMap<ProgramId, Arc<ProgramDesc>>,
    next_id: u32,
}

impl ShaderCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a program under a fresh id
    pub fn register(&mut self, desc: ProgramDesc) -> ProgramId {
        loop {
            self.next_id = self.next_id.wrapping_add(1);
            let id = ProgramId(self.next_id);
            if !self.programs.contains_key(&id) {
                self.programs.insert(id, Arc::new(desc));
                return id;
            }
        }
    }

    /// Register (or replace) a program under a caller-chosen id
    pub fn register_with_id(&mut self, id: ProgramId, desc: ProgramDesc) {
        self.programs.insert(id, Arc::new(desc));
    }

    /// Get a program by id
    pub fn program(&self, id: ProgramId) -> Option<Arc<ProgramDesc>> {
        self.programs.get(&id).cloned()
    }

    /// Remove a program by id
    pub fn remove_program(&mut self, id: ProgramId) -> Option<Arc<ProgramDesc>> {
        self.programs.remove(&id)
    }

    /// Get the number of programs
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Get all program names
    pub fn program_names(&self) -> Vec<&str> {
        self.programs.values().map(|desc| desc.name.as_str()).collect()
    }

    /// Remove all programs
    pub fn clear(&mut self) {
        self.programs.clear();
    }
}

#[cfg(test)]
#[path = "shader_catalog_tests.rs"]
mod tests;
