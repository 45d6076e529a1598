/// Uniform values bound to a pass.
///
/// Texture references are a closed tagged union resolved once per commit
/// by the dependency resolver, never inspected by type at draw time.

use std::sync::Arc;
use glam::{Vec2, Vec3, Vec4};
use crate::graph::NodeId;
use crate::texture_loader::TextureDescriptor;
use super::PixelBuffer;

/// Reference to a texture source
#[derive(Debug, Clone)]
pub enum TextureRef {
    /// No texture, samples as transparent black
    Null,
    /// Raw pixel buffer, uploaded once per distinct buffer
    Pixels(Arc<PixelBuffer>),
    /// Opaque descriptor resolved by a texture loader
    Loader(TextureDescriptor),
    /// Output of another pass
    Pass(NodeId),
    /// Whatever the alias currently forwards to
    Alias(NodeId),
    /// The consuming pass's own previous output
    Backbuffer,
}

impl TextureRef {
    /// Wrap a pixel buffer
    pub fn pixels(buffer: PixelBuffer) -> Self {
        TextureRef::Pixels(Arc::new(buffer))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TextureRef::Null)
    }
}

impl PartialEq for TextureRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TextureRef::Null, TextureRef::Null) => true,
            (TextureRef::Pixels(a), TextureRef::Pixels(b)) => Arc::ptr_eq(a, b),
            (TextureRef::Loader(a), TextureRef::Loader(b)) => a == b,
            (TextureRef::Pass(a), TextureRef::Pass(b)) => a == b,
            (TextureRef::Alias(a), TextureRef::Alias(b)) => a == b,
            (TextureRef::Backbuffer, TextureRef::Backbuffer) => true,
            _ => false,
        }
    }
}

/// A value bound to a shader uniform
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Texture(TextureRef),
    Array(Vec<UniformValue>),
}

impl UniformValue {
    /// Array of texture references
    pub fn textures(refs: impl IntoIterator<Item = TextureRef>) -> Self {
        UniformValue::Array(refs.into_iter().map(UniformValue::Texture).collect())
    }

    /// Array of floats
    pub fn floats(values: impl IntoIterator<Item = f32>) -> Self {
        UniformValue::Array(values.into_iter().map(UniformValue::Float).collect())
    }

    /// Every texture reference in this value, arrays flattened
    pub fn texture_refs(&self) -> Vec<&TextureRef> {
        let mut refs = Vec::new();
        self.collect_texture_refs(&mut refs);
        refs
    }

    fn collect_texture_refs<'a>(&'a self, out: &mut Vec<&'a TextureRef>) {
        match self {
            UniformValue::Texture(texture) => out.push(texture),
            UniformValue::Array(values) => {
                for value in values {
                    value.collect_texture_refs(out);
                }
            }
            _ => {}
        }
    }

    /// Short name of the value's shape, for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            UniformValue::Float(_) => "float",
            UniformValue::Int(_) => "int",
            UniformValue::Bool(_) => "bool",
            UniformValue::Vec2(_) => "vec2",
            UniformValue::Vec3(_) => "vec3",
            UniformValue::Vec4(_) => "vec4",
            UniformValue::Texture(_) => "texture",
            UniformValue::Array(_) => "array",
        }
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        UniformValue::Bool(value)
    }
}

impl From<Vec2> for UniformValue {
    fn from(value: Vec2) -> Self {
        UniformValue::Vec2(value)
    }
}

impl From<Vec3> for UniformValue {
    fn from(value: Vec3) -> Self {
        UniformValue::Vec3(value)
    }
}

impl From<Vec4> for UniformValue {
    fn from(value: Vec4) -> Self {
        UniformValue::Vec4(value)
    }
}

impl From<TextureRef> for UniformValue {
    fn from(value: TextureRef) -> Self {
        UniformValue::Texture(value)
    }
}

#[cfg(test)]
#[path = "uniform_value_tests.rs"]
mod tests;
