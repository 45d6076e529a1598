//! Unit tests for uniform_value.rs

use super::*;
use crate::uniform::PixelBuffer;

#[test]
fn test_texture_ref_pixels_compare_by_identity() {
    let a = Arc::new(PixelBuffer::filled(2, 2, [255, 0, 0, 255]));
    let b = Arc::new(PixelBuffer::filled(2, 2, [255, 0, 0, 255]));

    assert_eq!(TextureRef::Pixels(a.clone()), TextureRef::Pixels(a.clone()));
    assert_ne!(TextureRef::Pixels(a), TextureRef::Pixels(b));
}

#[test]
fn test_texture_ref_variants_compare() {
    assert_eq!(TextureRef::Null, TextureRef::Null);
    assert_eq!(TextureRef::Backbuffer, TextureRef::Backbuffer);
    assert_eq!(TextureRef::Pass(NodeId(1)), TextureRef::Pass(NodeId(1)));
    assert_ne!(TextureRef::Pass(NodeId(1)), TextureRef::Alias(NodeId(1)));
    assert_eq!(
        TextureRef::Loader(TextureDescriptor::Id(3)),
        TextureRef::Loader(TextureDescriptor::Id(3))
    );
    assert!(TextureRef::Null.is_null());
    assert!(!TextureRef::Backbuffer.is_null());
}

#[test]
fn test_texture_refs_flatten_arrays() {
    let value = UniformValue::textures([
        TextureRef::Pass(NodeId(1)),
        TextureRef::Null,
        TextureRef::Alias(NodeId(2)),
    ]);
    let refs = value.texture_refs();
    assert_eq!(refs.len(), 3);
    assert_eq!(*refs[0], TextureRef::Pass(NodeId(1)));
    assert_eq!(*refs[2], TextureRef::Alias(NodeId(2)));
}

#[test]
fn test_texture_refs_scalar_is_empty() {
    assert!(UniformValue::Float(1.0).texture_refs().is_empty());
    assert!(UniformValue::floats([1.0, 2.0]).texture_refs().is_empty());
}

#[test]
fn test_from_conversions() {
    assert_eq!(UniformValue::from(0.5f32), UniformValue::Float(0.5));
    assert_eq!(UniformValue::from(3i32), UniformValue::Int(3));
    assert_eq!(UniformValue::from(true), UniformValue::Bool(true));
    assert_eq!(
        UniformValue::from(Vec4::new(1.0, 0.0, 0.0, 1.0)),
        UniformValue::Vec4(Vec4::new(1.0, 0.0, 0.0, 1.0))
    );
    assert_eq!(UniformValue::from(TextureRef::Null).kind_name(), "texture");
}

#[test]
fn test_pixel_buffer_validation() {
    assert!(PixelBuffer::new(2, 2, vec![0; 16]).is_ok());
    assert!(PixelBuffer::new(2, 2, vec![0; 15]).is_err());
    assert!(PixelBuffer::new(0, 2, vec![]).is_err());
}

#[test]
fn test_pixel_buffer_from_fn_layout() {
    let buffer = PixelBuffer::from_fn(2, 2, |x, y| [x as u8, y as u8, 0, 255]);
    assert_eq!(buffer.pixel(0, 0), Some([0, 0, 0, 255]));
    assert_eq!(buffer.pixel(1, 0), Some([1, 0, 0, 255]));
    assert_eq!(buffer.pixel(0, 1), Some([0, 1, 0, 255]));
    assert_eq!(buffer.pixel(2, 0), None);
    assert_eq!(&buffer.data()[4..8], &[1, 0, 0, 255]);
}
