//! Unit tests for the software graphics device

use super::*;
use crate::shader::{ProgramDesc, UniformDecl, UniformType};

// ============================================================================
// HELPERS
// ============================================================================

fn uv_program() -> ProgramDesc {
    ProgramDesc::kernel("uv", vec![], |f| Some(Vec4::new(f.uv.x, f.uv.y, 0.0, 1.0)))
}

fn copy_program() -> ProgramDesc {
    ProgramDesc::kernel(
        "copy",
        vec![UniformDecl::new("t", UniformType::Sampler2D)],
        |f| Some(f.texture("t", f.uv)),
    )
}

fn sampler(texture: TextureHandle, interpolation: Interpolation) -> BoundUniform {
    BoundUniform::Sampler(Some(SamplerBinding {
        texture,
        options: TextureOptions {
            interpolation,
            ..TextureOptions::default()
        },
    }))
}

fn draw(device: &mut SoftwareDevice, program: ProgramHandle, target: FramebufferHandle,
        uniforms: &[(String, BoundUniform)]) -> Result<()> {
    device.draw(&DrawCall {
        program,
        target,
        clear: Some(Vec4::ZERO),
        blend: BlendMode::None,
        uniforms,
    })
}

// ============================================================================
// DRAW & READ BACK
// ============================================================================

#[test]
fn test_uv_gradient_bottom_left_origin() {
    let mut device = SoftwareDevice::new();
    let program = device.create_program(&uv_program()).unwrap();
    let fb = device.create_framebuffer(2, 2).unwrap();
    draw(&mut device, program, fb, &[]).unwrap();

    let pixels = device.read_pixels(fb, Rect::new(0, 1, 1, 1)).unwrap();
    assert_eq!(pixels.data(), &[64, 191, 0, 255]);
    let pixels = device.read_pixels(fb, Rect::new(1, 0, 1, 1)).unwrap();
    assert_eq!(pixels.data(), &[191, 64, 0, 255]);
}

#[test]
fn test_null_sampler_is_transparent() {
    let mut device = SoftwareDevice::new();
    let program = device.create_program(&copy_program()).unwrap();
    let fb = device.create_framebuffer(2, 2).unwrap();
    let uniforms = vec![("t".to_string(), BoundUniform::Sampler(None))];
    draw(&mut device, program, fb, &uniforms).unwrap();

    let pixels = device.read_pixels(fb, Rect::new(0, 0, 2, 2)).unwrap();
    assert!(pixels.data().iter().all(|b| *b == 0));
}

#[test]
fn test_copy_scales_up_uniform_texture() {
    let mut device = SoftwareDevice::new();
    let program = device.create_program(&copy_program()).unwrap();
    let red = device.create_texture(&PixelBuffer::filled(2, 2, [255, 0, 0, 255])).unwrap();
    let fb = device.create_framebuffer(10, 10).unwrap();
    let uniforms = vec![("t".to_string(), sampler(red, Interpolation::Linear))];
    draw(&mut device, program, fb, &uniforms).unwrap();

    let pixels = device.read_pixels(fb, Rect::new(5, 5, 1, 1)).unwrap();
    assert_eq!(pixels.data(), &[255, 0, 0, 255]);
}

#[test]
fn test_nearest_vs_linear_interpolation() {
    let mut device = SoftwareDevice::new();
    let program = device.create_program(&copy_program()).unwrap();
    // Left texel red, right texel blue
    let texture = device.create_texture(&PixelBuffer::from_fn(2, 1, |x, _| {
        if x == 0 { [255, 0, 0, 255] } else { [0, 0, 255, 255] }
    })).unwrap();
    let fb = device.create_framebuffer(4, 1).unwrap();

    let nearest = vec![("t".to_string(), sampler(texture, Interpolation::Nearest))];
    draw(&mut device, program, fb, &nearest).unwrap();
    let pixels = device.read_pixels(fb, Rect::new(1, 0, 1, 1)).unwrap();
    assert_eq!(pixels.data(), &[255, 0, 0, 255]);

    let linear = vec![("t".to_string(), sampler(texture, Interpolation::Linear))];
    draw(&mut device, program, fb, &linear).unwrap();
    let pixels = device.read_pixels(fb, Rect::new(1, 0, 1, 1)).unwrap();
    // uv.x = 0.375 -> 75% red, 25% blue
    assert_eq!(pixels.data(), &[191, 0, 64, 255]);
}

#[test]
fn test_wrap_modes() {
    assert_eq!(wrap_index(-1, 4, WrapMode::ClampToEdge), 0);
    assert_eq!(wrap_index(5, 4, WrapMode::ClampToEdge), 3);
    assert_eq!(wrap_index(-1, 4, WrapMode::Repeat), 3);
    assert_eq!(wrap_index(5, 4, WrapMode::Repeat), 1);
    assert_eq!(wrap_index(4, 4, WrapMode::MirroredRepeat), 3);
    assert_eq!(wrap_index(-1, 4, WrapMode::MirroredRepeat), 0);
}

#[test]
fn test_clear_none_preserves_and_discard_keeps_pixels() {
    let mut device = SoftwareDevice::new();
    let fill = device.create_program(&ProgramDesc::kernel("fill", vec![], |_| {
        Some(Vec4::new(0.0, 1.0, 0.0, 1.0))
    })).unwrap();
    let left_only = device.create_program(&ProgramDesc::kernel("left", vec![], |f| {
        if f.coord.x == 0 { Some(Vec4::new(1.0, 0.0, 0.0, 1.0)) } else { None }
    })).unwrap();
    let fb = device.create_framebuffer(2, 1).unwrap();

    draw(&mut device, fill, fb, &[]).unwrap();
    device.draw(&DrawCall {
        program: left_only,
        target: fb,
        clear: None,
        blend: BlendMode::None,
        uniforms: &[],
    }).unwrap();

    let pixels = device.read_pixels(fb, Rect::new(0, 0, 2, 1)).unwrap();
    assert_eq!(pixels.data(), &[255, 0, 0, 255, 0, 255, 0, 255]);
}

#[test]
fn test_blend_modes() {
    let src = Vec4::new(1.0, 0.5, 0.0, 0.5);
    let dst = Vec4::new(0.0, 0.5, 1.0, 1.0);

    assert_eq!(blend(BlendMode::None, src, dst), src);
    assert_eq!(blend(BlendMode::Add, src, dst), Vec4::new(1.0, 1.0, 1.0, 1.5));
    assert_eq!(blend(BlendMode::Multiply, src, dst), Vec4::new(0.0, 0.25, 0.0, 0.5));
    assert_eq!(blend(BlendMode::Alpha, src, dst), Vec4::new(0.5, 0.5, 0.5, 1.0));
}

#[test]
fn test_uniform_accessors() {
    let mut device = SoftwareDevice::new();
    let program = device.create_program(&ProgramDesc::kernel("blue", vec![], |f| {
        Some(Vec4::new(f.float_at("a", 1), 0.0, f.float("blue"), 1.0))
    })).unwrap();
    let fb = device.create_framebuffer(1, 1).unwrap();
    let uniforms = vec![
        ("blue".to_string(), BoundUniform::Float(1.0)),
        ("a".to_string(), BoundUniform::Array(vec![BoundUniform::Float(0.0), BoundUniform::Int(1)])),
    ];
    draw(&mut device, program, fb, &uniforms).unwrap();
    assert_eq!(device.read_pixels(fb, Rect::new(0, 0, 1, 1)).unwrap().data(), &[255, 0, 255, 255]);
}

// ============================================================================
// ERRORS & DEBUG HOOKS
// ============================================================================

#[test]
fn test_text_program_rejected() {
    let mut device = SoftwareDevice::new();
    let desc = ProgramDesc {
        name: "glsl".to_string(),
        uniforms: vec![],
        source: crate::shader::ProgramSource::Text("void main() {}".to_string()),
    };
    assert!(matches!(device.create_program(&desc), Err(Error::InvalidResource(_))));
}

#[test]
fn test_zero_sized_framebuffer_rejected() {
    let mut device = SoftwareDevice::new();
    assert!(device.create_framebuffer(0, 4).is_err());
}

#[test]
fn test_read_outside_framebuffer_rejected() {
    let mut device = SoftwareDevice::new();
    let fb = device.create_framebuffer(2, 2).unwrap();
    assert!(device.read_pixels(fb, Rect::new(1, 1, 2, 1)).is_err());
}

#[test]
fn test_read_far_outside_framebuffer_rejected() {
    let mut device = SoftwareDevice::new();
    let fb = device.create_framebuffer(2, 2).unwrap();
    assert!(matches!(device.read_pixels(fb, Rect::new(u32::MAX, 0, 2, 1)), Err(Error::InvalidResource(_))));
    assert!(matches!(device.read_pixels(fb, Rect::new(0, 1, 1, u32::MAX)), Err(Error::InvalidResource(_))));
}

#[test]
fn test_rect_fits_in() {
    assert!(Rect::new(0, 0, 2, 2).fits_in(2, 2));
    assert!(Rect::new(1, 1, 1, 1).fits_in(2, 2));
    assert!(!Rect::new(1, 0, 2, 1).fits_in(2, 2));
    assert!(!Rect::new(0, 0, 0, 1).fits_in(2, 2));
    assert!(!Rect::new(u32::MAX, u32::MAX, 1, 1).fits_in(2, 2));
}

#[test]
fn test_unknown_sampler_texture_rejected() {
    let mut device = SoftwareDevice::new();
    let program = device.create_program(&copy_program()).unwrap();
    let texture = device.create_texture(&PixelBuffer::filled(1, 1, [0, 0, 0, 255])).unwrap();
    device.destroy_texture(texture);
    let fb = device.create_framebuffer(1, 1).unwrap();
    let uniforms = vec![("t".to_string(), sampler(texture, Interpolation::Linear))];

    assert!(matches!(draw(&mut device, program, fb, &uniforms), Err(Error::InvalidResource(_))));
}

#[test]
fn test_injected_fault() {
    let mut device = SoftwareDevice::new();
    let program = device.create_program(&uv_program()).unwrap();
    let fb = device.create_framebuffer(1, 1).unwrap();

    device.inject_draw_fault("uv");
    assert!(matches!(draw(&mut device, program, fb, &[]), Err(Error::DrawFailed(_))));
    assert_eq!(device.draw_count("uv"), 0);

    device.clear_draw_faults();
    draw(&mut device, program, fb, &[]).unwrap();
    assert_eq!(device.draw_count("uv"), 1);
    assert_eq!(device.stats().draw_calls, 1);
}

#[test]
fn test_lose_context() {
    let mut device = SoftwareDevice::new();
    let program = device.create_program(&uv_program()).unwrap();
    let fb = device.create_framebuffer(1, 1).unwrap();

    device.lose_context();
    assert!(device.is_lost());
    assert_eq!(draw(&mut device, program, fb, &[]), Err(Error::ContextLost));
    assert_eq!(device.create_framebuffer(1, 1), Err(Error::ContextLost));
    assert!(matches!(device.read_pixels(fb, Rect::new(0, 0, 1, 1)), Err(Error::ContextLost)));
    assert_eq!(device.stats().framebuffers, 0);
}

#[test]
fn test_destroy_framebuffer_releases_texture() {
    let mut device = SoftwareDevice::new();
    let fb = device.create_framebuffer(2, 2).unwrap();
    assert_eq!(device.stats().textures, 1);
    device.destroy_framebuffer(fb);
    assert_eq!(device.stats(), DeviceStats::default());
}
