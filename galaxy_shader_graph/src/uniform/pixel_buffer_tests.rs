//! Unit tests for pixel_buffer.rs

use super::*;

#[test]
fn test_new_checks_size() {
    assert!(PixelBuffer::new(0, 1, vec![]).is_err());
    assert!(PixelBuffer::new(2, 1, vec![0; 4]).is_err());
    assert!(PixelBuffer::new(2, 1, vec![0; 8]).is_ok());
}

#[test]
fn test_from_fn_is_bottom_row_first() {
    let buffer = PixelBuffer::from_fn(2, 2, |x, y| [x as u8, y as u8, 0, 255]);
    assert_eq!(buffer.texels()[1], [1, 0, 0, 255]);
    assert_eq!(buffer.texels()[2], [0, 1, 0, 255]);
    assert_eq!(buffer.pixel(1, 1), Some([1, 1, 0, 255]));
    assert_eq!(buffer.pixel(2, 0), None);
    assert_eq!(buffer.data().len(), 16);
}

#[test]
fn test_filled_bumps_zero_size() {
    let buffer = PixelBuffer::filled(0, 3, [9, 9, 9, 9]);
    assert_eq!((buffer.width(), buffer.height()), (1, 3));
    assert!(buffer.texels().iter().all(|texel| *texel == [9, 9, 9, 9]));
    assert_eq!(buffer.into_data().len(), 12);
}
