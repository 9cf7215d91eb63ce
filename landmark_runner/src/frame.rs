//! Frame source contract, frame buffers and detector-ready images.
//!
//! All pixel data is RGBA8, row-major, tightly packed.

use std::task::Poll;

use thiserror::Error;

use crate::error::RunnerError;

pub const BYTES_PER_PIXEL: usize = 4;

// ════════════════════════════════════════════════════════════════════════════
// Source side
// ════════════════════════════════════════════════════════════════════════════

/// How the source's pixels must be oriented before detection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransformHints {
    pub flip_horizontally: bool,
    pub flip_vertically:   bool,
    /// Passed through to the detector; not applied to pixels.
    pub rotation_degrees:  i32,
}

/// Borrowed view of the source's current frame.
#[derive(Clone, Copy, Debug)]
pub struct RawImage<'a> {
    pub width:  u32,
    pub height: u32,
    pub pixels: &'a [u8],
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is {got_w}x{got_h}, buffer is {want_w}x{want_h}")]
    DimensionMismatch { want_w: u32, want_h: u32, got_w: u32, got_h: u32 },

    #[error("pixel data is {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum ReadbackError {
    #[error("readback failed: {0}")]
    Failed(String),
}

/// An in-flight asynchronous readback.  Polled once per tick until it
/// yields the frame's pixels or an error.
pub trait PendingReadback {
    fn poll(&mut self) -> Poll<Result<Vec<u8>, ReadbackError>>;
}

/// Camera or image source.
pub trait FrameSource {
    fn is_ready(&self) -> bool;
    fn dimensions(&self) -> (u32, u32);
    fn current_frame(&self) -> RawImage<'_>;

    fn transform_hints(&self) -> TransformHints {
        TransformHints::default()
    }

    /// Begin an asynchronous copy of the current frame.
    fn request_readback(&mut self) -> Box<dyn PendingReadback>;
}

// ════════════════════════════════════════════════════════════════════════════
// GPU path
// ════════════════════════════════════════════════════════════════════════════

/// Handle to a texture owned by a [`GpuContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuTexture {
    pub name: u32,
}

/// Graphics context able to turn a frame buffer into a GPU image.
pub trait GpuContext {
    fn upload(&mut self, buffer: &FrameBuffer) -> Result<GpuTexture, RunnerError>;
}

// ════════════════════════════════════════════════════════════════════════════
// FrameBuffer
// ════════════════════════════════════════════════════════════════════════════

/// Reusable pixel buffer handed out by [`crate::FramePool`].
#[derive(Debug)]
pub struct FrameBuffer {
    width:  u32,
    height: u32,
    pixels: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        FrameBuffer {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
        }
    }

    pub fn width(&self) -> u32    { self.width }
    pub fn height(&self) -> u32   { self.height }
    pub fn pixels(&self) -> &[u8] { &self.pixels }

    /// Copy the source frame in, applying the flips from `hints`.
    pub fn read_from(&mut self, src: &RawImage<'_>, hints: TransformHints) -> Result<(), FrameError> {
        if src.width != self.width || src.height != self.height {
            return Err(FrameError::DimensionMismatch {
                want_w: self.width, want_h: self.height,
                got_w:  src.width,  got_h:  src.height,
            });
        }
        self.copy_oriented(src.pixels, hints)
    }

    /// Store the pixels of a completed asynchronous readback.
    pub fn write_readback(&mut self, data: &[u8], hints: TransformHints) -> Result<(), FrameError> {
        self.copy_oriented(data, hints)
    }

    fn copy_oriented(&mut self, src: &[u8], hints: TransformHints) -> Result<(), FrameError> {
        if src.len() != self.pixels.len() {
            return Err(FrameError::SizeMismatch { expected: self.pixels.len(), actual: src.len() });
        }
        if !hints.flip_horizontally && !hints.flip_vertically {
            self.pixels.copy_from_slice(src);
            return Ok(());
        }

        let w = self.width as usize;
        let h = self.height as usize;
        let row = w * BYTES_PER_PIXEL;
        for y in 0..h {
            let sy = if hints.flip_vertically { h - 1 - y } else { y };
            let src_row = &src[sy * row..(sy + 1) * row];
            let dst_row = &mut self.pixels[y * row..(y + 1) * row];
            if hints.flip_horizontally {
                for x in 0..w {
                    let sx = w - 1 - x;
                    dst_row[x * BYTES_PER_PIXEL..(x + 1) * BYTES_PER_PIXEL]
                        .copy_from_slice(&src_row[sx * BYTES_PER_PIXEL..(sx + 1) * BYTES_PER_PIXEL]);
                }
            } else {
                dst_row.copy_from_slice(src_row);
            }
        }
        Ok(())
    }

    /// Detector-ready CPU image.  Pixels are copied out, so the buffer can
    /// go back to the pool straight away.
    pub fn to_image(&self) -> Image {
        Image::cpu(self.width, self.height, self.pixels.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Image
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub enum ImageData {
    Cpu(Vec<u8>),
    Gpu(GpuTexture),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub width:  u32,
    pub height: u32,
    pub data:   ImageData,
}

impl Image {
    pub fn cpu(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Image { width, height, data: ImageData::Cpu(pixels) }
    }

    pub fn gpu(width: u32, height: u32, texture: GpuTexture) -> Self {
        Image { width, height, data: ImageData::Gpu(texture) }
    }

    pub fn pixels(&self) -> Option<&[u8]> {
        match &self.data {
            ImageData::Cpu(p) => Some(p),
            ImageData::Gpu(_) => None,
        }
    }

    /// RGBA at `(x, y)`; `None` off-image or for GPU images.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let p = self.pixels()?.get(i..i + BYTES_PER_PIXEL)?;
        Some([p[0], p[1], p[2], p[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2×2 image, pixel value = index in the red channel
    fn quad() -> Vec<u8> {
        (0..4u8).flat_map(|i| [i, 0, 0, 255]).collect()
    }

    fn reds(buf: &FrameBuffer) -> Vec<u8> {
        buf.pixels().chunks(4).map(|p| p[0]).collect()
    }

    #[test]
    fn plain_copy() {
        let data = quad();
        let mut b = FrameBuffer::new(2, 2);
        b.read_from(&RawImage { width: 2, height: 2, pixels: &data }, TransformHints::default()).unwrap();
        assert_eq!(reds(&b), vec![0, 1, 2, 3]);
    }

    #[test]
    fn flips() {
        let data = quad();
        let src = RawImage { width: 2, height: 2, pixels: &data };
        let mut b = FrameBuffer::new(2, 2);

        b.read_from(&src, TransformHints { flip_horizontally: true, ..Default::default() }).unwrap();
        assert_eq!(reds(&b), vec![1, 0, 3, 2]);

        b.read_from(&src, TransformHints { flip_vertically: true, ..Default::default() }).unwrap();
        assert_eq!(reds(&b), vec![2, 3, 0, 1]);

        b.read_from(&src, TransformHints { flip_horizontally: true, flip_vertically: true, rotation_degrees: 0 }).unwrap();
        assert_eq!(reds(&b), vec![3, 2, 1, 0]);
    }

    #[test]
    fn dimension_mismatch() {
        let data = vec![0u8; 3 * 2 * 4];
        let mut b = FrameBuffer::new(2, 2);
        let err = b.read_from(&RawImage { width: 3, height: 2, pixels: &data }, TransformHints::default());
        assert!(matches!(err, Err(FrameError::DimensionMismatch { .. })));
    }

    #[test]
    fn short_readback_is_rejected() {
        let mut b = FrameBuffer::new(2, 2);
        let err = b.write_readback(&[0u8; 5], TransformHints::default());
        assert_eq!(err, Err(FrameError::SizeMismatch { expected: 16, actual: 5 }));
    }

    #[test]
    fn image_pixel_lookup() {
        let data = quad();
        let mut b = FrameBuffer::new(2, 2);
        b.write_readback(&data, TransformHints::default()).unwrap();
        let img = b.to_image();
        assert_eq!(img.pixel(1, 1), Some([3, 0, 0, 255]));
        assert_eq!(img.pixel(2, 0), None);
        assert_eq!(Image::gpu(2, 2, GpuTexture { name: 7 }).pixel(0, 0), None);
    }
}
