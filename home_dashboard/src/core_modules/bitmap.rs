// THEORY:
// The bitmap encoder serializes a `MonoImage` into the exact 1-bit BMP layout the
// e-paper panel firmware expects. The byte layout is fixed:
//
//   offset  size  content
//   0       14    file header   "BM", file size, 2 x reserved, pixel offset (62)
//   14      40    BITMAPINFOHEADER (bottom-up, 1 bpp, BI_RGB, 2 palette colors)
//   54      8     palette       index 0 = white, index 1 = black (BGRA)
//   62      ...   pixel rows    bottom-up, MSB first, black = 1, padded to 4 bytes
//
// The encoder trusts the boolean grid it is given. Color images that should skip
// dithering go through `encode_color`, which thresholds at 50% luminance first.

use image::DynamicImage;

use crate::core_modules::luminance::{HALF_LUMINANCE, LumaPlane};
use crate::core_modules::monochrome::MonoImage;

pub const FILE_HEADER_SIZE: u32 = 14;
pub const DIB_HEADER_SIZE: u32 = 40;
pub const PALETTE_SIZE: u32 = 8;
pub const PIXEL_DATA_OFFSET: u32 = FILE_HEADER_SIZE + DIB_HEADER_SIZE + PALETTE_SIZE;

const SIGNATURE: [u8; 2] = *b"BM";
const BITS_PER_PIXEL: u16 = 1;
const COMPRESSION_BI_RGB: u32 = 0;
const PALETTE_COLORS: u32 = 2;
const PALETTE: [u8; PALETTE_SIZE as usize] = [
    0xFF, 0xFF, 0xFF, 0x00, // index 0: white
    0x00, 0x00, 0x00, 0x00, // index 1: black
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BitmapError {
    /// The image does not fit the 32-bit header fields.
    #[error("image too large for a BMP header: {width}x{height}")]
    TooLarge { width: u32, height: u32 },

    #[error("bitmap truncated: {len} bytes")]
    Truncated { len: usize },

    #[error("not a BMP file (signature {0:02x?})")]
    BadSignature([u8; 2]),
}

/// Bytes per encoded row: `ceil(width / 8)` rounded up to a multiple of 4.
pub fn row_stride(width: u32) -> usize {
    (width as usize).div_ceil(8).next_multiple_of(4)
}

/// Encodes a monochrome image as a 1-bpp bottom-up BMP.
pub fn encode(image: &MonoImage) -> Result<Vec<u8>, BitmapError> {
    let too_large = || BitmapError::TooLarge {
        width: image.width(),
        height: image.height(),
    };

    let width = i32::try_from(image.width()).map_err(|_| too_large())?;
    let height = i32::try_from(image.height()).map_err(|_| too_large())?;
    let stride = row_stride(image.width());
    let image_size = stride
        .checked_mul(image.height() as usize)
        .and_then(|size| u32::try_from(size).ok())
        .ok_or_else(too_large)?;
    let file_size = image_size
        .checked_add(PIXEL_DATA_OFFSET)
        .ok_or_else(too_large)?;

    let mut out = Vec::with_capacity(file_size as usize);

    // File header.
    out.extend_from_slice(&SIGNATURE);
    out.extend_from_slice(&file_size.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&PIXEL_DATA_OFFSET.to_le_bytes());

    // BITMAPINFOHEADER.
    out.extend_from_slice(&DIB_HEADER_SIZE.to_le_bytes());
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // planes
    out.extend_from_slice(&BITS_PER_PIXEL.to_le_bytes());
    out.extend_from_slice(&COMPRESSION_BI_RGB.to_le_bytes());
    out.extend_from_slice(&image_size.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes()); // x pixels per meter
    out.extend_from_slice(&0i32.to_le_bytes()); // y pixels per meter
    out.extend_from_slice(&PALETTE_COLORS.to_le_bytes());
    out.extend_from_slice(&PALETTE_COLORS.to_le_bytes());

    out.extend_from_slice(&PALETTE);

    let mut row = vec![0u8; stride];
    for y in (0..image.height()).rev() {
        row.fill(0);
        for (x, _) in image.row(y).iter().enumerate().filter(|(_, black)| **black) {
            row[x / 8] |= 0x80 >> (x % 8);
        }
        out.extend_from_slice(&row);
    }

    debug_assert_eq!(out.len(), file_size as usize);
    Ok(out)
}

/// Direct path for color images that should not be dithered: a pixel is black when
/// its luminance is below the 50% point.
pub fn encode_color(image: &DynamicImage) -> Result<Vec<u8>, BitmapError> {
    let plane = LumaPlane::from_image(image);
    let mono = MonoImage::from_fn(plane.width(), plane.height(), |x, y| {
        plane.get(x, y) < HALF_LUMINANCE
    });
    encode(&mono)
}

/// The header fields of an encoded bitmap, as read back from its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapHeader {
    pub file_size: u32,
    pub pixel_offset: u32,
    pub dib_header_size: u32,
    pub width: i32,
    pub height: i32,
    pub bits_per_pixel: u16,
    pub compression: u32,
    pub image_size: u32,
    pub colors_used: u32,
}

impl BitmapHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, BitmapError> {
        if bytes.len() < (FILE_HEADER_SIZE + DIB_HEADER_SIZE) as usize {
            return Err(BitmapError::Truncated { len: bytes.len() });
        }
        if bytes[0..2] != SIGNATURE {
            return Err(BitmapError::BadSignature([bytes[0], bytes[1]]));
        }

        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };

        Ok(Self {
            file_size: u32_at(2),
            pixel_offset: u32_at(10),
            dib_header_size: u32_at(14),
            width: u32_at(18) as i32,
            height: u32_at(22) as i32,
            bits_per_pixel: u16_at(28),
            compression: u32_at(30),
            image_size: u32_at(34),
            colors_used: u32_at(46),
        })
    }
}
