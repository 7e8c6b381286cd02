
//! Read and write Truevision TARGA images, the lossless
//! interchange container for decoded textures.
//! Supports uncompressed 24 and 32 bit RGB images, and reading
//! of the run-length encoded variant.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use crate::color::LdrColor;
use crate::error::{Error, Result, UnitResult};
use crate::io::*;


/// Low nibble of `image_attributes`: number of alpha bits per pixel.
pub const PIXEL_ATTRIB_BITS: u8 = 0x0f;

/// Bit 5 of `image_attributes`: set means top-left origin,
/// clear means bottom-left origin.
pub const SCREEN_ORIGIN: u8 = 1 << 5;

/// The `image_attributes` value of a top-left origin image.
pub const ORIGIN_TOP: u8 = 1 << 5;

/// The `image_attributes` value of a bottom-left origin image.
pub const ORIGIN_BOTTOM: u8 = 0;


/// The image type byte of a TGA header.
#[derive(Debug, Clone, Copy, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum TgaImageType {

    /// No image data present.
    None = 0,

    /// Palette-indexed pixels. Not supported.
    Indexed = 1,

    /// Plain RGB pixels.
    Rgb = 2,

    /// Grayscale pixels. Not supported.
    Grayscale = 3,

    /// Run-length encoded palette-indexed pixels. Not supported.
    IndexedRle = 9,

    /// Run-length encoded RGB pixels. Supported for reading only.
    RgbRle = 10,

    /// Run-length encoded grayscale pixels. Not supported.
    GrayscaleRle = 11,
}


/// Decode one run-length encoded pixel section into raw bytes.
/// Each section starts with a control byte: the high bit marks a run, the
/// low seven bits plus one give the length in pixels. Decoding continues
/// until `size` bytes are available; any oversupply of the final section
/// is truncated.
pub fn read_rle(read: &mut impl Read, size: usize, bytes_per_pixel: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    data.try_reserve_exact(size)?;

    while data.len() < size {
        let control = u8::read(read)?;
        let run = control & (1 << 7) != 0;
        let length = (control & 0x7f) as usize + 1;

        if run {
            let mut pixel = [0_u8; 4];
            let pixel = &mut pixel[..bytes_per_pixel];
            u8::read_slice(read, pixel)?;

            for _ in 0..length {
                data.extend_from_slice(pixel);
            }
        }
        else {
            let literal = u8::read_vec(read, length * bytes_per_pixel, 128 * 4)?;
            data.extend_from_slice(&literal);
        }
    }

    data.truncate(size);
    Ok(data)
}


/// A Truevision TARGA image.
/// The pixels are always stored with top-left origin in memory, regardless
/// of the on-disk origin bit; the retained `image_attributes` re-applies
/// the original orientation when the image is written back.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TgaFile {

    /// Color map type byte. Zero, as color maps are not supported.
    pub colormap_type: u8,

    /// How the pixel section is encoded.
    pub data_type: TgaImageType,

    /// Index of the first color map entry. Unused.
    pub colormap_offset: u16,

    /// Number of color map entries. Unused.
    pub colormap_length: u16,

    /// Bits per color map entry. Unused.
    pub colormap_entry_size: u8,

    /// Horizontal position of the image on the screen.
    pub origin_x: u16,

    /// Vertical position of the image on the screen.
    pub origin_y: u16,

    /// Width of the image in pixels.
    pub width: u16,

    /// Height of the image in pixels.
    pub height: u16,

    /// Bits per pixel, 24 or 32.
    pub bits_per_pixel: u8,

    /// Alpha depth in the low nibble, screen origin in bit 5.
    pub image_attributes: u8,

    /// Free-form identification bytes after the header.
    pub image_id: Vec<u8>,

    /// Pixels in top-left origin scan order.
    pub pixels: Vec<LdrColor>,
}

impl Default for TgaFile {
    fn default() -> Self {
        TgaFile {
            colormap_type: 0,
            data_type: TgaImageType::Rgb,
            colormap_offset: 0,
            colormap_length: 0,
            colormap_entry_size: 0,
            origin_x: 0,
            origin_y: 0,
            width: 0,
            height: 0,
            bits_per_pixel: 32,
            image_attributes: ORIGIN_TOP | 8, // 8-bit alpha
            image_id: Vec::new(),
            pixels: Vec::new(),
        }
    }
}

impl TgaFile {

    /// Parse a TGA image from the current cursor.
    pub fn read(read: &mut impl Read) -> Result<Self> {
        let id_length = u8::read(read)?;
        let colormap_type = u8::read(read)?;

        let data_type_value = u8::read(read)?;
        let data_type = TgaImageType::try_from(data_type_value)
            .map_err(|_| Error::invalid("unknown image type"))?;

        let colormap_offset = u16::read(read)?;
        let colormap_length = u16::read(read)?;
        let colormap_entry_size = u8::read(read)?;
        let origin_x = u16::read(read)?;
        let origin_y = u16::read(read)?;
        let width = u16::read(read)?;
        let height = u16::read(read)?;
        let bits_per_pixel = u8::read(read)?;
        let image_attributes = u8::read(read)?;

        let image_id = u8::read_vec(read, id_length as usize, 255)?;

        check_data_type(data_type)?;
        check_bits_per_pixel(bits_per_pixel)?;

        let bytes_per_pixel = bits_per_pixel as usize / 8;
        let num_pixels = width as usize * height as usize;
        let num_bytes = num_pixels * bytes_per_pixel;

        let image_data = if data_type == TgaImageType::RgbRle {
            read_rle(read, num_bytes, bytes_per_pixel)?
        }
        else {
            // largest sensible image: 8192 x 8192 at 32 bits
            u8::read_vec(read, num_bytes, 1 << 28)?
        };

        // pixel channel order on disk is BGR(A)
        let mut pixels = Vec::new();
        pixels.try_reserve_exact(num_pixels)?;

        for channels in image_data.chunks_exact(bytes_per_pixel) {
            let alpha =
                if bytes_per_pixel == 4 && image_attributes & PIXEL_ATTRIB_BITS != 0 { channels[3] }
                else { 0xff };

            pixels.push(LdrColor::new(channels[2], channels[1], channels[0], alpha));
        }

        if image_attributes & SCREEN_ORIGIN == ORIGIN_BOTTOM {
            swap_row_order(&mut pixels, width as usize, height as usize);
        }

        Ok(TgaFile {
            colormap_type, data_type,
            colormap_offset, colormap_length, colormap_entry_size,
            origin_x, origin_y, width, height,
            bits_per_pixel, image_attributes,
            image_id, pixels,
        })
    }

    /// Write the image with the orientation recorded in `image_attributes`.
    /// Run-length encoded output is not supported.
    pub fn write(&self, write: &mut impl Write) -> UnitResult {
        check_data_type(self.data_type)?;
        check_bits_per_pixel(self.bits_per_pixel)?;

        if self.data_type == TgaImageType::RgbRle {
            return Err(Error::invalid("run-length encoding is not supported when writing"))
        }

        if self.pixels.len() != self.width as usize * self.height as usize {
            return Err(Error::invalid("number of pixels does not match image dimensions"))
        }

        (self.image_id.len() as u8).write(write)?;
        self.colormap_type.write(write)?;
        u8::from(self.data_type).write(write)?;
        self.colormap_offset.write(write)?;
        self.colormap_length.write(write)?;
        self.colormap_entry_size.write(write)?;
        self.origin_x.write(write)?;
        self.origin_y.write(write)?;
        self.width.write(write)?;
        self.height.write(write)?;
        self.bits_per_pixel.write(write)?;
        self.image_attributes.write(write)?;
        u8::write_slice(write, &self.image_id)?;

        let mut pixels = self.pixels.clone();
        if self.image_attributes & SCREEN_ORIGIN == ORIGIN_BOTTOM {
            swap_row_order(&mut pixels, self.width as usize, self.height as usize);
        }

        for pixel in &pixels {
            pixel.b.write(write)?;
            pixel.g.write(write)?;
            pixel.r.write(write)?;

            if self.bits_per_pixel == 32 {
                pixel.a.write(write)?;
            }
        }

        Ok(())
    }
}

/// Only plain and run-length encoded RGB images are supported.
fn check_data_type(data_type: TgaImageType) -> UnitResult {
    match data_type {
        TgaImageType::None
        | TgaImageType::Rgb
        | TgaImageType::RgbRle => Ok(()),

        TgaImageType::Grayscale
        | TgaImageType::GrayscaleRle =>
            Err(Error::invalid("grayscale images are not supported")),

        TgaImageType::Indexed
        | TgaImageType::IndexedRle =>
            Err(Error::invalid("indexed images are not supported")),
    }
}

fn check_bits_per_pixel(bits_per_pixel: u8) -> UnitResult {
    if bits_per_pixel != 24 && bits_per_pixel != 32 {
        return Err(Error::invalid("only 24 and 32 bit images are supported"))
    }

    Ok(())
}

/// Mirror the scan lines vertically, in place.
fn swap_row_order(pixels: &mut [LdrColor], width: usize, height: usize) {
    for top_row in 0..height / 2 {
        let bottom_row = height - 1 - top_row;

        for x in 0..width {
            pixels.swap(top_row * width + x, bottom_row * width + x);
        }
    }
}
