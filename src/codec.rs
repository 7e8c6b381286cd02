
//! Boundary to the external block-compression codecs.
//! Encoding and decoding of the 4x4 texel blocks is delegated to
//! `image_dds`; this module only translates between the crate's
//! texture formats and pixel types and the codec surfaces.

use image_dds::{ImageFormat, Mipmaps, Quality, Surface, SurfaceRgba8};
use crate::color::LdrColor;
use crate::error::{Error, Result};
use crate::format::TextureFormat;


/// The number of bytes of one encoded 4x4 block,
/// or `None` if the format is not block-compressed.
pub fn block_size(format: TextureFormat) -> Option<usize> {
    match format {
        TextureFormat::PcBc1 | TextureFormat::PcBc4 => Some(8),

        TextureFormat::PcBc2 | TextureFormat::PcBc3
        | TextureFormat::PcBc5 | TextureFormat::PcBc6hu
        | TextureFormat::PcBc6hs | TextureFormat::PcBc7 => Some(16),

        _ => None,
    }
}

/// The codec format for a block-compressed texture format.
fn codec_format(format: TextureFormat) -> Result<ImageFormat> {
    match format {
        TextureFormat::PcBc1 => Ok(ImageFormat::BC1RgbaUnorm),
        TextureFormat::PcBc2 => Ok(ImageFormat::BC2RgbaUnorm),
        TextureFormat::PcBc3 => Ok(ImageFormat::BC3RgbaUnorm),
        TextureFormat::PcBc4 => Ok(ImageFormat::BC4RUnorm),
        TextureFormat::PcBc5 => Ok(ImageFormat::BC5RgUnorm),
        TextureFormat::PcBc6hu => Ok(ImageFormat::BC6hRgbUfloat),
        TextureFormat::PcBc6hs => Ok(ImageFormat::BC6hRgbSfloat),
        TextureFormat::PcBc7 => Ok(ImageFormat::BC7RgbaUnorm),
        _ => Err(Error::invalid("unknown texture format")),
    }
}

/// The byte size of the base mip level of a block-compressed texture.
/// Dimensions are rounded up to whole 4x4 blocks, with at least one block.
pub fn base_level_size(width: usize, height: usize, block_size: usize) -> usize {
    let width_blocks = 1_usize.max((width + 3) / 4);
    let height_blocks = 1_usize.max((height + 3) / 4);
    width_blocks * height_blocks * block_size
}

/// Decode the base mip level of the block data into 8-bit RGBA pixels
/// with top-left origin. Fails for formats outside the BC1..BC7 set.
pub fn decode(format: TextureFormat, width: usize, height: usize, data: &[u8])
    -> Result<Vec<LdrColor>>
{
    let image_format = codec_format(format)?;
    let base_size = base_level_size(width, height, block_size(format).expect("codec format without block size"));

    if data.len() < base_size {
        return Err(Error::invalid("texture data shorter than declared dimensions"))
    }

    let surface = Surface {
        width: width as u32,
        height: height as u32,
        depth: 1,
        layers: 1,
        mipmaps: 1,
        image_format,
        data: &data[..base_size],
    };

    let decoded = surface.decode_rgba8()
        .map_err(|_| Error::invalid("block compressed texture data"))?;

    let pixels = decoded.data
        .chunks_exact(4)
        .map(|channels| LdrColor::new(channels[0], channels[1], channels[2], channels[3]))
        .collect();

    Ok(pixels)
}

/// Encode 8-bit RGBA pixels with top-left origin into block data.
/// Fails for formats outside the BC1..BC7 set.
pub fn encode(format: TextureFormat, width: usize, height: usize, pixels: &[LdrColor])
    -> Result<Vec<u8>>
{
    let image_format = codec_format(format)?;

    if pixels.len() != width * height {
        return Err(Error::invalid("number of pixels does not match image dimensions"))
    }

    let mut bytes = Vec::new();
    bytes.try_reserve_exact(pixels.len() * 4)?;
    for pixel in pixels {
        bytes.extend_from_slice(&[pixel.r, pixel.g, pixel.b, pixel.a]);
    }

    let surface = SurfaceRgba8 {
        width: width as u32,
        height: height as u32,
        depth: 1,
        layers: 1,
        mipmaps: 1,
        data: bytes,
    };

    let encoded = surface.encode(image_format, Quality::Normal, Mipmaps::Disabled)
        .map_err(|_| Error::invalid("pixels cannot be block compressed"))?;

    Ok(encoded.data)
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn base_level_sizes() {
        assert_eq!(base_level_size(4, 4, 8), 8);
        assert_eq!(base_level_size(4, 4, 16), 16);
        assert_eq!(base_level_size(5, 4, 8), 16);
        assert_eq!(base_level_size(1, 1, 8), 8);
        assert_eq!(base_level_size(16, 8, 16), 128);
    }

    #[test]
    fn rejects_plain_formats() {
        assert!(matches!(
            decode(TextureFormat::Pc8888, 4, 4, &[0; 64]),
            Err(Error::Invalid(_))
        ));

        assert!(matches!(
            encode(TextureFormat::Pc565, 4, 4, &[LdrColor::default(); 16]),
            Err(Error::Invalid(_))
        ));
    }

    #[test]
    fn bc1_round_trips_flat_color() {
        let pixels = vec![LdrColor::new(255, 0, 0, 255); 16];
        let blocks = encode(TextureFormat::PcBc1, 4, 4, &pixels).unwrap();
        assert_eq!(blocks.len(), 8);

        let decoded = decode(TextureFormat::PcBc1, 4, 4, &blocks).unwrap();
        assert_eq!(decoded.len(), 16);

        for pixel in decoded {
            assert!(pixel.r > 240 && pixel.g < 16 && pixel.b < 16);
            assert_eq!(pixel.a, 255);
        }
    }
}
