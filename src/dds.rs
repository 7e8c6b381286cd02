
//! Read and write DirectDraw Surface files, the interchange container
//! for block-compressed textures.
//!
//! Layout and flag values follow the Microsoft documentation:
//! <https://learn.microsoft.com/en-us/windows/win32/direct3ddds/dx-graphics-dds-pguide>

use crate::error::{Error, Result, UnitResult};
use crate::format::TextureFormat;
use crate::io::*;


/// Assemble a four-character code into its on-disk `u32`.
pub const fn make_four_cc(code: [u8; 4]) -> u32 {
    u32::from_le_bytes(code)
}

/// The first four bytes of every DDS file, `"DDS "`.
pub const FOUR_CC_DDS: u32 = make_four_cc(*b"DDS ");

/// The declared size of the header, after the four-character code.
pub const DDS_HEADER_SIZE: u32 = 124;

/// The declared size of the pixelformat sub-structure.
pub const DDS_PIXELFORMAT_SIZE: u32 = 32;


// Pixelformat flags, from ddraw.h.

pub const DDPF_ALPHAPIXELS: u32 = 0x1;
pub const DDPF_ALPHA: u32 = 0x2;
pub const DDPF_FOURCC: u32 = 0x4;
pub const DDPF_PALETTEINDEXED4: u32 = 0x8;
pub const DDPF_PALETTEINDEXEDTO8: u32 = 0x10;
pub const DDPF_PALETTEINDEXED8: u32 = 0x20;
pub const DDPF_RGB: u32 = 0x40;
pub const DDPF_RGBA: u32 = 0x41;
pub const DDPF_COMPRESSED: u32 = 0x80;
pub const DDPF_RGBTOYUV: u32 = 0x100;
pub const DDPF_YUV: u32 = 0x200;
pub const DDPF_ZBUFFER: u32 = 0x400;
pub const DDPF_PALETTEINDEXED1: u32 = 0x800;
pub const DDPF_PALETTEINDEXED2: u32 = 0x1000;
pub const DDPF_ZPIXELS: u32 = 0x2000;
pub const DDPF_STENCILBUFFER: u32 = 0x4000;
pub const DDPF_ALPHAPREMULT: u32 = 0x8000;
pub const DDPF_LUMINANCE: u32 = 0x20000;
pub const DDPF_BUMPLUMINANCE: u32 = 0x40000;
pub const DDPF_BUMPDUDV: u32 = 0x80000;

// Header flags, from ddraw.h.

pub const DDSD_CAPS: u32 = 0x1;
pub const DDSD_HEIGHT: u32 = 0x2;
pub const DDSD_WIDTH: u32 = 0x4;
pub const DDSD_PITCH: u32 = 0x8;
pub const DDSD_BACKBUFFERCOUNT: u32 = 0x20;
pub const DDSD_ZBUFFERBITDEPTH: u32 = 0x40;
pub const DDSD_ALPHABITDEPTH: u32 = 0x80;
pub const DDSD_LPSURFACE: u32 = 0x800;
pub const DDSD_PIXELFORMAT: u32 = 0x1000;
pub const DDSD_CKDESTOVERLAY: u32 = 0x2000;
pub const DDSD_CKDESTBLT: u32 = 0x4000;
pub const DDSD_CKSRCOVERLAY: u32 = 0x8000;
pub const DDSD_CKSRCBLT: u32 = 0x10000;
pub const DDSD_MIPMAPCOUNT: u32 = 0x20000;
pub const DDSD_REFRESHRATE: u32 = 0x40000;
pub const DDSD_LINEARSIZE: u32 = 0x80000;
pub const DDSD_TEXTURESTAGE: u32 = 0x100000;
pub const DDSD_FVF: u32 = 0x200000;
pub const DDSD_SRCVBHANDLE: u32 = 0x400000;
pub const DDSD_DEPTH: u32 = 0x800000;

/// The flags every valid DDS file carries:
/// caps, height, width and pixelformat.
pub const DDSD_REQUIRED: u32 = 0x1007;
pub const DDSD_ALL: u32 = 0xfff9ee;

// Caps flags, from ddraw.h.

pub const DDSCAPS_RESERVED1: u32 = 0x1;
pub const DDSCAPS_ALPHA: u32 = 0x2;
pub const DDSCAPS_BACKBUFFER: u32 = 0x4;
pub const DDSCAPS_COMPLEX: u32 = 0x8;
pub const DDSCAPS_FLIP: u32 = 0x10;
pub const DDSCAPS_FRONTBUFFER: u32 = 0x20;
pub const DDSCAPS_OFFSCREENPLAIN: u32 = 0x40;
pub const DDSCAPS_OVERLAY: u32 = 0x80;
pub const DDSCAPS_PALETTE: u32 = 0x100;
pub const DDSCAPS_PRIMARYSURFACE: u32 = 0x200;
pub const DDSCAPS_RESERVED3: u32 = 0x400;
pub const DDSCAPS_SYSTEMMEMORY: u32 = 0x800;
pub const DDSCAPS_TEXTURE: u32 = 0x1000;
pub const DDSCAPS_3DDEVICE: u32 = 0x2000;
pub const DDSCAPS_VIDEOMEMORY: u32 = 0x4000;
pub const DDSCAPS_VISIBLE: u32 = 0x8000;
pub const DDSCAPS_WRITEONLY: u32 = 0x10000;
pub const DDSCAPS_ZBUFFER: u32 = 0x20000;
pub const DDSCAPS_OWNDC: u32 = 0x40000;
pub const DDSCAPS_LIVEVIDEO: u32 = 0x80000;
pub const DDSCAPS_HWCODEC: u32 = 0x100000;
pub const DDSCAPS_MODEX: u32 = 0x200000;
pub const DDSCAPS_MIPMAP: u32 = 0x400000;
pub const DDSCAPS_RESERVED2: u32 = 0x800000;
pub const DDSCAPS_ALLOCONLOAD: u32 = 0x4000000;
pub const DDSCAPS_VIDEOPORT: u32 = 0x8000000;
pub const DDSCAPS_LOCALVIDMEM: u32 = 0x10000000;
pub const DDSCAPS_NONLOCALVIDMEM: u32 = 0x20000000;
pub const DDSCAPS_STANDARDVGAMODE: u32 = 0x40000000;
pub const DDSCAPS_OPTIMIZED: u32 = 0x80000000;

pub const DDSCAPS2_CUBEMAP: u32 = 0x200;
pub const DDSCAPS2_VOLUME: u32 = 0x200000;


/// The pixelformat sub-structure of a DDS header.
/// This is the sole place where the texture format of the payload is recorded.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct DdsPixelformat {

    /// Which of the following fields are meaningful (`DDPF_*` bits).
    pub flags: u32,

    /// Four-character code identifying a compressed format.
    /// Only meaningful when `flags` contains `DDPF_FOURCC`.
    pub four_cc: u32,

    /// Bits per pixel of an uncompressed format.
    pub rgb_bit_count: u32,

    /// Bit mask of the red channel within one pixel.
    pub r_bitmask: u32,

    /// Bit mask of the green channel within one pixel.
    pub g_bitmask: u32,

    /// Bit mask of the blue channel within one pixel.
    pub b_bitmask: u32,

    /// Bit mask of the alpha channel within one pixel.
    pub a_bitmask: u32,
}

impl DdsPixelformat {

    const fn new(flags: u32, four_cc: u32, rgb_bit_count: u32, r: u32, g: u32, b: u32, a: u32) -> Self {
        DdsPixelformat {
            flags, four_cc, rgb_bit_count,
            r_bitmask: r, g_bitmask: g, b_bitmask: b, a_bitmask: a,
        }
    }

    /// Read the sub-structure, validating the declared size sentinel.
    pub fn read(read: &mut impl Read) -> Result<Self> {
        let size = u32::read(read)?;
        if size != DDS_PIXELFORMAT_SIZE {
            return Err(Error::field("size", size))
        }

        Ok(DdsPixelformat {
            flags: u32::read(read)?,
            four_cc: u32::read(read)?,
            rgb_bit_count: u32::read(read)?,
            r_bitmask: u32::read(read)?,
            g_bitmask: u32::read(read)?,
            b_bitmask: u32::read(read)?,
            a_bitmask: u32::read(read)?,
        })
    }

    /// Write the sub-structure including the size sentinel.
    pub fn write(&self, write: &mut impl Write) -> UnitResult {
        DDS_PIXELFORMAT_SIZE.write(write)?;
        self.flags.write(write)?;
        self.four_cc.write(write)?;
        self.rgb_bit_count.write(write)?;
        self.r_bitmask.write(write)?;
        self.g_bitmask.write(write)?;
        self.b_bitmask.write(write)?;
        self.a_bitmask.write(write)?;
        Ok(())
    }
}


/// The pixelformats of all supported texture formats, in the order of the
/// `TextureFormat` values starting at 400.
const PIXELFORMATS: [DdsPixelformat; 11] = [
    // BC1
    DdsPixelformat::new(DDPF_FOURCC, make_four_cc(*b"DXT1"), 0, 0, 0, 0, 0),
    // BC2
    DdsPixelformat::new(DDPF_FOURCC, make_four_cc(*b"DXT3"), 0, 0, 0, 0, 0),
    // BC3
    DdsPixelformat::new(DDPF_FOURCC, make_four_cc(*b"DXT5"), 0, 0, 0, 0, 0),
    // R5G6B5
    DdsPixelformat::new(DDPF_RGB, 0, 16, 0xf800, 0x07e0, 0x001f, 0x0000),
    // A1R5G5B5
    DdsPixelformat::new(DDPF_RGBA, 0, 16, 0x7c00, 0x03e0, 0x001f, 0x8000),
    // A4R4G4B4
    DdsPixelformat::new(DDPF_RGBA, 0, 16, 0x0f00, 0x00f0, 0x000f, 0xf000),
    // R8G8B8
    DdsPixelformat::new(DDPF_RGB, 0, 24, 0xff0000, 0x00ff00, 0x0000ff, 0x000000),
    // A8R8G8B8
    DdsPixelformat::new(DDPF_RGBA, 0, 32, 0x00ff0000, 0x0000ff00, 0x000000ff, 0xff000000),
    // V8U8
    DdsPixelformat::new(DDPF_BUMPDUDV, 0, 16, 0x00ff, 0xff00, 0x0000, 0x0000),
    // CxV8U8
    DdsPixelformat::new(DDPF_FOURCC, 117, 16, 0x00ff, 0xff00, 0x0000, 0x0000),
    // A8
    DdsPixelformat::new(DDPF_ALPHA, 0, 8, 0x00, 0x00, 0x00, 0xff),
];


/// The pixelformat of a texture format.
/// Fails for `TextureFormat::None` and for formats beyond the table.
pub fn pixelformat(format: TextureFormat) -> Result<DdsPixelformat> {
    let value = u16::from(format) as usize;

    value.checked_sub(400)
        .and_then(|index| PIXELFORMATS.get(index))
        .copied()
        .ok_or_else(|| Error::field("format", u16::from(format)))
}

/// Scan the pixelformat table for a matching entry.
/// The flags must be equal; the four-character code is compared when the
/// `FOURCC` flag is set, bit count and RGB masks when the `RGB` flag is set,
/// and the alpha mask when `ALPHAPIXELS` is set.
/// Returns `TextureFormat::None` if no row matches.
pub fn detect_pixelformat(ddspf: &DdsPixelformat) -> TextureFormat {
    for (index, reference) in PIXELFORMATS.iter().enumerate() {
        if ddspf.flags != reference.flags { continue }

        if ddspf.flags & DDPF_FOURCC != 0 {
            if ddspf.four_cc != reference.four_cc { continue }
        }

        if ddspf.flags & DDPF_RGB != 0 {
            if ddspf.rgb_bit_count != reference.rgb_bit_count { continue }
            if ddspf.r_bitmask != reference.r_bitmask { continue }
            if ddspf.g_bitmask != reference.g_bitmask { continue }
            if ddspf.b_bitmask != reference.b_bitmask { continue }
        }

        if ddspf.flags & DDPF_ALPHAPIXELS != 0 {
            if ddspf.a_bitmask != reference.a_bitmask { continue }
        }

        return TextureFormat::try_from(400 + index as u16)
            .expect("pixelformat table larger than format enumeration")
    }

    TextureFormat::None
}


/// A complete DirectDraw Surface file:
/// the 124-byte header followed by the pixel payload.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DdsFile {

    /// Which header fields are meaningful (`DDSD_*` bits).
    pub flags: u32,

    /// Height of the base level in pixels.
    pub height: u32,

    /// Width of the base level in pixels.
    pub width: u32,

    /// Bytes per scan line of an uncompressed format, or the total byte
    /// size of the base level of a compressed format, depending on whether
    /// `flags` contains `DDSD_PITCH` or `DDSD_LINEARSIZE`.
    pub pitch_or_linear_size: u32,

    /// Depth of a volume texture. Zero for plain textures.
    pub depth: u32,

    /// Number of mip levels, including the base level.
    pub mipmap_count: u32,

    /// Unused words carried through verbatim.
    pub reserved1: [u32; 11],

    /// Describes the format of the pixel payload.
    pub pixelformat: DdsPixelformat,

    /// Surface capabilities (`DDSCAPS_*` bits).
    pub caps: u32,

    /// Additional capabilities (cube map faces, volume).
    pub caps2: u32,

    /// Unused capability word.
    pub caps3: u32,

    /// Unused capability word.
    pub caps4: u32,

    /// Unused word carried through verbatim.
    pub reserved2: u32,

    /// The pixel payload: all mip levels back to back.
    pub data: Vec<u8>,
}

impl Default for DdsFile {
    fn default() -> Self {
        DdsFile {
            flags: DDSD_REQUIRED,
            height: 0,
            width: 0,
            pitch_or_linear_size: 0,
            depth: 0,
            mipmap_count: 1,
            reserved1: [0; 11],
            pixelformat: DdsPixelformat::default(),
            caps: DDSCAPS_TEXTURE,
            caps2: 0,
            caps3: 0,
            caps4: 0,
            reserved2: 0,
            data: Vec::new(),
        }
    }
}

impl DdsFile {

    /// Parse a DDS file from the current cursor.
    /// Everything after the header is taken as the pixel payload.
    pub fn read(read: &mut impl Read) -> Result<Self> {
        let descriptor = u32::read(read)?;
        if descriptor != FOUR_CC_DDS {
            return Err(Error::field("descriptor", format!("{:x}", descriptor)))
        }

        let size = u32::read(read)?;
        if size != DDS_HEADER_SIZE {
            return Err(Error::field("size", size))
        }

        let flags = u32::read(read)?;
        let height = u32::read(read)?;
        let width = u32::read(read)?;
        let pitch_or_linear_size = u32::read(read)?;
        let depth = u32::read(read)?;
        let mipmap_count = u32::read(read)?;

        let mut reserved1 = [0_u32; 11];
        u32::read_slice(read, &mut reserved1)?;

        let pixelformat = DdsPixelformat::read(read)?;

        let caps = u32::read(read)?;
        let caps2 = u32::read(read)?;
        let caps3 = u32::read(read)?;
        let caps4 = u32::read(read)?;
        let reserved2 = u32::read(read)?;

        let mut data = Vec::new();
        read.read_to_end(&mut data)?;

        Ok(DdsFile {
            flags, height, width, pitch_or_linear_size, depth, mipmap_count,
            reserved1, pixelformat, caps, caps2, caps3, caps4, reserved2, data,
        })
    }

    /// Write the header and the pixel payload.
    pub fn write(&self, write: &mut impl Write) -> UnitResult {
        FOUR_CC_DDS.write(write)?;
        DDS_HEADER_SIZE.write(write)?;
        self.flags.write(write)?;
        self.height.write(write)?;
        self.width.write(write)?;
        self.pitch_or_linear_size.write(write)?;
        self.depth.write(write)?;
        self.mipmap_count.write(write)?;
        u32::write_slice(write, &self.reserved1)?;
        self.pixelformat.write(write)?;
        self.caps.write(write)?;
        self.caps2.write(write)?;
        self.caps3.write(write)?;
        self.caps4.write(write)?;
        self.reserved2.write(write)?;

        u8::write_slice(write, &self.data)?;
        Ok(())
    }
}
