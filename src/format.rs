
//! The texture format enumeration and the per-bitmap flag bits
//! shared by peg bundles and the DDS translation layer.

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};


/// The texture formats used by the PC titles.
/// Stored on disk as a `u16`. The PC formats start at 400 so that
/// `value - 400` indexes the DDS pixelformat table.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum TextureFormat {

    /// No format recorded. Never written by the engine.
    None = 0,

    /// BC1 block compression, 8 bytes per 4x4 block (`DXT1`).
    PcBc1 = 400,

    /// BC2 block compression, 16 bytes per 4x4 block (`DXT3`).
    PcBc2 = 401,

    /// BC3 block compression, 16 bytes per 4x4 block (`DXT5`).
    PcBc3 = 402,

    /// Uncompressed 16-bit, 5-6-5 bits per channel.
    Pc565 = 403,

    /// Uncompressed 16-bit, 5-5-5 bits per channel plus 1 alpha bit.
    Pc1555 = 404,

    /// Uncompressed 16-bit, 4 bits per channel.
    Pc4444 = 405,

    /// Uncompressed 24-bit RGB.
    Pc888 = 406,

    /// Uncompressed 32-bit RGBA.
    Pc8888 = 407,

    /// 16-bit signed du/dv bump map (`V8U8`).
    Pc16Dudv = 408,

    /// 16-bit compressed dot3 bump map (`CxV8U8`).
    Pc16Dot3Compressed = 409,

    /// 8-bit alpha only.
    PcA8 = 410,

    /// BC6H block compression, unsigned half floats.
    PcBc6hu = 411,

    /// BC6H block compression, signed half floats.
    PcBc6hs = 412,

    /// BC7 block compression.
    PcBc7 = 413,

    /// BC4 single-channel block compression.
    PcBc4 = 414,

    /// BC5 two-channel block compression.
    PcBc5 = 415,

    /// Uncompressed 64-bit, 16 bits per channel.
    Pc16161616 = 416,

    /// Uncompressed 128-bit, 32 bits per channel.
    Pc32323232 = 417,
}


bitflags! {

    /// The per-bitmap flag bits of a peg entry.
    /// Several of these are runtime-only and appear in shipped files
    /// because the tools serialised them anyway.
    #[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
    pub struct EntryFlags: u16 {

        /// The bitmap has an alpha channel.
        const ALPHA = 0x1;

        /// The bitmap dimensions are not powers of two.
        const NONPOW2 = 0x2;

        /// Alpha is used as an on/off test rather than blending.
        const ALPHA_TEST = 0x4;

        /// The bitmap is a cube map.
        const CUBE_MAP = 0x8;

        /// The bitmap contains interleaved mips, stored inside the next bitmap.
        const INTERLEAVED_MIPS = 0x10;

        /// The bitmap contains interleaved mips from the previous bitmap.
        const INTERLEAVED_DATA = 0x20;

        /// Used by the peg assembler only.
        const DEBUG_DATA_COPIED = 0x40;

        /// The bitmap was loaded dynamically, not from a peg. Runtime only.
        const DYNAMIC = 0x80;

        /// Animation frames are stored in one bitmap, spaced left to right.
        const ANIM_SHEET = 0x100;

        /// The bitmap is stored linear rather than sRGB.
        const LINEAR_COLOR_SPACE = 0x200;

        /// The bitmap is a separately streamed high mip.
        const HIGH_MIP = 0x400;

        /// The bitmap may link up with a high mip. Runtime only.
        const HIGH_MIP_ELIGIBLE = 0x800;

        /// The bitmap is currently linked to a high mip. Runtime only.
        const LINKED_TO_HIGH_MIP = 0x1000;

        /// The texture memory is permanently owned by the graphics api.
        const PERM_REGISTERED = 0x2000;
    }
}


const FORMAT_NAMES: &[(TextureFormat, &str)] = &[
    (TextureFormat::PcBc1, "BC1"),
    (TextureFormat::PcBc2, "BC2"),
    (TextureFormat::PcBc3, "BC3"),
    (TextureFormat::Pc565, "RGB565"),
    (TextureFormat::Pc1555, "RGBA5551"),
    (TextureFormat::Pc4444, "RGBA4444"),
    (TextureFormat::Pc888, "RGB888"),
    (TextureFormat::Pc8888, "RGB8888"),
    (TextureFormat::Pc16Dudv, "V8U8"),
    (TextureFormat::Pc16Dot3Compressed, "CxV8U8"),
    (TextureFormat::PcA8, "A8"),
    (TextureFormat::PcBc6hu, "BC6HU"),
    (TextureFormat::PcBc6hs, "BC6HS"),
    (TextureFormat::PcBc7, "BC7"),
    (TextureFormat::PcBc4, "BC4"),
    (TextureFormat::PcBc5, "BC5"),
    (TextureFormat::Pc16161616, "RGBA16161616"),
    (TextureFormat::Pc32323232, "RGBA32323232"),
];

const ENTRY_FLAG_NAMES: &[(EntryFlags, &str)] = &[
    (EntryFlags::ALPHA, "ALPHA"),
    (EntryFlags::NONPOW2, "NONPOW2"),
    (EntryFlags::ALPHA_TEST, "ALPHA_TEST"),
    (EntryFlags::CUBE_MAP, "CUBE_MAP"),
    (EntryFlags::INTERLEAVED_MIPS, "INTERLEAVED_MIPS"),
    (EntryFlags::INTERLEAVED_DATA, "INTERLEAVED_DATA"),
    (EntryFlags::DEBUG_DATA_COPIED, "DEBUG_DATA_COPIED"),
    (EntryFlags::DYNAMIC, "DYNAMIC"),
    (EntryFlags::ANIM_SHEET, "ANIM_SHEET"),
    (EntryFlags::LINEAR_COLOR_SPACE, "LINEAR_COLOR_SPACE"),
    (EntryFlags::HIGH_MIP, "HIGH_MIP"),
    (EntryFlags::HIGH_MIP_ELIGIBLE, "HIGH_MIP_ELIGIBLE"),
    (EntryFlags::LINKED_TO_HIGH_MIP, "LINKED_TO_HIGH_MIP"),
    (EntryFlags::PERM_REGISTERED, "PERM_REGISTERED"),
];


/// The conventional name of the texture format, as used by the tools.
pub fn format_name(format: TextureFormat) -> &'static str {
    FORMAT_NAMES.iter()
        .find(|(candidate, _)| *candidate == format)
        .map(|(_, name)| *name)
        .unwrap_or("NONE")
}

/// Look up a texture format by its conventional name, ignoring case.
/// Returns `TextureFormat::None` for unknown names.
pub fn format_id(name: &str) -> TextureFormat {
    FORMAT_NAMES.iter()
        .find(|(_, candidate)| candidate.eq_ignore_ascii_case(name))
        .map(|(format, _)| *format)
        .unwrap_or(TextureFormat::None)
}

/// The names of all documented flag bits set in `flags`, lowest bit first.
pub fn entry_flag_names(flags: EntryFlags) -> Vec<&'static str> {
    ENTRY_FLAG_NAMES.iter()
        .filter(|(bit, _)| flags.contains(*bit))
        .map(|(_, name)| *name)
        .collect()
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn format_values() {
        assert_eq!(u16::from(TextureFormat::PcBc1), 400);
        assert_eq!(u16::from(TextureFormat::Pc32323232), 417);
        assert_eq!(TextureFormat::try_from(413_u16).unwrap(), TextureFormat::PcBc7);
        assert!(TextureFormat::try_from(399_u16).is_err());
    }

    #[test]
    fn format_names_round_trip() {
        for (format, name) in FORMAT_NAMES {
            assert_eq!(format_id(name), *format);
            assert_eq!(format_name(*format), *name);
        }

        assert_eq!(format_id("bc1"), TextureFormat::PcBc1);
        assert_eq!(format_id("definitely not a format"), TextureFormat::None);
    }

    #[test]
    fn flag_names() {
        let flags = EntryFlags::ALPHA | EntryFlags::CUBE_MAP;
        assert_eq!(entry_flag_names(flags), vec!["ALPHA", "CUBE_MAP"]);
    }
}
