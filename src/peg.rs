
//! Read and write peg texture bundles: a header/data pair describing
//! a set of GPU textures. Two on-disk versions are supported, 13 and 19.
//! The header file holds the directory; the pixel payloads live in a
//! separate data stream.

use crate::codec;
use crate::color::HdrColor;
use crate::dds::{self, make_four_cc, DdsFile};
use crate::error::{Error, Result, UnitResult};
use crate::format::{EntryFlags, TextureFormat};
use crate::io::*;
use crate::tga::{TgaFile, TgaImageType, ORIGIN_TOP};


/// The first four bytes of every peg header, `"GEKV"`.
pub const PEG_SIGNATURE: u32 = make_four_cc(*b"GEKV");

/// Byte size of the fixed header fields.
const PEG_HEADER_SIZE: u64 = 24;

/// The declared per-entry record size, used for the header size field.
const PEG_ENTRY_RECORD_SIZE: u64 = 72;

/// Longest accepted bitmap name, as a corruption guard.
const MAX_NAME_LEN: usize = 4096;


/// One texture of a peg bundle: its dimensions, format, flags,
/// mip count, and the pixel payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PegEntry {

    /// Name of the bitmap, usually with a `.tga` suffix.
    pub filename: Text,

    /// Byte offset of the payload within the data stream.
    pub offset: i64,

    /// Width of the base level in pixels.
    pub width: u16,

    /// Height of the base level in pixels.
    pub height: u16,

    /// Format of the pixel payload.
    pub bm_fmt: TextureFormat,

    /// Palette format. Not used by the engine, always 0.
    pub pal_fmt: u16,

    /// Horizontal tile count of an animation sheet.
    pub anim_tiles_width: u16,

    /// Vertical tile count of an animation sheet.
    pub anim_tiles_height: u16,

    /// Number of animation frames. Not used by the engine, always 1.
    /// Version 13 only.
    pub num_frames: u16,

    /// Depth of a volume texture. Version 19 only.
    pub depth: u16,

    /// Per-bitmap flags.
    pub flags: EntryFlags,

    /// Palette size. Not used by the engine, always 0.
    pub pal_size: u16,

    /// Animation playback rate. Not used by the engine, always 1.
    pub fps: u8,

    /// Number of mip levels, including the base level.
    pub mip_levels: u8,

    /// Byte size of the payload.
    pub data_size: u32,

    /// Average color of the base level, components in `[0, 1]`.
    /// Version 19 only.
    pub avg_color: HdrColor,

    /// Number of mips stored in a separately streamed bitmap. Version 19 only.
    pub num_mips_split: u32,

    /// Largest payload size across the split mips. Version 19 only.
    pub data_max_size: u32,

    /// The pixel payload: all mip levels back to back.
    pub data: Vec<u8>,
}

impl Default for PegEntry {
    fn default() -> Self {
        PegEntry {
            filename: Text::default(),
            offset: 0,
            width: 0,
            height: 0,
            bm_fmt: TextureFormat::None,
            pal_fmt: 0,
            anim_tiles_width: 1,
            anim_tiles_height: 1,
            num_frames: 1,
            depth: 1,
            flags: EntryFlags::empty(),
            pal_size: 0,
            fps: 1,
            mip_levels: 1,
            data_size: 0,
            avg_color: HdrColor::default(),
            num_mips_split: 0,
            data_max_size: 0,
            data: Vec::new(),
        }
    }
}

impl PegEntry {

    /// Parse the v13 record from the current cursor.
    fn read_v13(read: &mut impl Read) -> Result<Self> {
        let mut entry = PegEntry {
            offset: i64::read(read)?,
            width: u16::read(read)?,
            height: u16::read(read)?,
            bm_fmt: read_format(read)?,
            pal_fmt: u16::read(read)?,
            anim_tiles_width: u16::read(read)?,
            anim_tiles_height: u16::read(read)?,
            num_frames: u16::read(read)?,
            flags: EntryFlags::from_bits_retain(u16::read(read)?),
            ..Self::default()
        };

        skip_bytes(read, 8)?; // runtime variable
        entry.pal_size = u16::read(read)?;
        entry.fps = u8::read(read)?;
        entry.mip_levels = u8::read(read)?;
        entry.data_size = u32::read(read)?;
        skip_bytes(read, 32)?; // runtime variables and padding

        Ok(entry)
    }

    /// Parse the v19 record from the current cursor.
    fn read_v19(read: &mut impl Read) -> Result<Self> {
        let mut entry = PegEntry {
            offset: i64::read(read)?,
            width: u16::read(read)?,
            height: u16::read(read)?,
            bm_fmt: read_format(read)?,
            pal_fmt: u16::read(read)?,
            anim_tiles_width: u16::read(read)?,
            anim_tiles_height: u16::read(read)?,
            depth: u16::read(read)?,
            flags: EntryFlags::from_bits_retain(u16::read(read)?),
            avg_color: HdrColor::new(
                f32::read(read)?,
                f32::read(read)?,
                f32::read(read)?,
                f32::read(read)?,
            ),
            ..Self::default()
        };

        skip_bytes(read, 8)?; // runtime filename pointer
        entry.pal_size = u16::read(read)?;
        entry.fps = u8::read(read)?;
        entry.mip_levels = u8::read(read)?;
        entry.data_size = u32::read(read)?;
        skip_bytes(read, 32)?; // runtime variables
        entry.num_mips_split = u32::read(read)?;
        entry.data_max_size = u32::read(read)?;
        skip_bytes(read, 8)?; // padding

        Ok(entry)
    }

    /// Write the v13 record, with the recomputed payload offset.
    fn write_v13(&self, write: &mut impl Write, data_offset: i64) -> UnitResult {
        data_offset.write(write)?;
        self.width.write(write)?;
        self.height.write(write)?;
        u16::from(self.bm_fmt).write(write)?;
        self.pal_fmt.write(write)?;
        self.anim_tiles_width.write(write)?;
        self.anim_tiles_height.write(write)?;
        self.num_frames.write(write)?;
        self.flags.bits().write(write)?;
        pad_bytes(write, 8)?;
        self.pal_size.write(write)?;
        self.fps.write(write)?;
        self.mip_levels.write(write)?;
        (self.data.len() as u32).write(write)?;
        pad_bytes(write, 32)?;
        Ok(())
    }

    /// Write the v19 record, with the recomputed payload offset.
    fn write_v19(&self, write: &mut impl Write, data_offset: i64) -> UnitResult {
        data_offset.write(write)?;
        self.width.write(write)?;
        self.height.write(write)?;
        u16::from(self.bm_fmt).write(write)?;
        self.pal_fmt.write(write)?;
        self.anim_tiles_width.write(write)?;
        self.anim_tiles_height.write(write)?;
        self.depth.write(write)?;
        self.flags.bits().write(write)?;
        self.avg_color.r.write(write)?;
        self.avg_color.g.write(write)?;
        self.avg_color.b.write(write)?;
        self.avg_color.a.write(write)?;
        pad_bytes(write, 8)?;
        self.pal_size.write(write)?;
        self.fps.write(write)?;
        self.mip_levels.write(write)?;
        (self.data.len() as u32).write(write)?;
        pad_bytes(write, 32)?;
        self.num_mips_split.write(write)?;
        self.data_max_size.write(write)?;
        pad_bytes(write, 8)?;
        Ok(())
    }

    /// Create an entry from a parsed DDS file: dimensions, format and the
    /// payload are adopted; an unknown pixelformat becomes `TextureFormat::None`.
    pub fn from_dds(dds: &DdsFile) -> Self {
        PegEntry {
            width: dds.width as u16,
            height: dds.height as u16,
            bm_fmt: dds::detect_pixelformat(&dds.pixelformat),
            mip_levels: dds.mipmap_count.max(1) as u8,
            data_size: dds.data.len() as u32,
            data: dds.data.clone(),
            ..Self::default()
        }
    }

    /// Convert this entry into a DDS file.
    /// Fails with a field error for formats without a pixelformat row.
    pub fn to_dds(&self) -> Result<DdsFile> {
        let mut dds = DdsFile {
            height: self.height as u32,
            width: self.width as u32,
            ..DdsFile::default()
        };

        if self.mip_levels > 1 {
            dds.flags |= dds::DDSD_MIPMAPCOUNT;
            dds.mipmap_count = self.mip_levels as u32;
            dds.caps |= dds::DDSCAPS_COMPLEX | dds::DDSCAPS_MIPMAP;
        }

        dds.pixelformat = dds::pixelformat(self.bm_fmt)?;

        match self.bm_fmt {
            TextureFormat::PcBc1 => {
                dds.flags |= dds::DDSD_LINEARSIZE;
                dds.pitch_or_linear_size =
                    codec::base_level_size(self.width as usize, self.height as usize, 8) as u32;
            },

            TextureFormat::PcBc2 | TextureFormat::PcBc3 => {
                dds.flags |= dds::DDSD_LINEARSIZE;
                dds.pitch_or_linear_size =
                    codec::base_level_size(self.width as usize, self.height as usize, 16) as u32;
            },

            _ => {
                if dds.pixelformat.rgb_bit_count > 0 {
                    dds.flags |= dds::DDSD_PITCH;
                    dds.pitch_or_linear_size =
                        (self.width as u32 * dds.pixelformat.rgb_bit_count + 7) / 8;
                }
                else {
                    return Err(Error::field("format", u16::from(self.bm_fmt)))
                }
            },
        }

        dds.data = self.data.clone();
        Ok(dds)
    }

    /// Create an entry by block-compressing the pixels of a TGA image.
    /// Computes the average color and the alpha flag from the pixels.
    /// Fails for formats outside the BC1..BC7 set.
    pub fn from_tga(tga: &TgaFile, format: TextureFormat) -> Result<Self> {
        let data = codec::encode(format, tga.width as usize, tga.height as usize, &tga.pixels)?;

        let mut entry = PegEntry {
            width: tga.width,
            height: tga.height,
            bm_fmt: format,
            data_size: data.len() as u32,
            data,
            ..Self::default()
        };

        let mut sum = HdrColor::default();
        let mut has_alpha = false;
        for pixel in &tga.pixels {
            if pixel.a < 0xff {
                has_alpha = true;
            }

            sum.r += pixel.r as f32;
            sum.g += pixel.g as f32;
            sum.b += pixel.b as f32;
            sum.a += pixel.a as f32;
        }

        // mean per channel, scaled into [0, 1]
        if !tga.pixels.is_empty() {
            let average_factor = 1.0 / (tga.pixels.len() as f32 * 255.0);
            entry.avg_color = HdrColor::new(
                sum.r * average_factor,
                sum.g * average_factor,
                sum.b * average_factor,
                sum.a * average_factor,
            ).clamp(0.0, 1.0);
        }

        if has_alpha {
            entry.flags |= EntryFlags::ALPHA;
        }
        else {
            entry.flags -= EntryFlags::ALPHA;
            entry.avg_color.a = 1.0;
        }

        Ok(entry)
    }

    /// Decode the base level of this entry into a 32-bit TGA image
    /// with top-left origin. Fails for formats outside the BC1..BC7 set.
    pub fn to_tga(&self) -> Result<TgaFile> {
        Ok(TgaFile {
            width: self.width,
            height: self.height,
            pixels: codec::decode(self.bm_fmt, self.width as usize, self.height as usize, &self.data)?,
            data_type: TgaImageType::Rgb,
            bits_per_pixel: 32,
            image_attributes: ORIGIN_TOP | 8,
            ..TgaFile::default()
        })
    }
}

/// The on-disk format field must be a known texture format.
fn read_format(read: &mut impl Read) -> Result<TextureFormat> {
    let value = u16::read(read)?;
    TextureFormat::try_from(value).map_err(|_| Error::field("bm_fmt", value))
}


/// A peg texture bundle: the directory of bitmaps from the header stream,
/// with the pixel payloads read from the separate data stream.
#[derive(Debug, Clone, PartialEq)]
pub struct PegFile {

    /// On-disk version: 13 or 19.
    pub version: i16,

    /// Target platform. 0 is the PC.
    pub platform: i16,

    /// Declared byte size of the header file.
    pub header_size: u32,

    /// Declared byte size of the data file.
    pub data_size: u32,

    /// Bundle-wide flags. Always 0 in observed content.
    pub flags: u16,

    /// Payload alignment within the data stream. 16 on the PC.
    pub alignment: u16,

    /// The bitmaps, in on-disk order.
    pub entries: Vec<PegEntry>,
}

impl Default for PegFile {
    fn default() -> Self {
        PegFile {
            version: 13,
            platform: 0,
            header_size: 0,
            data_size: 0,
            flags: 0,
            alignment: 16,
            entries: Vec::new(),
        }
    }
}

impl PegFile {

    /// Parse the directory from the header stream and the payloads
    /// from the data stream.
    pub fn read(
        header_read: &mut (impl Read + Seek),
        data_read: &mut (impl Read + Seek),
    ) -> Result<Self> {
        let mut peg = Self::read_header(header_read)?;
        peg.read_data(data_read)?;
        Ok(peg)
    }

    /// Parse the directory from the header stream.
    /// Payloads remain empty until `read_data`.
    pub fn read_header(read: &mut (impl Read + Seek)) -> Result<Self> {
        let signature = u32::read(read)?;
        if signature != PEG_SIGNATURE {
            return Err(Error::field("signature", format!("{:x}", signature)))
        }

        let version = i16::read(read)?;
        let platform = i16::read(read)?;
        let header_size = u32::read(read)?;
        let data_size = u32::read(read)?;
        let num_bitmaps = u16::read(read)?;
        let flags = u16::read(read)?;
        let total_entries = u16::read(read)?;
        let alignment = u16::read(read)?;

        if version != 13 && version != 19 {
            return Err(Error::field("version", version))
        }

        if num_bitmaps != total_entries {
            return Err(Error::invalid(format!(
                "num_bitmaps ({}) does not match total_entries ({})",
                num_bitmaps, total_entries
            )))
        }

        if version == 19 {
            align_read(read, 16)?;
        }

        let mut entries = Vec::with_capacity(total_entries as usize);
        for _ in 0..total_entries {
            entries.push(match version {
                13 => PegEntry::read_v13(read)?,
                _ => PegEntry::read_v19(read)?,
            });
        }

        for entry in &mut entries {
            entry.filename = Text::read_null_terminated(read, MAX_NAME_LEN)?;
        }

        Ok(PegFile {
            version, platform, header_size, data_size,
            flags, alignment, entries,
        })
    }

    /// Write the directory to the header stream, recomputing the declared
    /// sizes and the payload offsets from the current entries.
    pub fn write_header(&self, write: &mut (impl Write + Seek)) -> UnitResult {
        PEG_SIGNATURE.write(write)?;
        self.version.write(write)?;
        self.platform.write(write)?;
        self.calc_header_size().write(write)?;
        as_u32(self.calc_data_size(), "data_size")?.write(write)?;
        (self.entries.len() as u16).write(write)?;
        self.flags.write(write)?;
        (self.entries.len() as u16).write(write)?;
        self.alignment.write(write)?;

        if self.version == 19 {
            align_write(write, 16)?;
        }

        let mut data_offset = 0_i64;
        for entry in &self.entries {
            if self.alignment > 0 {
                data_offset = align_position(data_offset as u64, self.alignment as u64) as i64;
            }

            match self.version {
                13 => entry.write_v13(write, data_offset)?,
                19 => entry.write_v19(write, data_offset)?,
                _ => return Err(Error::unsupported(format!("peg version {}", self.version))),
            }

            data_offset += entry.data.len() as i64;
        }

        for entry in &self.entries {
            if entry.filename.is_empty() {
                return Err(Error::field("filename", "empty"))
            }

            entry.filename.write_null_terminated(write)?;
        }

        Ok(())
    }

    /// Read the payload of every entry from the data stream.
    pub fn read_data(&mut self, read: &mut (impl Read + Seek)) -> UnitResult {
        for entry in &mut self.entries {
            let offset = u64::try_from(entry.offset)
                .map_err(|_| Error::field("offset", entry.offset))?;

            read.seek(SeekFrom::Start(offset))?;
            entry.data = u8::read_vec(read, entry.data_size as usize, entry.data_size as usize)?;
        }

        Ok(())
    }

    /// Write the payload of every entry to the data stream, padded to the
    /// bundle alignment so that the offsets of `write_header` are met.
    pub fn write_data(&self, write: &mut (impl Write + Seek)) -> UnitResult {
        for entry in &self.entries {
            if self.alignment > 0 {
                align_write(write, self.alignment as u64)?;
            }

            u8::write_slice(write, &entry.data)?;
        }

        Ok(())
    }

    /// The header size implied by the current entries:
    /// the fixed fields, the declared record size per entry, and the names.
    pub fn calc_header_size(&self) -> u32 {
        let mut total_size = PEG_HEADER_SIZE;
        total_size += PEG_ENTRY_RECORD_SIZE * self.entries.len() as u64;

        for entry in &self.entries {
            total_size += entry.filename.null_terminated_byte_size() as u64;
        }

        total_size as u32
    }

    /// The data stream size implied by the current entries and alignment.
    pub fn calc_data_size(&self) -> u64 {
        let mut data_size = 0_u64;

        for entry in &self.entries {
            if self.alignment > 0 {
                data_size = align_position(data_size, self.alignment as u64);
            }

            data_size += entry.data.len() as u64;
        }

        data_size
    }

    /// The index of the first entry with the name, if any.
    pub fn entry_index(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.filename.eq(name))
    }
}

/// The declared data size of a peg header is 32 bit on disk.
fn as_u32(value: u64, name: &'static str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::field(name, value))
}


#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn single_bc1_entry() -> PegEntry {
        PegEntry {
            filename: Text::from("test.tga"),
            width: 4,
            height: 4,
            bm_fmt: TextureFormat::PcBc1,
            data_size: 16,
            data: vec![
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            ],
            ..PegEntry::default()
        }
    }

    #[test]
    fn computed_sizes() {
        let peg = PegFile {
            entries: vec![single_bc1_entry()],
            ..PegFile::default()
        };

        assert_eq!(peg.calc_header_size(), 24 + 72 + 9);
        assert_eq!(peg.calc_data_size(), 16);
    }

    #[test]
    fn v13_round_trip() {
        let peg = PegFile {
            entries: vec![single_bc1_entry()],
            ..PegFile::default()
        };

        let mut header = Cursor::new(Vec::new());
        peg.write_header(&mut header).unwrap();

        let mut data = Cursor::new(Vec::new());
        peg.write_data(&mut data).unwrap();

        // offset 0 is already 16-aligned, so the data stream
        // is exactly the 16 payload bytes
        let data = data.into_inner();
        assert_eq!(data.len(), 16);
        assert_eq!(data, single_bc1_entry().data);

        let parsed = PegFile::read(
            &mut Cursor::new(header.into_inner()),
            &mut Cursor::new(data),
        ).unwrap();

        assert_eq!(parsed.header_size, 105);
        assert_eq!(parsed.data_size, 16);
        assert_eq!(parsed.entries.len(), 1);

        let entry = &parsed.entries[0];
        assert!(entry.filename.eq("test.tga"));
        assert_eq!(entry.offset, 0);
        assert_eq!((entry.width, entry.height), (4, 4));
        assert_eq!(entry.bm_fmt, TextureFormat::PcBc1);
        assert_eq!(entry.mip_levels, 1);
        assert_eq!(entry.data, single_bc1_entry().data);
    }

    #[test]
    fn rejects_empty_filenames() {
        let mut peg = PegFile::default();
        peg.entries.push(PegEntry::default());

        let error = peg.write_header(&mut Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(error, Error::Field { name: "filename", .. }));
    }

    #[test]
    fn rejects_bad_signature_and_version() {
        let mut bytes = Vec::new();
        0x12345678_u32.write(&mut bytes).unwrap();
        bytes.resize(24, 0);
        assert!(matches!(
            PegFile::read_header(&mut Cursor::new(bytes)),
            Err(Error::Field { name: "signature", .. })
        ));

        let mut bytes = Vec::new();
        PEG_SIGNATURE.write(&mut bytes).unwrap();
        14_i16.write(&mut bytes).unwrap();
        bytes.resize(24, 0);
        assert!(matches!(
            PegFile::read_header(&mut Cursor::new(bytes)),
            Err(Error::Field { name: "version", .. })
        ));
    }

    #[test]
    fn mismatching_counts_are_rejected() {
        let mut bytes = Vec::new();
        PEG_SIGNATURE.write(&mut bytes).unwrap();
        13_i16.write(&mut bytes).unwrap();
        0_i16.write(&mut bytes).unwrap();
        105_u32.write(&mut bytes).unwrap();
        16_u32.write(&mut bytes).unwrap();
        1_u16.write(&mut bytes).unwrap(); // num_bitmaps
        0_u16.write(&mut bytes).unwrap();
        2_u16.write(&mut bytes).unwrap(); // total_entries
        16_u16.write(&mut bytes).unwrap();

        assert!(matches!(
            PegFile::read_header(&mut Cursor::new(bytes)),
            Err(Error::Invalid(_))
        ));
    }
}
