
//! Read and write vpp packfiles, the outer archive format storing
//! named sub-files. Three on-disk versions are supported: 6, 10 and 17.
//! The data section may be compressed per entry, or condensed into one
//! stream for the whole archive (zlib for v6 and v10, lz4 for v17).

use bitflags::bitflags;
use crate::compression;
use crate::error::{Error, Result, UnitResult};
use crate::io::*;


/// The first four bytes of every packfile.
pub const PACKFILE_DESCRIPTOR: u32 = 0x51890ACE;

/// Size of the fixed v6 header. The v6 sections that follow it are
/// aligned to whole 2048-byte sectors.
const HEADER_SIZE_V6: u64 = 380;
const HEADER_SIZE_V10: u64 = 40;
const HEADER_SIZE_V17: u64 = 120;

/// Section alignment of v6 archives.
const SECTOR_SIZE: u64 = 2048;

/// Per-entry directory record sizes, including the name offset prefix.
const ENTRY_RECORD_SIZE_V6: u64 = 20;
const ENTRY_RECORD_SIZE_V10: u64 = 24;
const ENTRY_RECORD_SIZE_V17: u64 = 48;

/// Longest accepted entry name, as a corruption guard.
const MAX_NAME_LEN: usize = 4096;

/// Most entries an archive may declare. A count beyond this must come
/// from a corrupt header, and is rejected before reserving memory for
/// the directory.
const MAX_NUM_FILES: u32 = 1 << 20;


bitflags! {

    /// Archive-wide flags of the packfile header.
    #[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
    pub struct PackfileFlags: u32 {

        /// The data section is compressed.
        const COMPRESSED = 0x1;

        /// All sub-file payloads are concatenated before compression,
        /// forming one stream for the whole archive.
        const CONDENSED = 0x2;
    }
}

bitflags! {

    /// Flags of one archive member.
    #[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
    pub struct PackfileEntryFlags: u16 {

        /// The payload of this entry is compressed individually.
        const COMPRESSED = 0x1;
    }
}


/// One archive member: its metadata, and its payload once materialised.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct PackfileEntry {

    /// Base name of the sub-file.
    pub filename: Text,

    /// Parent path of the sub-file, backslash separated. Version 17 only.
    pub directory: Option<Text>,

    /// Byte offset of the payload within the archive's data section.
    /// For condensed archives, the offset within the decompressed stream.
    pub start: u64,

    /// Uncompressed byte size of the payload.
    pub size: u64,

    /// On-disk byte size of the payload. Equal to `size`
    /// when the entry is not compressed.
    pub compressed_size: u64,

    /// Per-entry flags.
    pub flags: PackfileEntryFlags,

    /// Payload alignment within the data section.
    pub alignment: u32,

    /// The materialised payload.
    data: Option<Vec<u8>>,
}

impl PackfileEntry {

    /// Create an empty entry, for assembling a new archive.
    pub fn new(filename: Text) -> Self {
        PackfileEntry { filename, ..Self::default() }
    }

    /// The materialised payload, or `None` when it was not yet loaded.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Whether the payload has been materialised.
    pub fn is_cached(&self) -> bool {
        self.data.is_some()
    }

    /// Set the payload, updating the declared sizes to match.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.size = data.len() as u64;
        self.compressed_size = data.len() as u64;
        self.data = Some(data);
    }

    /// The length of the materialised payload,
    /// or the declared size when not yet loaded.
    pub fn actual_size(&self) -> u64 {
        match &self.data {
            Some(data) => data.len() as u64,
            None => self.size,
        }
    }

    /// The full path of this entry: `directory\filename`,
    /// or just the filename when no directory is set.
    pub fn filepath(&self) -> Text {
        match &self.directory {
            None => self.filename.clone(),

            Some(directory) => {
                let mut bytes = smallvec::SmallVec::from_slice(directory.bytes());
                bytes.push(b'\\');
                bytes.extend_from_slice(self.filename.bytes());
                Text::from_bytes_unchecked(bytes)
            },
        }
    }

    /// Split the path on its last backslash into directory and filename.
    /// A path without backslashes becomes a plain filename.
    pub fn set_filepath(&mut self, path: &Text) {
        match path.rfind(b'\\') {
            None => {
                self.filename = path.clone();
                self.directory = None;
            },

            Some(separator) => {
                self.filename = Text::from_bytes_unchecked(
                    smallvec::SmallVec::from_slice(&path.bytes()[separator + 1 ..])
                );

                let directory = &path.bytes()[.. separator];
                self.directory = if directory.is_empty() { None } else {
                    Some(Text::from_bytes_unchecked(smallvec::SmallVec::from_slice(directory)))
                };
            },
        }
    }

    /// Parse the fixed-size v6 directory record from the current cursor.
    fn read_v6(read: &mut impl Read) -> Result<Self> {
        let mut entry = PackfileEntry {
            start: u32::read(read)? as u64,
            size: u32::read(read)? as u64,
            compressed_size: u32::read(read)? as u64,
            ..Self::default()
        };

        skip_bytes(read, 4)?; // runtime parent pointer
        entry.flags = PackfileEntryFlags::empty();
        entry.alignment = 0;
        Ok(entry)
    }

    /// Parse the fixed-size v10 directory record from the current cursor.
    fn read_v10(read: &mut impl Read) -> Result<Self> {
        Ok(PackfileEntry {
            start: u32::read(read)? as u64,
            size: u32::read(read)? as u64,
            compressed_size: u32::read(read)? as u64,
            flags: PackfileEntryFlags::from_bits_retain(u16::read(read)?),
            alignment: u16::read(read)? as u32,
            ..Self::default()
        })
    }

    /// Parse the fixed-size v17 directory record from the current cursor.
    fn read_v17(read: &mut impl Read) -> Result<Self> {
        let entry = PackfileEntry {
            start: u64::read(read)?,
            size: u64::read(read)?,
            compressed_size: u64::read(read)?,
            flags: PackfileEntryFlags::from_bits_retain(u16::read(read)?),
            alignment: u32::read(read)?,
            ..Self::default()
        };

        skip_bytes(read, 2)?; // padding
        Ok(entry)
    }

    fn write_v10(&self, write: &mut impl Write) -> UnitResult {
        as_u32(self.start, "start")?.write(write)?;
        as_u32(self.size, "size")?.write(write)?;
        as_u32(self.compressed_size, "compressed_size")?.write(write)?;
        self.flags.bits().write(write)?;
        (self.alignment as u16).write(write)?;
        Ok(())
    }

    fn write_v17(&self, write: &mut impl Write) -> UnitResult {
        self.start.write(write)?;
        self.size.write(write)?;
        self.compressed_size.write(write)?;
        self.flags.bits().write(write)?;
        self.alignment.write(write)?;
        0_u16.write(write)?; // padding
        Ok(())
    }
}


/// A packfile archive: the parsed header and directory,
/// and the lazily materialised entry payloads.
///
/// The payloads are not read up front. `entry_data` materialises one
/// payload on demand; for condensed archives, the first call decompresses
/// the whole data section and fills the cache of every entry in one pass.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Packfile {

    /// On-disk version: 6, 10 or 17.
    pub version: u32,

    /// Archive-wide flags.
    pub flags: PackfileFlags,

    /// Checksum over the header, carried verbatim. Versions 10 and 17.
    pub header_checksum: u32,

    /// Total byte size of the archive file.
    pub file_size: u64,

    /// Byte size of the entry directory.
    pub dir_size: u64,

    /// Byte size of the name table.
    pub filename_size: u64,

    /// Uncompressed byte size of the data section.
    pub data_size: u64,

    /// On-disk byte size of the data section when compressed.
    pub compressed_data_size: u64,

    /// Creation time as a 64-bit timestamp. Version 17 only.
    pub timestamp: u64,

    /// Number of distinct directory strings in the name table. Version 17 only.
    pub num_paths: u32,

    /// Absolute byte offset of the data section. Carried explicitly by v17
    /// headers; derived from the section sizes for v6 and v10.
    data_offset: u64,

    /// The archive members, in on-disk order.
    pub entries: Vec<PackfileEntry>,
}

impl Packfile {

    /// Create an empty archive of the specified version, for writing.
    pub fn new(version: u32) -> Self {
        Packfile {
            version,
            flags: PackfileFlags::empty(),
            header_checksum: 0,
            file_size: 0,
            dir_size: 0,
            filename_size: 0,
            data_size: 0,
            compressed_data_size: 0,
            timestamp: 0,
            num_paths: 0,
            data_offset: 0,
            entries: Vec::new(),
        }
    }

    /// Parse the header and directory of an archive.
    /// The archive must begin at offset zero of the stream.
    /// Entry payloads are not read; see `entry_data`.
    pub fn read(read: &mut (impl Read + Seek)) -> Result<Self> {
        let descriptor = u32::read(read)?;
        if descriptor != PACKFILE_DESCRIPTOR {
            return Err(Error::field("descriptor", format!("{:x}", descriptor)))
        }

        let version = u32::read(read)?;
        let mut packfile = Packfile::new(version);

        match version {
            6 => packfile.read_header_v6(read)?,
            10 => packfile.read_header_v10(read)?,
            17 => packfile.read_header_v17(read)?,
            _ => return Err(Error::unsupported(format!("packfile version {}", version))),
        }

        packfile.validate_entry_bounds()?;
        Ok(packfile)
    }

    fn read_header_v6(&mut self, read: &mut (impl Read + Seek)) -> UnitResult {
        skip_bytes(read, 0x144)?; // runtime-only fields
        self.flags = PackfileFlags::from_bits_retain(u32::read(read)?);
        skip_bytes(read, 4)?; // sector placeholder

        let num_files = u32::read(read)?;
        self.file_size = u32::read(read)? as u64;
        self.dir_size = u32::read(read)? as u64;
        self.filename_size = u32::read(read)? as u64;
        self.data_size = u32::read(read)? as u64;
        self.compressed_data_size = u32::read(read)? as u64;

        self.check_directory_size(num_files, ENTRY_RECORD_SIZE_V6)?;

        // the entry directory starts at the next whole sector
        align_read(read, SECTOR_SIZE)?;

        let mut filename_offsets = Vec::with_capacity(num_files as usize);
        for _ in 0..num_files {
            filename_offsets.push(u32::read(read)? as u64);
            self.entries.push(PackfileEntry::read_v6(read)?);
        }

        let names_offset = self.entry_names_offset();
        for (entry_index, name_offset) in filename_offsets.into_iter().enumerate() {
            read.seek(SeekFrom::Start(names_offset + name_offset))?;
            self.entries[entry_index].filename = Text::read_null_terminated(read, MAX_NAME_LEN)?;
        }

        self.data_offset = align_position(names_offset + self.filename_size, SECTOR_SIZE);
        Ok(())
    }

    fn read_header_v10(&mut self, read: &mut (impl Read + Seek)) -> UnitResult {
        self.header_checksum = u32::read(read)?;
        self.file_size = u32::read(read)? as u64;
        self.flags = PackfileFlags::from_bits_retain(u32::read(read)?);

        let num_files = u32::read(read)?;
        self.dir_size = u32::read(read)? as u64;
        self.filename_size = u32::read(read)? as u64;
        self.data_size = u32::read(read)? as u64;
        self.compressed_data_size = u32::read(read)? as u64;

        self.check_directory_size(num_files, ENTRY_RECORD_SIZE_V10)?;

        let mut filename_offsets = Vec::with_capacity(num_files as usize);
        for _ in 0..num_files {
            filename_offsets.push(u64::read(read)?);
            self.entries.push(PackfileEntry::read_v10(read)?);
        }

        let names_offset = self.entry_names_offset();
        for (entry_index, name_offset) in filename_offsets.into_iter().enumerate() {
            read.seek(SeekFrom::Start(names_offset + name_offset))?;
            self.entries[entry_index].filename = Text::read_null_terminated(read, MAX_NAME_LEN)?;
        }

        self.data_offset = names_offset + self.filename_size;
        Ok(())
    }

    fn read_header_v17(&mut self, read: &mut (impl Read + Seek)) -> UnitResult {
        self.header_checksum = u32::read(read)?;
        self.flags = PackfileFlags::from_bits_retain(u32::read(read)?);

        let num_files = u32::read(read)?;
        self.num_paths = u32::read(read)?;
        self.dir_size = u32::read(read)? as u64;
        self.filename_size = u32::read(read)? as u64;
        self.file_size = u64::read(read)?;
        self.data_size = u64::read(read)?;
        self.compressed_data_size = u64::read(read)?;
        self.timestamp = u64::read(read)?;

        // the explicit offset wins over the derived section layout
        self.data_offset = u64::read(read)?;

        self.check_directory_size(num_files, ENTRY_RECORD_SIZE_V17)?;

        // the remainder of the 120-byte header is reserved
        read.seek(SeekFrom::Start(HEADER_SIZE_V17))?;

        let mut name_offsets = Vec::with_capacity(num_files as usize);
        for _ in 0..num_files {
            let filename_offset = u64::read(read)?;
            let filepath_offset = u64::read(read)?;
            name_offsets.push((filename_offset, filepath_offset));
            self.entries.push(PackfileEntry::read_v17(read)?);
        }

        let names_offset = self.entry_names_offset();
        for (entry_index, (filename_offset, filepath_offset)) in name_offsets.into_iter().enumerate() {
            read.seek(SeekFrom::Start(names_offset + filename_offset))?;
            self.entries[entry_index].filename = Text::read_null_terminated(read, MAX_NAME_LEN)?;

            read.seek(SeekFrom::Start(names_offset + filepath_offset))?;
            let directory = Text::read_null_terminated(read, MAX_NAME_LEN)?;
            self.entries[entry_index].directory =
                if directory.is_empty() { None } else { Some(directory) };
        }

        Ok(())
    }

    /// The declared file count must be sane, and the declared directory
    /// size must match the computed record layout.
    fn check_directory_size(&self, num_files: u32, record_size: u64) -> UnitResult {
        if num_files > MAX_NUM_FILES {
            return Err(Error::field("num_files", num_files))
        }

        if num_files as u64 * record_size != self.dir_size {
            return Err(Error::invalid("directory size does not match file count"))
        }

        Ok(())
    }

    /// Every payload must lie within the declared data section.
    /// Individually compressed payloads are exempt, as their `start`
    /// refers to the compressed stream.
    fn validate_entry_bounds(&self) -> UnitResult {
        for entry in &self.entries {
            if entry.flags.contains(PackfileEntryFlags::COMPRESSED) { continue }

            let end = entry.start.checked_add(entry.size)
                .ok_or_else(|| Error::invalid("entry size overflow"))?;

            if end > self.data_size {
                return Err(Error::invalid("entry exceeds the data section"))
            }
        }

        Ok(())
    }

    /// Absolute offset of the entry directory.
    fn entries_offset(&self) -> u64 {
        match self.version {
            6 => align_position(HEADER_SIZE_V6, SECTOR_SIZE),
            10 => HEADER_SIZE_V10,
            _ => HEADER_SIZE_V17,
        }
    }

    /// Absolute offset of the name table.
    fn entry_names_offset(&self) -> u64 {
        let entries_end = self.entries_offset() + self.dir_size;

        match self.version {
            6 => align_position(entries_end, SECTOR_SIZE),
            _ => entries_end,
        }
    }

    /// Absolute offset of the data section.
    pub fn data_offset(&self) -> u64 {
        match self.version {
            6 => align_position(self.entry_names_offset() + self.filename_size, SECTOR_SIZE),

            // v17 carries the offset explicitly; v10 derives it
            10 => self.entry_names_offset() + self.filename_size,
            _ => self.data_offset,
        }
    }

    /// The version-appropriate decompressor: zlib for v6 and v10, lz4 for v17.
    fn decompress(&self, read: &mut impl Read) -> Result<Vec<u8>> {
        match self.version {
            17 => compression::decompress_lz4(read),
            _ => compression::decompress_zlib(read),
        }
    }

    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        match self.version {
            17 => compression::compress_lz4(bytes),
            _ => compression::compress_zlib(bytes),
        }
    }

    /// Materialise the payload of one entry, if it is not already cached.
    ///
    /// For archives that are both compressed and condensed, the whole data
    /// section is one stream: it is decompressed once, and the payloads of
    /// all entries are filled in the same pass.
    pub fn load_entry_data(&mut self, read: &mut (impl Read + Seek), index: usize) -> UnitResult {
        if self.entries[index].is_cached() {
            return Ok(())
        }

        let condensed = PackfileFlags::COMPRESSED | PackfileFlags::CONDENSED;
        if self.flags.contains(condensed) {
            read.seek(SeekFrom::Start(self.data_offset()))?;
            let decompressed = self.decompress(read)?;

            for entry in &mut self.entries {
                if entry.is_cached() { continue }

                let start = entry.start as usize;
                let end = start.checked_add(entry.size as usize)
                    .filter(|&end| end <= decompressed.len())
                    .ok_or_else(|| Error::invalid("entry exceeds the condensed stream"))?;

                entry.data = Some(decompressed[start..end].to_vec());
            }

            return Ok(())
        }

        let (start, size, compressed) = {
            let entry = &self.entries[index];
            (entry.start, entry.size, entry.flags.contains(PackfileEntryFlags::COMPRESSED))
        };

        read.seek(SeekFrom::Start(self.data_offset() + start))?;

        let data = if compressed {
            let decompressed = self.decompress(read)?;
            if decompressed.len() as u64 != size {
                return Err(Error::invalid("compressed entry does not decode to its declared size"))
            }

            decompressed
        }
        else {
            u8::read_vec(read, size as usize, size as usize)?
        };

        self.entries[index].data = Some(data);
        Ok(())
    }

    /// The payload of one entry, materialising it first if necessary.
    pub fn entry_data(&mut self, read: &mut (impl Read + Seek), index: usize) -> Result<&[u8]> {
        self.load_entry_data(read, index)?;
        Ok(self.entries[index].data().expect("payload was just materialised"))
    }

    /// The entry at the index. The index must be valid.
    pub fn entry(&self, index: usize) -> &PackfileEntry {
        &self.entries[index]
    }

    /// The entry at the index. The index must be valid.
    pub fn entry_mut(&mut self, index: usize) -> &mut PackfileEntry {
        &mut self.entries[index]
    }

    /// Find the first entry with the filename. On-disk order is preserved.
    pub fn entry_by_filename(&self, filename: &str) -> Option<&PackfileEntry> {
        self.entries.iter().find(|entry| entry.filename.eq(filename))
    }

    /// Find the index of the first entry with the filename.
    pub fn entry_index(&self, filename: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.filename.eq(filename))
    }

    /// Number of archive members.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Serialise the archive. Supported for versions 10 and 17.
    ///
    /// Recomputes the layout from the current entries: payload offsets,
    /// section sizes and the total file size. Every entry payload must
    /// have been materialised or set beforehand. The declared fields of
    /// this archive are updated to the recomputed values, so that parsing
    /// the written bytes yields this exact structure back.
    pub fn write(&mut self, write: &mut (impl Write + Seek)) -> UnitResult {
        match self.version {
            10 | 17 => {},
            6 => return Err(Error::unsupported("writing version 6 packfiles")),
            _ => return Err(Error::unsupported(format!("packfile version {}", self.version))),
        }

        for entry in &self.entries {
            if !entry.is_cached() {
                return Err(Error::invalid(format!("payload of entry \"{}\" was never loaded", entry.filename)))
            }

            if entry.filename.is_empty() {
                return Err(Error::field("filename", "empty"))
            }
        }

        let record_size = if self.version == 10 { ENTRY_RECORD_SIZE_V10 } else { ENTRY_RECORD_SIZE_V17 };
        self.dir_size = self.entries.len() as u64 * record_size;

        let (filename_offsets, filepath_offsets) = self.compute_name_table();
        let data_section = self.compute_data_section()?;

        self.file_size = self.entries_offset() + self.dir_size
            + self.filename_size + data_section.len() as u64;

        match self.version {
            10 => {
                self.data_offset = HEADER_SIZE_V10 + self.dir_size + self.filename_size;

                PACKFILE_DESCRIPTOR.write(write)?;
                self.version.write(write)?;
                self.header_checksum.write(write)?;
                as_u32(self.file_size, "file_size")?.write(write)?;
                self.flags.bits().write(write)?;
                (self.entries.len() as u32).write(write)?;
                as_u32(self.dir_size, "dir_size")?.write(write)?;
                as_u32(self.filename_size, "filename_size")?.write(write)?;
                as_u32(self.data_size, "data_size")?.write(write)?;
                as_u32(self.compressed_data_size, "compressed_data_size")?.write(write)?;

                for (entry, filename_offset) in self.entries.iter().zip(&filename_offsets) {
                    filename_offset.write(write)?;
                    entry.write_v10(write)?;
                }
            },

            _ => {
                self.data_offset = HEADER_SIZE_V17 + self.dir_size + self.filename_size;

                PACKFILE_DESCRIPTOR.write(write)?;
                self.version.write(write)?;
                self.header_checksum.write(write)?;
                self.flags.bits().write(write)?;
                (self.entries.len() as u32).write(write)?;
                self.num_paths.write(write)?;
                as_u32(self.dir_size, "dir_size")?.write(write)?;
                as_u32(self.filename_size, "filename_size")?.write(write)?;
                self.file_size.write(write)?;
                self.data_size.write(write)?;
                self.compressed_data_size.write(write)?;
                self.timestamp.write(write)?;
                self.data_offset.write(write)?;

                align_write(write, HEADER_SIZE_V17)?; // reserved remainder of the header

                for (entry, (filename_offset, filepath_offset))
                    in self.entries.iter().zip(filename_offsets.iter().zip(&filepath_offsets))
                {
                    filename_offset.write(write)?;
                    filepath_offset.write(write)?;
                    entry.write_v17(write)?;
                }
            },
        }

        // the name table: filenames in entry order, then the distinct directories
        for entry in &self.entries {
            entry.filename.write_null_terminated(write)?;
        }

        if self.version == 17 {
            let mut written_paths = Vec::new();
            for entry in &self.entries {
                let directory = entry.directory.clone().unwrap_or_default();
                if !written_paths.contains(&directory) {
                    directory.write_null_terminated(write)?;
                    written_paths.push(directory);
                }
            }
        }

        u8::write_slice(write, &data_section)?;
        Ok(())
    }

    /// Per-entry offsets into the name table, and the table's byte size.
    /// For v17, filenames are followed by the distinct directory strings;
    /// entries without a directory share the empty string.
    fn compute_name_table(&mut self) -> (Vec<u64>, Vec<u64>) {
        let mut filename_offsets = Vec::with_capacity(self.entries.len());
        let mut table_size = 0_u64;

        for entry in &self.entries {
            filename_offsets.push(table_size);
            table_size += entry.filename.null_terminated_byte_size() as u64;
        }

        let mut filepath_offsets = Vec::new();
        if self.version == 17 {
            let mut paths: Vec<(Text, u64)> = Vec::new();

            for entry in &self.entries {
                let directory = entry.directory.clone().unwrap_or_default();

                let offset = match paths.iter().find(|(path, _)| *path == directory) {
                    Some((_, offset)) => *offset,
                    None => {
                        let offset = table_size;
                        table_size += directory.null_terminated_byte_size() as u64;
                        paths.push((directory, offset));
                        offset
                    },
                };

                filepath_offsets.push(offset);
            }

            self.num_paths = paths.len() as u32;
        }

        self.filename_size = table_size;
        (filename_offsets, filepath_offsets)
    }

    /// Lay out and encode the physical data section, updating the entry
    /// offsets and sizes and the declared section sizes.
    fn compute_data_section(&mut self) -> Result<Vec<u8>> {
        let condensed = PackfileFlags::COMPRESSED | PackfileFlags::CONDENSED;

        if self.flags.contains(condensed) {
            // one stream over the concatenated payloads;
            // entry offsets refer to the decompressed stream
            let mut stream = Vec::new();

            for entry in &mut self.entries {
                let data = entry.data.as_ref().expect("payload presence was checked");

                if entry.alignment > 0 {
                    stream.resize(align_position(stream.len() as u64, entry.alignment as u64) as usize, 0);
                }

                entry.start = stream.len() as u64;
                entry.size = data.len() as u64;
                entry.compressed_size = data.len() as u64;
                stream.extend_from_slice(data);
            }

            self.data_size = stream.len() as u64;
            let compressed = self.compress(&stream)?;
            self.compressed_data_size = compressed.len() as u64;
            return Ok(compressed)
        }

        let per_entry_compression = self.flags.contains(PackfileFlags::COMPRESSED);
        let mut section = Vec::new();
        let mut uncompressed_total = 0_u64;

        for entry_index in 0..self.entries.len() {
            let alignment = self.entries[entry_index].alignment;
            if alignment > 0 {
                section.resize(align_position(section.len() as u64, alignment as u64) as usize, 0);
            }

            let data = self.entries[entry_index].data.clone().expect("payload presence was checked");
            let size = data.len() as u64;

            let (payload, entry_flags) = if per_entry_compression {
                (self.compress(&data)?, PackfileEntryFlags::COMPRESSED)
            }
            else {
                (data, PackfileEntryFlags::empty())
            };

            let entry = &mut self.entries[entry_index];
            entry.start = section.len() as u64;
            entry.size = size;
            entry.compressed_size = payload.len() as u64;
            entry.flags = entry_flags;

            uncompressed_total += size;
            section.extend_from_slice(&payload);
        }

        if per_entry_compression {
            self.data_size = uncompressed_total;
            self.compressed_data_size = section.len() as u64;
        }
        else {
            self.data_size = section.len() as u64;
            self.compressed_data_size = section.len() as u64;
        }

        Ok(section)
    }
}

/// Declared sizes of v10 headers are 32 bit on disk.
fn as_u32(value: u64, name: &'static str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::field(name, value))
}
