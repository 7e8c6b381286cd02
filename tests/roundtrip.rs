extern crate saints;

use std::io::Cursor;

use saints::dds::{self, DdsPixelformat, DDSD_LINEARSIZE, DDSD_PITCH};
use saints::io::{align_position, Data, Text};
use saints::prelude::*;


fn write_to_vec(packfile: &mut Packfile) -> Vec<u8> {
    let mut written = Cursor::new(Vec::new());
    packfile.write(&mut written).unwrap();
    written.into_inner()
}

/// Parse an archive and materialise every payload.
fn parse_fully(bytes: Vec<u8>) -> Packfile {
    let mut read = Cursor::new(bytes);
    let mut parsed = Packfile::read(&mut read).unwrap();

    for index in 0..parsed.entry_count() {
        parsed.load_entry_data(&mut read, index).unwrap();
    }

    parsed
}

fn archive(version: u32, flags: PackfileFlags, contents: &[(&str, &[u8])]) -> Packfile {
    let mut packfile = Packfile::new(version);
    packfile.flags = flags;

    for (name, data) in contents {
        let mut entry = PackfileEntry::new(Text::from(*name));
        entry.set_data(data.to_vec());
        packfile.entries.push(entry);
    }

    packfile
}

const CONTENTS: &[(&str, &[u8])] = &[
    ("weapons.xtbl", b"<root><weapon/></root>"),
    ("logo.peg", &[0xab; 300]),
    ("credits.txt", b"made by people"),
];


#[test]
fn packfile_v10_round_trip() {
    let mut original = archive(10, PackfileFlags::empty(), CONTENTS);
    let first_pass = parse_fully(write_to_vec(&mut original));

    assert_eq!(first_pass, original);

    // a second round trip reproduces every observable field
    let mut reparse = first_pass.clone();
    let second_pass = parse_fully(write_to_vec(&mut reparse));
    assert_eq!(second_pass, first_pass);

    assert_eq!(second_pass.data_size, 22 + 300 + 14);
    assert_eq!(second_pass.entries[1].data().unwrap(), &[0xab; 300][..]);
}

#[test]
fn packfile_v10_compressed_entries_round_trip() {
    let mut original = archive(10, PackfileFlags::COMPRESSED, CONTENTS);
    let parsed = parse_fully(write_to_vec(&mut original));

    assert_eq!(parsed, original);
    assert_eq!(parsed.data_size, 336);

    for (entry, (name, data)) in parsed.entries.iter().zip(CONTENTS) {
        assert!(entry.filename.eq(name));
        assert!(entry.flags.contains(PackfileEntryFlags::COMPRESSED));
        assert_eq!(entry.data().unwrap(), *data);
    }
}

#[test]
fn packfile_v10_condensed_round_trip() {
    let flags = PackfileFlags::COMPRESSED | PackfileFlags::CONDENSED;
    let mut original = archive(10, flags, CONTENTS);
    let bytes = write_to_vec(&mut original);

    let parsed = parse_fully(bytes.clone());
    assert_eq!(parsed, original);

    // every payload equals the corresponding slice of the bulk stream
    let mut read = Cursor::new(bytes);
    let mut lazy = Packfile::read(&mut read).unwrap();

    let bulk = {
        let mut data_read = Cursor::new(read.get_ref().clone());
        data_read.set_position(lazy.data_offset());
        saints::compression::decompress_zlib(&mut data_read).unwrap()
    };

    for index in 0..lazy.entry_count() {
        let (start, size) = {
            let entry = lazy.entry(index);
            (entry.start as usize, entry.size as usize)
        };

        assert_eq!(
            lazy.entry_data(&mut read, index).unwrap(),
            &bulk[start .. start + size]
        );
    }
}

#[test]
fn packfile_v17_round_trip_with_directories() {
    let mut original = Packfile::new(17);
    original.timestamp = 0x5f5e_1000;

    let mut first = PackfileEntry::new(Text::from("table.xtbl"));
    first.set_filepath(&Text::from("data\\tables\\table.xtbl"));
    first.set_data(b"contents of the table".to_vec());
    original.entries.push(first);

    let mut second = PackfileEntry::new(Text::from("other.xtbl"));
    second.set_filepath(&Text::from("data\\tables\\other.xtbl"));
    second.set_data(vec![7; 99]);
    original.entries.push(second);

    let mut third = PackfileEntry::new(Text::from("rootfile.bin"));
    third.set_data(vec![1, 2, 3]);
    original.entries.push(third);

    let parsed = parse_fully(write_to_vec(&mut original));
    assert_eq!(parsed, original);

    assert_eq!(parsed.timestamp, 0x5f5e_1000);
    assert_eq!(parsed.num_paths, 2); // the shared directory and the empty one
    assert!(parsed.entries[0].filepath().eq("data\\tables\\table.xtbl"));
    assert!(parsed.entries[2].directory.is_none());
}

#[test]
fn packfile_v17_condensed_uses_lz4() {
    let flags = PackfileFlags::COMPRESSED | PackfileFlags::CONDENSED;
    let mut original = archive(17, flags, CONTENTS);
    let bytes = write_to_vec(&mut original);

    // the data section must hold an lz4 frame, not a zlib stream
    let mut data_read = Cursor::new(bytes.clone());
    data_read.set_position(original.data_offset());
    let bulk = saints::compression::decompress_lz4(&mut data_read).unwrap();
    assert_eq!(&bulk[..22], CONTENTS[0].1);

    let parsed = parse_fully(bytes);
    assert_eq!(parsed, original);
}

#[test]
fn packfile_v6_section_alignment() {
    // v6 archives place their sections on whole 2048-byte sectors
    let mut bytes = Vec::new();
    0x51890ACE_u32.write(&mut bytes).unwrap();
    6_u32.write(&mut bytes).unwrap();
    bytes.resize(bytes.len() + 0x144, 0); // runtime fields
    0_u32.write(&mut bytes).unwrap(); // flags
    0_u32.write(&mut bytes).unwrap(); // sector placeholder
    1_u32.write(&mut bytes).unwrap(); // num_files
    6149_u32.write(&mut bytes).unwrap(); // file_size
    20_u32.write(&mut bytes).unwrap(); // dir_size
    6_u32.write(&mut bytes).unwrap(); // filename_size
    5_u32.write(&mut bytes).unwrap(); // data_size
    5_u32.write(&mut bytes).unwrap(); // compressed_data_size

    // entry directory at the first sector boundary
    assert_eq!(align_position(380, 2048), 2048);
    bytes.resize(2048, 0);
    0_u32.write(&mut bytes).unwrap(); // filename_offset
    0_u32.write(&mut bytes).unwrap(); // start
    5_u32.write(&mut bytes).unwrap(); // size
    5_u32.write(&mut bytes).unwrap(); // compressed_size
    0_u32.write(&mut bytes).unwrap(); // runtime parent pointer

    // name table and data section on the following boundaries
    assert_eq!(align_position(2048 + 20, 2048), 4096);
    bytes.resize(4096, 0);
    bytes.extend_from_slice(b"a.bin\0");

    assert_eq!(align_position(4096 + 6, 2048), 6144);
    bytes.resize(6144, 0);
    bytes.extend_from_slice(b"hello");

    let mut read = Cursor::new(bytes);
    let mut parsed = Packfile::read(&mut read).unwrap();

    assert_eq!(parsed.version, 6);
    assert_eq!(parsed.entry_count(), 1);
    assert_eq!(parsed.data_offset(), 6144);
    assert!(parsed.entries[0].filename.eq("a.bin"));
    assert_eq!(parsed.entry_data(&mut read, 0).unwrap(), b"hello");
}

#[test]
fn packfile_entry_alignment_pads_the_data_section() {
    let mut original = archive(10, PackfileFlags::empty(), CONTENTS);
    for entry in &mut original.entries {
        entry.alignment = 64;
    }

    let bytes = write_to_vec(&mut original);
    let parsed = parse_fully(bytes);

    assert_eq!(parsed.entries[0].start, 0);
    assert_eq!(parsed.entries[1].start, 64); // 22 payload bytes, padded up
    assert_eq!(parsed.entries[2].start, align_position(64 + 300, 64));

    for (entry, (_, data)) in parsed.entries.iter().zip(CONTENTS) {
        assert_eq!(entry.data().unwrap(), *data);
    }
}

#[test]
fn packfile_mutate_and_rewrite() {
    // the safe lifecycle: parse, read data, mutate, write
    let mut original = archive(10, PackfileFlags::empty(), CONTENTS);
    let mut first_pass = parse_fully(write_to_vec(&mut original));

    let index = first_pass.entry_index("credits.txt").unwrap();
    first_pass.entry_mut(index).set_data(b"made by more people".to_vec());

    let second_pass = parse_fully(write_to_vec(&mut first_pass));
    assert_eq!(second_pass, first_pass);

    let rewritten = second_pass.entry_by_filename("credits.txt").unwrap();
    assert_eq!(rewritten.size, 19);
    assert_eq!(rewritten.data().unwrap(), b"made by more people");

    // untouched entries survive unchanged
    assert_eq!(second_pass.entries[1].data().unwrap(), CONTENTS[1].1);
}

#[test]
fn peg_entry_flags_preserve_unknown_bits() {
    let mut peg = PegFile::default();
    peg.entries.push(PegEntry {
        filename: Text::from("odd.tga"),
        width: 4,
        height: 4,
        bm_fmt: TextureFormat::PcBc1,
        flags: EntryFlags::from_bits_retain(0xc001), // two bits beyond the documented set
        data_size: 8,
        data: vec![0; 8],
        ..PegEntry::default()
    });

    let mut header = Cursor::new(Vec::new());
    peg.write_header(&mut header).unwrap();

    let parsed = PegFile::read_header(&mut Cursor::new(header.into_inner())).unwrap();
    assert_eq!(parsed.entries[0].flags.bits(), 0xc001);
    assert!(parsed.entries[0].flags.contains(EntryFlags::ALPHA));
}

#[test]
fn dds_write_read_identity() {
    let mut dds = DdsFile {
        height: 8,
        width: 8,
        pitch_or_linear_size: 32,
        mipmap_count: 1,
        data: (0..=255_u8).collect(),
        ..DdsFile::default()
    };

    dds.flags |= DDSD_PITCH;
    dds.pixelformat = dds::pixelformat(TextureFormat::Pc8888).unwrap();

    let mut written = Vec::new();
    dds.write(&mut written).unwrap();

    // "DDS " then the declared header size of 124
    assert_eq!(&written[..8], &[0x44, 0x44, 0x53, 0x20, 0x7c, 0x00, 0x00, 0x00]);

    let parsed = DdsFile::read(&mut written.as_slice()).unwrap();
    assert_eq!(parsed, dds);

    let mut rewritten = Vec::new();
    parsed.write(&mut rewritten).unwrap();
    assert_eq!(rewritten, written);
}

#[test]
fn peg_entry_to_dds_computes_linear_size() {
    let entry = PegEntry {
        width: 5,
        height: 7,
        bm_fmt: TextureFormat::PcBc1,
        data: vec![0; 32],
        ..PegEntry::default()
    };

    // 5 x 7 pixels round up to 2 x 2 blocks of 8 bytes
    let dds = entry.to_dds().unwrap();
    assert_ne!(dds.flags & DDSD_LINEARSIZE, 0);
    assert_eq!(dds.pitch_or_linear_size, 2 * 2 * 8);

    let bc3 = PegEntry { bm_fmt: TextureFormat::PcBc3, ..entry };
    assert_eq!(bc3.to_dds().unwrap().pitch_or_linear_size, 2 * 2 * 16);
}

#[test]
fn peg_entry_dds_conversions_are_inverse() {
    let entry = PegEntry {
        filename: Text::from("icon.tga"),
        width: 8,
        height: 8,
        bm_fmt: TextureFormat::PcBc3,
        mip_levels: 2,
        data: (0..80_u8).collect(),
        data_size: 80,
        ..PegEntry::default()
    };

    let recovered = PegEntry::from_dds(&entry.to_dds().unwrap());
    assert_eq!(recovered.bm_fmt, TextureFormat::PcBc3);
    assert_eq!((recovered.width, recovered.height), (8, 8));
    assert_eq!(recovered.mip_levels, 2);
    assert_eq!(recovered.data, entry.data);
}

#[test]
fn peg_v19_round_trip() {
    let mut peg = PegFile {
        version: 19,
        ..PegFile::default()
    };

    peg.entries.push(PegEntry {
        filename: Text::from("sky.tga"),
        width: 4,
        height: 4,
        bm_fmt: TextureFormat::PcBc7,
        avg_color: HdrColor::new(0.25, 0.5, 0.75, 1.0),
        num_mips_split: 1,
        data_max_size: 16,
        data_size: 16,
        data: vec![0x11; 16],
        ..PegEntry::default()
    });

    peg.entries.push(PegEntry {
        filename: Text::from("ground.tga"),
        width: 4,
        height: 4,
        bm_fmt: TextureFormat::PcBc1,
        flags: EntryFlags::ALPHA | EntryFlags::CUBE_MAP,
        data_size: 24,
        data: vec![0x22; 24],
        ..PegEntry::default()
    });

    let mut header = Cursor::new(Vec::new());
    peg.write_header(&mut header).unwrap();

    let mut data = Cursor::new(Vec::new());
    peg.write_data(&mut data).unwrap();

    // the second payload starts at the next aligned offset
    assert_eq!(data.get_ref().len(), 16 + 24);
    let mut parsed = PegFile::read_header(&mut Cursor::new(header.into_inner())).unwrap();
    assert_eq!(parsed.entries[0].offset, 0);
    assert_eq!(parsed.entries[1].offset, 16);

    parsed.read_data(&mut Cursor::new(data.into_inner())).unwrap();

    assert_eq!(parsed.header_size, peg.calc_header_size());
    assert_eq!(parsed.data_size as u64, peg.calc_data_size());
    assert_eq!(parsed.entries[0].avg_color, HdrColor::new(0.25, 0.5, 0.75, 1.0));
    assert_eq!(parsed.entries[1].flags, EntryFlags::ALPHA | EntryFlags::CUBE_MAP);

    // the parsed bundle reproduces the input, offsets aside
    for (parsed_entry, original_entry) in parsed.entries.iter().zip(&peg.entries) {
        let mut expected = original_entry.clone();
        expected.offset = parsed_entry.offset;
        assert_eq!(parsed_entry, &expected);
    }
}

#[test]
fn peg_entry_from_tga_statistics() {
    let mut tga = TgaFile::default();
    tga.width = 4;
    tga.height = 4;
    tga.pixels = vec![LdrColor::new(255, 0, 0, 255); 16];

    let opaque = PegEntry::from_tga(&tga, TextureFormat::PcBc1).unwrap();
    assert!(!opaque.flags.contains(EntryFlags::ALPHA));
    assert_eq!(opaque.avg_color.a, 1.0);
    assert!(opaque.avg_color.r > 0.99);
    assert!(opaque.avg_color.g < 0.01);
    assert_eq!(opaque.data.len(), 8);

    tga.pixels[0].a = 0;
    let translucent = PegEntry::from_tga(&tga, TextureFormat::PcBc3).unwrap();
    assert!(translucent.flags.contains(EntryFlags::ALPHA));
    assert!(translucent.avg_color.a < 1.0);
}

#[test]
fn peg_entry_tga_conversions_are_inverse() {
    let mut tga = TgaFile::default();
    tga.width = 8;
    tga.height = 4;
    tga.pixels = (0..32)
        .map(|index| {
            if index % 2 == 0 { LdrColor::new(255, 255, 255, 255) }
            else { LdrColor::new(0, 0, 0, 255) }
        })
        .collect();

    let entry = PegEntry::from_tga(&tga, TextureFormat::PcBc1).unwrap();
    let recovered = entry.to_tga().unwrap();

    assert_eq!((recovered.width, recovered.height), (8, 4));
    assert_eq!(recovered.data_type, TgaImageType::Rgb);
    assert_eq!(recovered.bits_per_pixel, 32);

    for (recovered_pixel, original_pixel) in recovered.pixels.iter().zip(&tga.pixels) {
        assert!(recovered_pixel.r.abs_diff(original_pixel.r) <= 8);
        assert!(recovered_pixel.g.abs_diff(original_pixel.g) <= 8);
        assert!(recovered_pixel.b.abs_diff(original_pixel.b) <= 8);
        assert_eq!(recovered_pixel.a, 255);
    }
}

#[test]
fn peg_entry_rejects_plain_formats_in_conversions() {
    let entry = PegEntry {
        width: 4,
        height: 4,
        bm_fmt: TextureFormat::Pc8888,
        data: vec![0; 64],
        ..PegEntry::default()
    };

    // uncompressed formats convert to dds but not to tga
    assert!(entry.to_dds().is_ok());
    assert!(matches!(entry.to_tga(), Err(Error::Invalid(_))));

    let tga = TgaFile {
        width: 4,
        height: 4,
        pixels: vec![LdrColor::default(); 16],
        ..TgaFile::default()
    };

    assert!(PegEntry::from_tga(&tga, TextureFormat::Pc565).is_err());
}

#[test]
fn detecting_every_tabled_pixelformat() {
    for value in 400..=410_u16 {
        let format = TextureFormat::try_from(value).unwrap();
        let row: DdsPixelformat = dds::pixelformat(format).unwrap();
        assert_eq!(dds::detect_pixelformat(&row), format);
    }

    // formats beyond the table have no pixelformat row
    assert!(dds::pixelformat(TextureFormat::PcBc4).is_err());
}
